use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Everything that can go wrong between reading the input file and writing
/// the table.  Each variant maps to one failure class of the pipeline.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Bad operator input, detected before any segment exists.
    #[error(transparent)]
    Input(#[from] InputError),

    /// A segment with the derived name is already present (stale or colliding).
    #[error("shared memory segment '{name}' already exists (remove the stale segment or rename the input)")]
    SegmentAlreadyExists { name: String },

    /// Attach or release on a name that is not (or no longer) allocated.
    #[error("shared memory segment '{name}' not found")]
    SegmentNotFound { name: String },

    /// Any other failure while creating, mapping or removing a segment.
    #[error("shared memory segment '{name}' failed")]
    Segment {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Declared shape/dtype does not cover the segment byte-for-byte.
    #[error(
        "shape {shape} with dtype {dtype} needs {expected} bytes but the segment holds {actual}"
    )]
    ShapeMismatch {
        shape: String,
        dtype: &'static str,
        expected: String,
        actual: usize,
    },

    /// Arrow refused to assemble the table.
    #[error("building table")]
    Table(#[from] ArrowError),

    /// Destination unwritable, encoding error or unsupported sink.
    #[error("failed to write table to '{destination}'")]
    WriteFailure {
        destination: String,
        #[source]
        source: WriteError,
    },
}

/// Operator input problems.  None of these leave anything to clean up.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read input file '{}'", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("input file '{}' is empty; zero-length arrays have no table representation", path.display())]
    Empty { path: PathBuf },

    #[error("cannot derive a segment name from '{}'", path.display())]
    InvalidSegmentName { path: PathBuf },

    #[error("invalid shape format '{input}': {reason}")]
    MalformedShape { input: String, reason: String },

    #[error("unsupported data type: {name}")]
    UnknownDtype { name: String },
}

/// Underlying cause of a [`ConvertError::WriteFailure`].
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Parquet(#[from] ParquetError),

    #[error("destination has no file name")]
    NoFileName,
}

impl ConvertError {
    pub(crate) fn write_failure(destination: &str, source: impl Into<WriteError>) -> Self {
        ConvertError::WriteFailure {
            destination: destination.to_string(),
            source: source.into(),
        }
    }
}
