use std::fmt;
use std::path::PathBuf;

use crate::config::StagingConfig;
use crate::error::ConvertError;
use crate::staging::{AttachedSegment, StagingSegment};
use crate::table::{convert, write_table, Destination, ElementType, Shape, WriteSummary};

// ---------------------------------------------------------------------------
// Pipeline states
// ---------------------------------------------------------------------------

/// Steps of one conversion.  The input is read by segment acquisition, so
/// `BufferRead` and `SegmentCreated` are entered together.  Every path that
/// gets past `SegmentCreated` goes through `SegmentReleased`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    BufferRead,
    SegmentCreated,
    SegmentAttached,
    TableBuilt,
    FileWritten,
    SegmentReleased,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::BufferRead => "buffer read",
            Stage::SegmentCreated => "segment created",
            Stage::SegmentAttached => "segment attached",
            Stage::TableBuilt => "table built",
            Stage::FileWritten => "file written",
            Stage::SegmentReleased => "segment released",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn enter(stage: Stage) {
    log::debug!("pipeline: {stage}");
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One batch conversion: raw binary `input` to a Parquet table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertRequest {
    pub input: PathBuf,
    /// Local path or remote-storage URI.
    pub destination: String,
    /// `None` infers a 1-D shape from the input length.
    pub shape: Option<Shape>,
    pub dtype: ElementType,
}

impl ConvertRequest {
    pub fn new(input: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            destination: destination.into(),
            shape: None,
            dtype: ElementType::default(),
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_dtype(mut self, dtype: ElementType) -> Self {
        self.dtype = dtype;
        self
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Stage the input in shared memory, convert it and write the table.
///
/// Input problems are reported before a segment exists.  Once the segment
/// is created it is released on every path, and a release failure is only
/// reported when nothing failed earlier.
pub fn run(request: &ConvertRequest, config: &StagingConfig) -> Result<WriteSummary, ConvertError> {
    enter(Stage::Start);
    let destination = Destination::parse(&request.destination)?;
    let segment = StagingSegment::create_from_file(config, &request.input)?;
    let name = segment.name().to_string();
    enter(Stage::BufferRead);
    enter(Stage::SegmentCreated);

    let outcome = convert_staged(config, &name, request, &destination);
    let released = segment.release();
    enter(Stage::SegmentReleased);

    match (outcome, released) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(e)) => {
            enter(Stage::Failed);
            Err(e)
        }
        (Err(e), released) => {
            if let Err(release_err) = released {
                log::error!("releasing segment '{name}' after failure: {release_err}");
            }
            enter(Stage::Failed);
            Err(e)
        }
    }
}

fn convert_staged(
    config: &StagingConfig,
    name: &str,
    request: &ConvertRequest,
    destination: &Destination,
) -> Result<WriteSummary, ConvertError> {
    let attached = AttachedSegment::attach(config, name)?;
    enter(Stage::SegmentAttached);

    let table = convert(&attached, request.shape.as_ref(), request.dtype);
    attached.detach();
    let table = table?;
    enter(Stage::TableBuilt);
    log::debug!("table preview:\n{}", table.preview(5));

    let summary = write_table(&table, destination)?;
    enter(Stage::FileWritten);
    Ok(summary)
}
