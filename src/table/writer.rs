use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::builder::Table;
use crate::error::{ConvertError, WriteError};
use crate::staging::guard;

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// Where the table should end up.
///
/// Remote object-storage URIs (`s3://bucket/key/out.parquet`) are not
/// uploaded here: only their final path segment is used as the local file
/// name, and the upload is left to whatever consumes that file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Local(PathBuf),
    Remote { uri: String, file_name: String },
}

impl Destination {
    pub fn parse(destination: &str) -> Result<Self, ConvertError> {
        let no_name = || ConvertError::write_failure(destination, WriteError::NoFileName);

        if let Some((scheme, rest)) = destination.split_once("://") {
            if is_scheme(scheme) {
                let file_name = rest.rsplit('/').next().unwrap_or("");
                if file_name.is_empty() || !rest.contains('/') {
                    return Err(no_name());
                }
                return Ok(Destination::Remote {
                    uri: destination.to_string(),
                    file_name: file_name.to_string(),
                });
            }
        }
        if destination.trim().is_empty() {
            return Err(no_name());
        }
        Ok(Destination::Local(PathBuf::from(destination)))
    }

    /// Path of the file written locally.
    pub fn local_path(&self) -> PathBuf {
        match self {
            Destination::Local(path) => path.clone(),
            Destination::Remote { file_name, .. } => PathBuf::from(file_name),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Destination::Remote { .. })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Local(path) => write!(f, "{}", path.display()),
            Destination::Remote { uri, .. } => f.write_str(uri),
        }
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Result of a successful [`write_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub elements: usize,
    pub dtype: &'static str,
    pub segment: String,
    pub destination: String,
    pub path: PathBuf,
}

impl fmt::Display for WriteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Successfully wrote {} {} values from buffer '{}' to '{}'",
            self.elements, self.dtype, self.segment, self.destination
        )
    }
}

/// Write `table` as a single-row-group Parquet file.
///
/// The file is first written to `<name>.<pid>.tmp` beside the target,
/// synced and renamed into place.  The temp file is registered with the
/// staging guard while in flight, so an interrupt removes it too; on error
/// it is removed and nothing is left at the target path.
pub fn write_table(table: &Table, destination: &Destination) -> Result<WriteSummary, ConvertError> {
    let path = destination.local_path();
    let tmp = tmp_path(&path);

    // Never reuse an existing file under the temp name.
    let file = open_exclusive(&tmp)
        .map_err(|e| ConvertError::write_failure(&destination.to_string(), e))?;
    guard::track(&tmp);

    let result = write_parquet(table, file).and_then(|()| fs::rename(&tmp, &path).map_err(WriteError::from));
    if let Err(e) = result {
        if let Err(rm) = fs::remove_file(&tmp) {
            if rm.kind() != std::io::ErrorKind::NotFound {
                log::warn!("could not remove {}: {rm}", tmp.display());
            }
        }
        guard::untrack(&tmp);
        return Err(ConvertError::write_failure(&destination.to_string(), e));
    }
    guard::untrack(&tmp);

    log::info!(
        "wrote {} rows x {} columns to {}",
        table.num_rows(),
        table.num_columns(),
        path.display()
    );
    Ok(WriteSummary {
        elements: table.num_elements(),
        dtype: table.dtype().name(),
        segment: table.source().segment.clone(),
        destination: destination.to_string(),
        path,
    })
}

fn write_parquet(table: &Table, file: File) -> Result<(), WriteError> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(table.num_rows().max(1))
        .build();

    let mut writer = ArrowWriter::try_new(&file, table.schema(), Some(props))?;
    writer.write(table.batch())?;
    writer.close()?;
    file.sync_all()?;
    Ok(())
}

fn open_exclusive(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}
