use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayData, Float32Array, Float64Array};
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::builder::{SourceInfo, SOURCE_METADATA_KEY};
use super::dtype::ElementType;

// ---------------------------------------------------------------------------
// Read-back of written tables
// ---------------------------------------------------------------------------

/// A Parquet table produced by this crate, loaded back into memory.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub batch: RecordBatch,
    pub row_groups: usize,
    /// Parsed `binstage` schema metadata, if present.
    pub source: Option<SourceInfo>,
}

/// Load a Parquet file, concatenating all record batches.
pub fn load_table(path: &Path) -> Result<LoadedTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let row_groups = builder.metadata().num_row_groups();
    let schema: SchemaRef = Arc::clone(builder.schema());
    let source = match schema.metadata().get(SOURCE_METADATA_KEY) {
        Some(raw) => Some(serde_json::from_str(raw).context("parsing source metadata")?),
        None => None,
    };

    let reader = builder.build().context("building parquet reader")?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context("reading parquet record batch")?;
    let batch = concat_batches(&schema, &batches).context("concatenating record batches")?;

    Ok(LoadedTable {
        batch,
        row_groups,
        source,
    })
}

impl LoadedTable {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// A floating-point column widened to `f64`.
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let col = self
            .batch
            .column_by_name(name)
            .with_context(|| format!("missing '{name}' column"))?;
        if col.null_count() > 0 {
            bail!("column '{name}' contains nulls");
        }
        if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
            Ok(arr.values().to_vec())
        } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
            Ok(arr.values().iter().map(|&v| v as f64).collect())
        } else {
            bail!("column '{name}' is {:?}, expected Float64 or Float32", col.data_type())
        }
    }

    /// Reassemble the original row-major buffer from the columns.
    ///
    /// Requires the source metadata (for the element width); the bytes come
    /// back exactly as they were staged, NaN payloads included.
    pub fn to_row_major_bytes(&self) -> Result<Vec<u8>> {
        let dtype: ElementType = self
            .source
            .as_ref()
            .map(|s| s.dtype)
            .context("table has no source metadata")?;
        let width = dtype.size();

        let data: Vec<ArrayData> = self
            .batch
            .columns()
            .iter()
            .map(|col| {
                if col.data_type() != &dtype.arrow_type() {
                    bail!("column type {:?} does not match {dtype}", col.data_type());
                }
                Ok(col.to_data())
            })
            .collect::<Result<_>>()?;

        let columns: Vec<&[u8]> = data
            .iter()
            .map(|d| {
                let values = d
                    .buffers()
                    .first()
                    .context("primitive column without a values buffer")?;
                let start = d.offset() * width;
                let end = start + d.len() * width;
                values.as_slice().get(start..end).context("values buffer too short")
            })
            .collect::<Result<_>>()?;

        let mut out = Vec::with_capacity(self.num_rows() * columns.len() * width);
        for row in 0..self.num_rows() {
            for col in &columns {
                out.extend_from_slice(&col[row * width..(row + 1) * width]);
            }
        }
        Ok(out)
    }
}
