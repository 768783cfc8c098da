use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use serde::{Deserialize, Serialize};

use super::dtype::ElementType;
use super::shape::Shape;
use super::view::{LocalArray, TypedView};
use crate::error::ConvertError;
use crate::staging::AttachedSegment;

/// Column name used when the source array is 1-D.
pub const VALUE_COLUMN: &str = "value";

/// Schema metadata key holding the JSON-encoded [`SourceInfo`].
pub const SOURCE_METADATA_KEY: &str = "binstage";

// ---------------------------------------------------------------------------
// Source description stored alongside the table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }
}

/// Where a table's values came from and how they were interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub segment: String,
    pub shape: Vec<usize>,
    pub dtype: ElementType,
    pub byte_order: ByteOrder,
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Rows along the leading dimension, one column per flattened trailing index.
/// Owns all of its data.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
    source: SourceInfo,
}

/// Column names for a given shape: `value` for 1-D, `"0"`, `"1"`, … otherwise.
pub fn column_names(shape: &Shape) -> Vec<String> {
    if shape.ndim() == 1 {
        vec![VALUE_COLUMN.to_string()]
    } else {
        (0..shape.row_width()).map(|i| i.to_string()).collect()
    }
}

impl Table {
    /// Assemble a table from an owned array copy.
    pub fn from_local(segment: &str, local: LocalArray) -> Result<Self, ConvertError> {
        let source = SourceInfo {
            segment: segment.to_string(),
            shape: local.shape().dims().to_vec(),
            dtype: local.dtype(),
            byte_order: ByteOrder::native(),
        };
        let data_type = local.dtype().arrow_type();
        let fields: Vec<Field> = column_names(local.shape())
            .into_iter()
            .map(|name| Field::new(name, data_type.clone(), false))
            .collect();

        let source_json =
            serde_json::to_string(&source).map_err(|e| ArrowError::ExternalError(Box::new(e)))?;
        let schema = Schema::new(fields)
            .with_metadata(HashMap::from([(SOURCE_METADATA_KEY.to_string(), source_json)]));

        let batch = RecordBatch::try_new(Arc::new(schema), local.into_columns())?;
        Ok(Table { batch, source })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    pub fn dtype(&self) -> ElementType {
        self.source.dtype
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Total number of values across all columns.
    pub fn num_elements(&self) -> usize {
        self.num_rows() * self.num_columns()
    }

    /// Pretty-printed first `max_rows` rows, for logging.
    pub fn preview(&self, max_rows: usize) -> String {
        let head = self.batch.slice(0, max_rows.min(self.num_rows()));
        match pretty_format_batches(&[head]) {
            Ok(table) => table.to_string(),
            Err(e) => format!("<preview unavailable: {e}>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion entry points
// ---------------------------------------------------------------------------

/// Interpret an attached segment as `shape` x `dtype` and build a table.
///
/// With no shape, a 1-D shape covering the whole segment is inferred.
/// The returned table is a copy: the segment can be released right after.
pub fn convert(
    segment: &AttachedSegment,
    shape: Option<&Shape>,
    dtype: ElementType,
) -> Result<Table, ConvertError> {
    convert_bytes(segment.name(), segment.as_bytes(), shape, dtype)
}

/// Same as [`convert`] for an arbitrary byte slice labelled `source`.
pub fn convert_bytes(
    source: &str,
    bytes: &[u8],
    shape: Option<&Shape>,
    dtype: ElementType,
) -> Result<Table, ConvertError> {
    let shape = match shape {
        Some(shape) => shape.clone(),
        None => Shape::infer(bytes.len(), dtype)?,
    };
    let view = TypedView::new(bytes, shape, dtype)?;
    let local = view.to_local();
    Table::from_local(source, local)
}
