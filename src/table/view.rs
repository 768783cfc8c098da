use std::sync::Arc;

use arrow::array::{ArrayRef, PrimitiveArray};
use arrow::buffer::{Buffer, ScalarBuffer};
use arrow::datatypes::{
    ArrowPrimitiveType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};

use super::dtype::ElementType;
use super::shape::Shape;
use crate::error::ConvertError;

// ---------------------------------------------------------------------------
// TypedView – validated, zero-copy interpretation of raw bytes
// ---------------------------------------------------------------------------

/// Raw bytes read as an N-dimensional array of `dtype`, row-major.
/// Borrows the bytes; nothing is copied until [`to_local`](Self::to_local).
#[derive(Debug, Clone)]
pub struct TypedView<'a> {
    bytes: &'a [u8],
    shape: Shape,
    dtype: ElementType,
}

impl<'a> TypedView<'a> {
    /// Fails with [`ConvertError::ShapeMismatch`] unless the shape and dtype
    /// cover `bytes` exactly.
    pub fn new(bytes: &'a [u8], shape: Shape, dtype: ElementType) -> Result<Self, ConvertError> {
        let expected = shape.byte_len(dtype);
        if expected != Some(bytes.len()) {
            return Err(ConvertError::ShapeMismatch {
                shape: shape.to_string(),
                dtype: dtype.name(),
                expected: expected.map_or_else(|| "more than usize::MAX".to_string(), |n| n.to_string()),
                actual: bytes.len(),
            });
        }
        Ok(TypedView { bytes, shape, dtype })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.dtype.size()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes of the element at row-major position `index`.
    pub fn element_bytes(&self, index: usize) -> Option<&'a [u8]> {
        let size = self.dtype.size();
        let start = index.checked_mul(size)?;
        self.bytes.get(start..start + size)
    }

    /// Copy the viewed bytes into process-local, Arrow-aligned memory.
    /// The result does not borrow from the source.
    pub fn to_local(&self) -> LocalArray {
        LocalArray {
            shape: self.shape.clone(),
            dtype: self.dtype,
            values: Buffer::from_slice_ref(self.bytes),
        }
    }
}

// ---------------------------------------------------------------------------
// LocalArray – the owned copy
// ---------------------------------------------------------------------------

/// An owned copy of a [`TypedView`], independent of the segment it came from.
#[derive(Debug, Clone)]
pub struct LocalArray {
    shape: Shape,
    dtype: ElementType,
    values: Buffer,
}

impl LocalArray {
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn len(&self) -> usize {
        self.values.len() / self.dtype.size()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The flat row-major values as `T`, or `None` if `T` is not this
    /// array's element type.
    pub fn values<T: ArrowPrimitiveType>(&self) -> Option<ScalarBuffer<T::Native>> {
        (T::DATA_TYPE == self.dtype.arrow_type())
            .then(|| ScalarBuffer::new(self.values.clone(), 0, self.len()))
    }

    /// Split into one Arrow column per index of the flattened trailing
    /// dimensions, each `shape.rows()` long.
    pub fn into_columns(self) -> Vec<ArrayRef> {
        let rows = self.shape.rows();
        let width = self.shape.row_width();
        let values = self.values;
        match self.dtype {
            ElementType::Int8 => split_columns::<Int8Type>(values, rows, width),
            ElementType::Int16 => split_columns::<Int16Type>(values, rows, width),
            ElementType::Int32 => split_columns::<Int32Type>(values, rows, width),
            ElementType::Int64 => split_columns::<Int64Type>(values, rows, width),
            ElementType::UInt8 => split_columns::<UInt8Type>(values, rows, width),
            ElementType::UInt16 => split_columns::<UInt16Type>(values, rows, width),
            ElementType::UInt32 => split_columns::<UInt32Type>(values, rows, width),
            ElementType::UInt64 => split_columns::<UInt64Type>(values, rows, width),
            ElementType::Float32 => split_columns::<Float32Type>(values, rows, width),
            ElementType::Float64 => split_columns::<Float64Type>(values, rows, width),
        }
    }
}

fn split_columns<T: ArrowPrimitiveType>(values: Buffer, rows: usize, width: usize) -> Vec<ArrayRef> {
    let values: ScalarBuffer<T::Native> = ScalarBuffer::new(values, 0, rows * width);
    if width == 1 {
        // Single column: the buffer already is the column.
        return vec![Arc::new(PrimitiveArray::<T>::new(values, None)) as ArrayRef];
    }
    (0..width)
        .map(|col| {
            let column = PrimitiveArray::<T>::from_iter_values(
                (0..rows).map(|row| values[row * width + col]),
            );
            Arc::new(column) as ArrayRef
        })
        .collect()
}
