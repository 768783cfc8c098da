use std::fmt;
use std::str::FromStr;

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

// ---------------------------------------------------------------------------
// ElementType – closed set of fixed-width numeric types
// ---------------------------------------------------------------------------

/// Element type of the raw buffer.  Values are read in native byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    #[default]
    Float64,
}

/// Accepted names, canonical first, then numpy-style aliases.
const NAME_TABLE: &[(&str, ElementType)] = &[
    ("int8", ElementType::Int8),
    ("int16", ElementType::Int16),
    ("int32", ElementType::Int32),
    ("int64", ElementType::Int64),
    ("uint8", ElementType::UInt8),
    ("uint16", ElementType::UInt16),
    ("uint32", ElementType::UInt32),
    ("uint64", ElementType::UInt64),
    ("float32", ElementType::Float32),
    ("float64", ElementType::Float64),
    ("byte", ElementType::Int8),
    ("ubyte", ElementType::UInt8),
    ("short", ElementType::Int16),
    ("ushort", ElementType::UInt16),
    ("intc", ElementType::Int32),
    ("uintc", ElementType::UInt32),
    ("longlong", ElementType::Int64),
    ("ulonglong", ElementType::UInt64),
    ("single", ElementType::Float32),
    ("double", ElementType::Float64),
    ("float_", ElementType::Float64),
];

impl ElementType {
    pub const ALL: [ElementType; 10] = [
        ElementType::Int8,
        ElementType::Int16,
        ElementType::Int32,
        ElementType::Int64,
        ElementType::UInt8,
        ElementType::UInt16,
        ElementType::UInt32,
        ElementType::UInt64,
        ElementType::Float32,
        ElementType::Float64,
    ];

    /// Resolve a type name.  Unknown names are an input error.
    pub fn from_name(name: &str) -> Result<Self, InputError> {
        NAME_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
            .ok_or_else(|| InputError::UnknownDtype {
                name: name.to_string(),
            })
    }

    /// Canonical name, as accepted by [`from_name`](Self::from_name).
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::UInt8 => "uint8",
            ElementType::UInt16 => "uint16",
            ElementType::UInt32 => "uint32",
            ElementType::UInt64 => "uint64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
        }
    }

    /// Width of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::UInt64 | ElementType::Float64 => 8,
        }
    }

    /// Arrow column type holding values of this element type.
    pub fn arrow_type(self) -> DataType {
        match self {
            ElementType::Int8 => DataType::Int8,
            ElementType::Int16 => DataType::Int16,
            ElementType::Int32 => DataType::Int32,
            ElementType::Int64 => DataType::Int64,
            ElementType::UInt8 => DataType::UInt8,
            ElementType::UInt16 => DataType::UInt16,
            ElementType::UInt32 => DataType::UInt32,
            ElementType::UInt64 => DataType::UInt64,
            ElementType::Float32 => DataType::Float32,
            ElementType::Float64 => DataType::Float64,
        }
    }
}

impl FromStr for ElementType {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
