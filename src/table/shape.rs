use std::fmt;
use std::str::FromStr;

use crate::error::{ConvertError, InputError};

use super::dtype::ElementType;

/// Logical dimensions of the array encoded in a buffer, leading dimension first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Build from explicit dimensions.  Every dimension must be positive.
    pub fn new(dims: Vec<usize>) -> Result<Self, InputError> {
        if dims.is_empty() {
            return Err(malformed(&format_dims(&dims), "at least one dimension is required"));
        }
        if dims.contains(&0) {
            return Err(malformed(&format_dims(&dims), "dimensions must be positive"));
        }
        Ok(Shape(dims))
    }

    /// Parse `"1000,1000"`-style input.
    pub fn parse(input: &str) -> Result<Self, InputError> {
        let dims = input
            .split(',')
            .map(|tok| {
                let tok = tok.trim();
                if tok.is_empty() {
                    return Err(malformed(input, "empty dimension"));
                }
                match tok.parse::<usize>() {
                    Ok(0) => Err(malformed(input, "dimensions must be positive")),
                    Ok(d) => Ok(d),
                    Err(_) => Err(malformed(input, &format!("'{tok}' is not a positive integer"))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Shape(dims))
    }

    /// Parse an optional CLI argument; an empty string means "no shape".
    pub fn parse_optional(input: Option<&str>) -> Result<Option<Self>, InputError> {
        match input.map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => Self::parse(s).map(Some),
        }
    }

    /// The 1-D shape covering `byte_len` bytes of `dtype`.
    ///
    /// Lengths that are not a whole number of elements are a
    /// [`ConvertError::ShapeMismatch`]: nothing is truncated.
    pub fn infer(byte_len: usize, dtype: ElementType) -> Result<Self, ConvertError> {
        let size = dtype.size();
        if byte_len == 0 || byte_len % size != 0 {
            return Err(ConvertError::ShapeMismatch {
                shape: format!("({},)", byte_len / size),
                dtype: dtype.name(),
                expected: format!("a non-zero multiple of {size}"),
                actual: byte_len,
            });
        }
        Ok(Shape(vec![byte_len / size]))
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total element count, `None` on overflow.
    pub fn num_elements(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Bytes needed to hold the array, `None` on overflow.
    pub fn byte_len(&self, dtype: ElementType) -> Option<usize> {
        self.num_elements()?.checked_mul(dtype.size())
    }

    /// Leading dimension: one table row per entry.
    pub fn rows(&self) -> usize {
        self.0[0]
    }

    /// Product of the trailing dimensions: one table column per entry.
    pub fn row_width(&self) -> usize {
        self.0[1..].iter().product()
    }
}

impl FromStr for Shape {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Formats like a tuple: `(2, 5)`, `(16,)`.
impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_dims(&self.0))
    }
}

fn format_dims(dims: &[usize]) -> String {
    match dims {
        [d] => format!("({d},)"),
        _ => {
            let inner: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", inner.join(", "))
        }
    }
}

fn malformed(input: &str, reason: &str) -> InputError {
    InputError::MalformedShape {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
