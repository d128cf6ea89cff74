use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClaError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Index {index:?} out of range for shape {shape:?}")]
    OutOfRange {
        index: (usize, usize),
        shape: (usize, usize),
    },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Matrix is singular (zero pivot in column {pivot})")]
    SingularMatrix { pivot: usize },

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Array type or shape mismatch: {0}")]
    TypeOrShapeMismatch(String),
}

impl ClaError {
    /// Out-of-range error for a one-dimensional index into a container of `len` elements.
    pub(crate) fn out_of_range_1d(index: usize, len: usize) -> Self {
        ClaError::OutOfRange {
            index: (index, 0),
            shape: (len, 1),
        }
    }
}
