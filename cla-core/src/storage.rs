use crate::error::{ClaError, Result};
use serde::{Deserialize, Serialize};

/// Contiguous row-major block of `rows * cols` doubles.
///
/// Owned exclusively by the `Matrix` or `Vector` wrapping it. The invariant
/// `data.len() == rows * cols` holds for every constructed value, including
/// deserialized ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStorage")]
pub struct Storage {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawStorage {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TryFrom<RawStorage> for Storage {
    type Error = ClaError;

    fn try_from(raw: RawStorage) -> Result<Self> {
        Storage::from_vec(raw.rows, raw.cols, raw.data)
    }
}

impl Storage {
    /// Zero-filled storage.
    ///
    /// Panics if `rows * cols` overflows `usize`, like `vec!` does for an
    /// impossible length.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        let len = match rows.checked_mul(cols) {
            Some(len) => len,
            None => panic!("Dimensions {}x{} overflow usize", rows, cols),
        };
        Self {
            rows,
            cols,
            data: vec![0.0; len],
        }
    }

    /// Single-column storage over `data`; the length check cannot fail.
    pub fn column(data: Vec<f64>) -> Self {
        Self {
            rows: data.len(),
            cols: 1,
            data,
        }
    }

    /// Wraps `data` (row-major) after checking its length.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            ClaError::ShapeMismatch(format!("Dimensions {}x{} overflow", rows, cols))
        })?;
        if data.len() != expected {
            return Err(ClaError::ShapeMismatch(format!(
                "Data length ({}) does not match dimensions ({}x{})",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Flat offset of `(row, col)`, or `None` when out of bounds.
    #[inline]
    pub fn offset(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.rows && col < self.cols {
            Some(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.offset(row, col).map(|idx| self.data[idx])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let idx = self.offset(row, col).ok_or(ClaError::OutOfRange {
            index: (row, col),
            shape: self.dims(),
        })?;
        self.data[idx] = value;
        Ok(())
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// New storage with `f` applied to every element.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// New storage combining `self` and `other` elementwise. Shapes must match exactly.
    pub fn zip_with(&self, other: &Storage, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        if self.dims() != other.dims() {
            return Err(ClaError::ShapeMismatch(format!(
                "Operand shapes differ: {}x{} vs {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        Ok(Self {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }
}
