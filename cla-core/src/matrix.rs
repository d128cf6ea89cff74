use crate::error::{ClaError, Result};
use crate::ops::{self, MultiplyConfig};
use crate::storage::Storage;
use crate::traits::Dense;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Index, IndexMut, Mul, Neg, Sub};
use std::time::{Duration, Instant};

/// Represents a dense matrix of doubles stored in row-major order.
///
/// Arithmetic never mutates its operands; every operation returns a new
/// `Matrix`. Shape violations are reported as errors before any work starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Storage", into = "Storage")]
pub struct Matrix {
    storage: Storage,
}

impl From<Storage> for Matrix {
    fn from(storage: Storage) -> Self {
        Self { storage }
    }
}

impl From<Matrix> for Storage {
    fn from(m: Matrix) -> Self {
        m.storage
    }
}

impl Matrix {
    /// Creates a new zero-filled matrix. Panics if `rows * cols` overflows.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            storage: Storage::zeros(rows, cols),
        }
    }

    /// Creates a matrix from a flat row-major sequence of `rows * cols` values.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        Ok(Self {
            storage: Storage::from_vec(rows, cols, data)?,
        })
    }

    /// Creates a matrix from a slice of equally long rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(ClaError::ShapeMismatch(format!(
                    "Row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Self::from_vec(rows.len(), cols, data)
    }

    /// The `n x n` identity.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    pub fn shape(&self) -> (usize, usize) {
        self.storage.dims()
    }

    pub fn rows(&self) -> usize {
        self.storage.rows()
    }

    pub fn cols(&self) -> usize {
        self.storage.cols()
    }

    pub fn is_square(&self) -> bool {
        self.rows() == self.cols()
    }

    pub fn data(&self) -> &[f64] {
        self.storage.data()
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        self.storage.data_mut()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.storage.into_vec()
    }

    /// Gets the element at the specified row and column.
    /// Returns None if indices are out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.storage.get(row, col)
    }

    /// Sets the element at the specified row and column.
    /// Fails with `OutOfRange` and leaves the matrix unchanged if indices are out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.storage.set(row, col, value)
    }

    pub fn fill(&mut self, value: f64) {
        self.storage.fill(value);
    }

    /// Row `i` as a contiguous slice. Panics if `i >= rows`.
    pub fn row(&self, i: usize) -> &[f64] {
        let cols = self.cols();
        &self.data()[i * cols..(i + 1) * cols]
    }

    /// Column `j` copied into a `Vector`. Panics if `j >= cols`.
    pub fn col(&self, j: usize) -> Vector {
        assert!(j < self.cols(), "column index {} out of range", j);
        Vector::from_vec((0..self.rows()).map(|i| self[(i, j)]).collect())
    }

    pub fn transpose(&self) -> Matrix {
        let (rows, cols) = self.shape();
        let mut t = Matrix::new(cols, rows);
        for i in 0..rows {
            for (j, &v) in self.row(i).iter().enumerate() {
                t[(j, i)] = v;
            }
        }
        t
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        Ok(Self {
            storage: self.storage.zip_with(&other.storage, |a, b| a + b)?,
        })
    }

    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        Ok(Self {
            storage: self.storage.zip_with(&other.storage, |a, b| a - b)?,
        })
    }

    pub fn scale(&self, alpha: f64) -> Matrix {
        Self {
            storage: self.storage.map(|v| alpha * v),
        }
    }

    /// Matrix-vector product `self * x`.
    pub fn mat_vec(&self, x: &Vector) -> Result<Vector> {
        if self.cols() != x.len() {
            return Err(ClaError::DimensionMismatch(format!(
                "Matrix columns ({}) must match vector length ({})",
                self.cols(),
                x.len()
            )));
        }
        let y = (0..self.rows())
            .map(|i| self.row(i).iter().zip(x.iter()).map(|(a, b)| a * b).sum())
            .collect();
        Ok(Vector::from_vec(y))
    }

    /// Matrix product `self * other` with the default blocking parameters.
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix> {
        self.matmul_with(other, &MultiplyConfig::default())
    }

    /// Matrix product `self * other` with explicit blocking parameters.
    pub fn matmul_with(&self, other: &Matrix, config: &MultiplyConfig) -> Result<Matrix> {
        ops::check_conformant(self, other)?;
        let mut out = Matrix::new(self.rows(), other.cols());
        ops::multiply_blocked(self, other, &mut out, config);
        Ok(out)
    }

    /// Writes `self * other` into `out`, reusing its buffer.
    ///
    /// `out` must already have shape `(self.rows, other.cols)`; it is left
    /// untouched when validation fails.
    pub fn matmul_into(&self, other: &Matrix, out: &mut Matrix) -> Result<()> {
        ops::check_conformant(self, other)?;
        if out.shape() != (self.rows(), other.cols()) {
            return Err(ClaError::ShapeMismatch(format!(
                "Output shape {:?} does not match product shape ({}, {})",
                out.shape(),
                self.rows(),
                other.cols()
            )));
        }
        out.fill(0.0);
        ops::multiply_blocked(self, other, out, &MultiplyConfig::default());
        Ok(())
    }

    /// Same product as `matmul`, also reporting the wall time of the kernel alone.
    ///
    /// Validation and the output allocation happen before the clock starts.
    pub fn timed_mult(&self, other: &Matrix) -> Result<(Matrix, Duration)> {
        ops::check_conformant(self, other)?;
        let config = MultiplyConfig::default();
        let mut out = Matrix::new(self.rows(), other.cols());

        let start = Instant::now();
        ops::multiply_blocked(self, other, &mut out, &config);
        let elapsed = start.elapsed();

        log::info!(
            "multiplication of {}x{} by {}x{} took {:?}",
            self.rows(),
            self.cols(),
            other.rows(),
            other.cols(),
            elapsed
        );
        Ok((out, elapsed))
    }
}

impl Dense for Matrix {
    type Value = f64;

    fn dims(&self) -> (usize, usize) {
        self.storage.dims()
    }

    fn as_slice(&self) -> &[f64] {
        self.storage.data()
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        self.storage.data_mut()
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        match self.storage.offset(row, col) {
            Some(idx) => &self.storage.data()[idx],
            None => panic!(
                "index ({}, {}) out of range for {:?} matrix",
                row,
                col,
                self.shape()
            ),
        }
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        match self.storage.offset(row, col) {
            Some(idx) => &mut self.storage.data_mut()[idx],
            None => panic!(
                "index ({}, {}) out of range for {:?} matrix",
                row,
                col,
                self.shape()
            ),
        }
    }
}

impl Add for &Matrix {
    type Output = Result<Matrix>;

    fn add(self, rhs: &Matrix) -> Result<Matrix> {
        Matrix::add(self, rhs)
    }
}

impl Sub for &Matrix {
    type Output = Result<Matrix>;

    fn sub(self, rhs: &Matrix) -> Result<Matrix> {
        Matrix::sub(self, rhs)
    }
}

impl Mul for &Matrix {
    type Output = Result<Matrix>;

    fn mul(self, rhs: &Matrix) -> Result<Matrix> {
        self.matmul(rhs)
    }
}

impl Mul<&Vector> for &Matrix {
    type Output = Result<Vector>;

    fn mul(self, rhs: &Vector) -> Result<Vector> {
        self.mat_vec(rhs)
    }
}

impl Mul<&Matrix> for f64 {
    type Output = Matrix;

    fn mul(self, rhs: &Matrix) -> Matrix {
        rhs.scale(self)
    }
}

impl Mul<f64> for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: f64) -> Matrix {
        self.scale(rhs)
    }
}

impl Neg for &Matrix {
    type Output = Matrix;

    fn neg(self) -> Matrix {
        self.scale(-1.0)
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows() {
            write!(f, "[")?;
            for (j, v) in self.row(i).iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", v)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}
