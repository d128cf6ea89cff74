use crate::error::{ClaError, Result};
use crate::storage::Storage;
use crate::traits::Dense;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Index, IndexMut, Mul, Neg, Sub};

/// A dense vector of doubles, stored as a single-column `Storage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Storage", into = "Storage")]
pub struct Vector {
    storage: Storage,
}

impl TryFrom<Storage> for Vector {
    type Error = ClaError;

    fn try_from(storage: Storage) -> Result<Self> {
        if storage.cols() != 1 {
            return Err(ClaError::ShapeMismatch(format!(
                "A vector needs exactly one column, got {}",
                storage.cols()
            )));
        }
        Ok(Self { storage })
    }
}

impl From<Vector> for Storage {
    fn from(v: Vector) -> Self {
        v.storage
    }
}

impl Vector {
    /// Creates a zero-filled vector of the given length.
    pub fn new(len: usize) -> Self {
        Self {
            storage: Storage::zeros(len, 1),
        }
    }

    /// Creates a vector that takes ownership of `data`.
    pub fn from_vec(data: Vec<f64>) -> Self {
        Self {
            storage: Storage::column(data),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.storage.data().get(index).copied()
    }

    /// Writes `value` at `index`. Fails with `OutOfRange` and leaves the vector untouched.
    pub fn set(&mut self, index: usize, value: f64) -> Result<()> {
        let len = self.len();
        let slot = self
            .storage
            .data_mut()
            .get_mut(index)
            .ok_or_else(|| ClaError::out_of_range_1d(index, len))?;
        *slot = value;
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.storage.data().iter()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.storage.into_vec()
    }

    pub fn fill(&mut self, value: f64) {
        self.storage.fill(value);
    }

    /// Assigns `value` to every `step`-th element in `start..stop`.
    pub fn fill_range(&mut self, start: usize, stop: usize, step: usize, value: f64) -> Result<()> {
        let len = self.len();
        if stop > len || start > stop {
            return Err(ClaError::out_of_range_1d(stop, len));
        }
        if step == 0 {
            return Err(ClaError::out_of_range_1d(start, len));
        }
        self.storage.data_mut()[start..stop]
            .iter_mut()
            .step_by(step)
            .for_each(|v| *v = value);
        Ok(())
    }

    pub fn add(&self, other: &Vector) -> Result<Vector> {
        Ok(Self {
            storage: self.storage.zip_with(&other.storage, |a, b| a + b)?,
        })
    }

    pub fn sub(&self, other: &Vector) -> Result<Vector> {
        Ok(Self {
            storage: self.storage.zip_with(&other.storage, |a, b| a - b)?,
        })
    }

    pub fn scale(&self, alpha: f64) -> Vector {
        Self {
            storage: self.storage.map(|v| alpha * v),
        }
    }

    /// In-place `self += alpha * x`.
    pub fn axpy(&mut self, alpha: f64, x: &Vector) -> Result<()> {
        if x.len() != self.len() {
            return Err(ClaError::ShapeMismatch(format!(
                "Vector sizes for axpy mismatch: {} != {}",
                x.len(),
                self.len()
            )));
        }
        for (y, &xv) in self.storage.data_mut().iter_mut().zip(x.iter()) {
            *y += alpha * xv;
        }
        Ok(())
    }

    pub fn dot(&self, other: &Vector) -> Result<f64> {
        if other.len() != self.len() {
            return Err(ClaError::ShapeMismatch(format!(
                "Vector sizes for dot product mismatch: {} != {}",
                self.len(),
                other.len()
            )));
        }
        Ok(self.iter().zip(other.iter()).map(|(a, b)| a * b).sum())
    }

    pub fn l2_norm(&self) -> f64 {
        self.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

impl Dense for Vector {
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

impl From<Vec<f64>> for Vector {
    fn from(data: Vec<f64>) -> Self {
        Vector::from_vec(data)
    }
}

impl Index<usize> for Vector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.storage.data()[index]
    }
}

impl IndexMut<usize> for Vector {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.storage.data_mut()[index]
    }
}

impl Add for &Vector {
    type Output = Result<Vector>;

    fn add(self, rhs: &Vector) -> Result<Vector> {
        Vector::add(self, rhs)
    }
}

impl Sub for &Vector {
    type Output = Result<Vector>;

    fn sub(self, rhs: &Vector) -> Result<Vector> {
        Vector::sub(self, rhs)
    }
}

impl Mul<&Vector> for f64 {
    type Output = Vector;

    fn mul(self, rhs: &Vector) -> Vector {
        rhs.scale(self)
    }
}

impl Mul<f64> for &Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        self.scale(rhs)
    }
}

impl Neg for &Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        self.scale(-1.0)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}
