//! Described-buffer exchange with external array libraries.
//!
//! An [`ArrayView`] carries borrowed bytes plus element type, shape and byte
//! strides, the same information a buffer protocol hands across a language
//! boundary. Exports borrow the owning `Matrix`/`Vector`, so the owner cannot
//! be mutated or dropped while a view is alive. Imports always copy into fresh
//! row-major storage.

use crate::error::{ClaError, Result};
use crate::matrix::Matrix;
use crate::traits::Dense;
use crate::vector::Vector;
use std::mem;

/// Element type tag of an exchanged buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F64,
    I32,
    I64,
    U8,
}

impl ElementType {
    /// Width of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            ElementType::F32 | ElementType::I32 => 4,
            ElementType::F64 | ElementType::I64 => 8,
            ElementType::U8 => 1,
        }
    }

    /// Struct-module style format character ("d" for f64).
    pub fn format(self) -> &'static str {
        match self {
            ElementType::F32 => "f",
            ElementType::F64 => "d",
            ElementType::I32 => "i",
            ElementType::I64 => "q",
            ElementType::U8 => "B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOrder {
    /// "C" order: the last index varies fastest.
    RowMajor,
    /// "F" order: the first index varies fastest.
    ColMajor,
}

/// Byte strides of a contiguous array with the given shape and order.
fn contiguous_strides(shape: &[usize], itemsize: usize, order: MemoryOrder) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut step = itemsize;
    let axes: Vec<usize> = match order {
        MemoryOrder::RowMajor => (0..shape.len()).rev().collect(),
        MemoryOrder::ColMajor => (0..shape.len()).collect(),
    };
    for axis in axes {
        strides[axis] = step;
        step = step.saturating_mul(shape[axis].max(1));
    }
    strides
}

/// Number of bytes a strided array reaches into its buffer.
fn required_bytes(shape: &[usize], strides: &[usize], itemsize: usize) -> Result<usize> {
    if shape.iter().any(|&d| d == 0) {
        return Ok(0);
    }
    shape
        .iter()
        .zip(strides)
        .try_fold(itemsize, |acc, (&dim, &stride)| {
            (dim - 1)
                .checked_mul(stride)
                .and_then(|reach| acc.checked_add(reach))
        })
        .ok_or_else(|| ClaError::MalformedData("Array extent overflows usize".to_string()))
}

fn validate_layout(
    len: usize,
    dtype: ElementType,
    shape: &[usize],
    strides: &[usize],
) -> Result<()> {
    if shape.len() != strides.len() {
        return Err(ClaError::MalformedData(format!(
            "Shape has {} axes but {} strides were given",
            shape.len(),
            strides.len()
        )));
    }
    // Zero strides let a tiny buffer describe a huge array; bound the logical size too.
    let fits = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .and_then(|count| count.checked_mul(dtype.size().max(mem::size_of::<f64>())))
        .is_some_and(|bytes| bytes <= isize::MAX as usize);
    if !fits {
        return Err(ClaError::MalformedData(format!(
            "Array of shape {:?} exceeds the addressable size",
            shape
        )));
    }
    let needed = required_bytes(shape, strides, dtype.size())?;
    if needed > len {
        return Err(ClaError::MalformedData(format!(
            "Array needs {} bytes but the buffer holds {}",
            needed, len
        )));
    }
    Ok(())
}

/// Read-only described buffer.
#[derive(Debug, Clone)]
pub struct ArrayView<'a> {
    data: &'a [u8],
    dtype: ElementType,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl<'a> ArrayView<'a> {
    /// Describes a contiguous array in the given memory order.
    pub fn new(
        data: &'a [u8],
        dtype: ElementType,
        shape: Vec<usize>,
        order: MemoryOrder,
    ) -> Result<Self> {
        let strides = contiguous_strides(&shape, dtype.size(), order);
        Self::with_strides(data, dtype, shape, strides)
    }

    /// Describes an arbitrarily strided array. Strides are in bytes.
    pub fn with_strides(
        data: &'a [u8],
        dtype: ElementType,
        shape: Vec<usize>,
        strides: Vec<usize>,
    ) -> Result<Self> {
        validate_layout(data.len(), dtype, &shape, &strides)?;
        Ok(Self {
            data,
            dtype,
            shape,
            strides,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_row_major_contiguous(&self) -> bool {
        self.num_elements() == 0
            || self.strides == contiguous_strides(&self.shape, self.dtype.size(), MemoryOrder::RowMajor)
    }

    /// Typed zero-copy access for contiguous, aligned f64 data.
    pub fn as_f64_slice(&self) -> Option<&'a [f64]> {
        if self.dtype != ElementType::F64 || !self.is_row_major_contiguous() {
            return None;
        }
        let data: &'a [u8] = self.data;
        let bytes = &data[..self.num_elements() * mem::size_of::<f64>()];
        bytemuck::try_cast_slice(bytes).ok()
    }

    /// Reads the f64 at the given byte offset, tolerating misalignment.
    fn read_f64(&self, offset: usize) -> f64 {
        bytemuck::pod_read_unaligned(&self.data[offset..offset + mem::size_of::<f64>()])
    }

    fn expect_f64(&self, ndim: usize, target: &str) -> Result<()> {
        if self.dtype != ElementType::F64 {
            return Err(ClaError::TypeOrShapeMismatch(format!(
                "{} needs float64 elements, got {:?} ('{}')",
                target,
                self.dtype,
                self.dtype.format()
            )));
        }
        if self.ndim() != ndim {
            return Err(ClaError::TypeOrShapeMismatch(format!(
                "{} needs a {}-D array, got {} dimensions",
                target,
                ndim,
                self.ndim()
            )));
        }
        Ok(())
    }

    /// Copies the elements into a row-major `Vec`, following the strides.
    ///
    /// Fails with `MalformedData` when the copy cannot be allocated.
    fn gather(&self) -> Result<Vec<f64>> {
        if let Some(slice) = self.as_f64_slice() {
            return Ok(slice.to_vec());
        }
        let mut out = Vec::new();
        out.try_reserve_exact(self.num_elements()).map_err(|e| {
            ClaError::MalformedData(format!(
                "Cannot allocate {} elements for array of shape {:?}: {}",
                self.num_elements(),
                self.shape,
                e
            ))
        })?;
        match self.shape.as_slice() {
            [len] => out.extend((0..*len).map(|i| self.read_f64(i * self.strides[0]))),
            [rows, cols] => {
                for i in 0..*rows {
                    for j in 0..*cols {
                        out.push(self.read_f64(i * self.strides[0] + j * self.strides[1]));
                    }
                }
            }
            _ => unreachable!("dimensionality is checked before gathering"),
        }
        Ok(out)
    }
}

/// Writable described buffer, exported from a mutably borrowed owner.
#[derive(Debug)]
pub struct ArrayViewMut<'a> {
    data: &'a mut [u8],
    dtype: ElementType,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl ArrayViewMut<'_> {
    pub fn data(&self) -> &[u8] {
        &*self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut *self.data
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Writes through to the owner's buffer.
    pub fn as_f64_slice_mut(&mut self) -> &mut [f64] {
        bytemuck::cast_slice_mut(&mut *self.data)
    }
}

fn export<T: Dense<Value = f64>>(owner: &T, shape: Vec<usize>) -> ArrayView<'_> {
    let strides = contiguous_strides(&shape, mem::size_of::<f64>(), MemoryOrder::RowMajor);
    ArrayView {
        data: bytemuck::cast_slice(owner.as_slice()),
        dtype: ElementType::F64,
        shape,
        strides,
    }
}

fn export_mut<T: Dense<Value = f64>>(owner: &mut T, shape: Vec<usize>) -> ArrayViewMut<'_> {
    let strides = contiguous_strides(&shape, mem::size_of::<f64>(), MemoryOrder::RowMajor);
    ArrayViewMut {
        data: bytemuck::cast_slice_mut(owner.as_mut_slice()),
        dtype: ElementType::F64,
        shape,
        strides,
    }
}

impl Matrix {
    /// Zero-copy 2-D row-major view of this matrix.
    pub fn as_array(&self) -> ArrayView<'_> {
        export(self, vec![self.rows(), self.cols()])
    }

    /// Zero-copy writable 2-D row-major view of this matrix.
    pub fn as_array_mut(&mut self) -> ArrayViewMut<'_> {
        let shape = vec![self.rows(), self.cols()];
        export_mut(self, shape)
    }

    /// Builds a matrix from a 2-D float64 array of any memory order.
    pub fn from_array(array: &ArrayView<'_>) -> Result<Matrix> {
        array.expect_f64(2, "Matrix")?;
        let (rows, cols) = (array.shape[0], array.shape[1]);
        log::debug!(
            "importing {}x{} array (row-major contiguous: {})",
            rows,
            cols,
            array.is_row_major_contiguous()
        );
        Matrix::from_vec(rows, cols, array.gather()?)
    }
}

impl Vector {
    /// Zero-copy 1-D view of this vector.
    pub fn as_array(&self) -> ArrayView<'_> {
        export(self, vec![self.len()])
    }

    /// Zero-copy writable 1-D view of this vector.
    pub fn as_array_mut(&mut self) -> ArrayViewMut<'_> {
        let shape = vec![self.len()];
        export_mut(self, shape)
    }

    /// Builds a vector from a 1-D float64 array.
    pub fn from_array(array: &ArrayView<'_>) -> Result<Vector> {
        array.expect_f64(1, "Vector")?;
        Ok(Vector::from_vec(array.gather()?))
    }
}
