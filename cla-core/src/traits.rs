use bytemuck::{Pod, Zeroable};
use num_traits::{Float, Zero};
use std::fmt::Debug;

/// Generic trait over dense, row-major, exclusively owned element buffers.
/// Implemented by `Matrix` and `Vector`; the interop adapter and the serializer
/// work against this trait.
pub trait Dense: Debug {
    /// The underlying numeric type of the elements.
    type Value: Float + Debug + Default + Pod + Zeroable;

    /// Returns the dimensions as (rows, columns). Vectors report `(len, 1)`.
    fn dims(&self) -> (usize, usize);

    /// Returns the elements in row-major order.
    fn as_slice(&self) -> &[Self::Value];

    /// Returns the elements in row-major order (mutable).
    fn as_mut_slice(&mut self) -> &mut [Self::Value];

    /// Returns the number of rows.
    fn rows(&self) -> usize {
        self.dims().0
    }

    /// Returns the number of columns.
    fn cols(&self) -> usize {
        self.dims().1
    }

    /// Checks if the container is square.
    fn is_square(&self) -> bool {
        let (rows, cols) = self.dims();
        rows == cols
    }

    /// Total number of stored elements.
    fn num_elements(&self) -> usize {
        self.as_slice().len()
    }

    /// Largest absolute elementwise difference, or `None` if shapes differ.
    fn max_abs_diff(&self, other: &Self) -> Option<Self::Value> {
        if self.dims() != other.dims() {
            return None;
        }
        let diff = self
            .as_slice()
            .iter()
            .zip(other.as_slice())
            .fold(Self::Value::zero(), |acc, (&a, &b)| acc.max((a - b).abs()));
        Some(diff)
    }

    /// True when shapes match and every element is within `tol` of its counterpart.
    fn approx_eq(&self, other: &Self, tol: Self::Value) -> bool {
        self.max_abs_diff(other).is_some_and(|d| d <= tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use crate::vector::Vector;

    #[test]
    fn test_max_abs_diff() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::from_vec(2, 2, vec![1.0, 2.5, 2.0, 4.0]).unwrap();
        assert_eq!(a.max_abs_diff(&b), Some(1.0));
        assert_eq!(a.max_abs_diff(&a), Some(0.0));
        assert_eq!(a.max_abs_diff(&Matrix::new(4, 1)), None);
    }

    #[test]
    fn test_approx_eq_and_dims() {
        let v = Vector::from_vec(vec![1.0, 2.0]);
        let w = Vector::from_vec(vec![1.0, 2.0 + 1e-10]);
        assert!(v.approx_eq(&w, 1e-9));
        assert!(!v.approx_eq(&w, 1e-12));
        assert_eq!(Dense::dims(&v), (2, 1));
        assert_eq!(v.num_elements(), 2);
        assert!(!Dense::is_square(&v));
    }
}
