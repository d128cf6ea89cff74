use cla_core::{ClaError, Matrix, Result, Vector};

/// Tolerance settings for LU factorization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LuConfig {
    /// Relative pivot tolerance. A pivot candidate counts as zero when its
    /// magnitude is at or below `epsilon * max|a_ij|` of the input matrix.
    /// An all-zero matrix is always singular.
    pub epsilon: f64,
}

impl Default for LuConfig {
    fn default() -> Self {
        Self { epsilon: 1e-12 }
    }
}

impl LuConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(epsilon: f64) -> Self {
        Self { epsilon }
    }
}

// --- Factorization Trait Definition ---
/// A factored square system that can answer solve and inverse queries
/// without refactoring.
pub trait Factorization {
    /// Order of the factored matrix.
    fn dim(&self) -> usize;

    /// Solves `A x = b` for `x`.
    fn solve(&self, b: &Vector) -> Result<Vector>;

    /// Computes `A^-1`.
    fn inverse(&self) -> Result<Matrix>;

    /// Checks that a right-hand side with `len` rows fits this factorization.
    fn validate_rhs(&self, len: usize) -> Result<()> {
        if len != self.dim() {
            return Err(ClaError::DimensionMismatch(format!(
                "Right-hand side length ({}) must match matrix order ({})",
                len,
                self.dim()
            )));
        }
        Ok(())
    }
}
