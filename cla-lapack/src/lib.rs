//! `cla-lapack`: LU factorization of dense matrices built on `cla-core`.
//!
//! Factors a square matrix once with partial pivoting and answers solve,
//! inverse and factor queries from the stored result.

pub mod factorization;
pub mod lu;

pub use factorization::{Factorization, LuConfig};
pub use lu::LapackLU;

// Re-export from cla_core
pub use cla_core::{ClaError, Dense, Matrix, Result, Vector};
