//! # Dense Linear Algebra Core
//!
//! Provides the `Matrix` and `Vector` types, the cache-blocked multiplication
//! engine, zero-copy buffer views for host interop and a flat binary encoding.

// Declare modules
pub mod error;
pub mod interop;
pub mod matrix;
pub mod ops;
pub mod serialize;
pub mod storage;
pub mod traits;
pub mod vector;

// Re-export public types
pub use error::{ClaError, Result};
pub use interop::{ArrayView, ArrayViewMut, ElementType, MemoryOrder};
pub use matrix::Matrix;
pub use ops::{multiply_naive, MultiplyConfig};
pub use serialize::{decode, Entity};
pub use storage::Storage;
pub use traits::Dense;
pub use vector::Vector;
