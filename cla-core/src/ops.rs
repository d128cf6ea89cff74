// Dense matrix multiplication kernels.
// `Matrix::matmul`, `Matrix::matmul_into` and `Matrix::timed_mult` validate
// their operands and then call into `multiply_blocked`.

use crate::error::{ClaError, Result};
use crate::matrix::Matrix;
use cfg_if::cfg_if;
use std::ops::Range;

/// Height of the register tile of C.
pub const TILE_ROWS: usize = 4;
/// Width of the register tile of C.
pub const TILE_COLS: usize = 12;

/// Blocking parameters of the multiplication engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplyConfig {
    /// Rows of C per band. A band is the unit handed to a worker.
    pub block_rows: usize,
    /// Depth (shared dimension) per cache block.
    pub block_depth: usize,
    /// Minimum `m * n * k` before bands are spread over the thread pool.
    pub parallel_threshold: usize,
}

impl Default for MultiplyConfig {
    fn default() -> Self {
        Self {
            block_rows: 96,  // 96x96 blocks of A fit in L2
            block_depth: 96,
            parallel_threshold: 128 * 128 * 128,
        }
    }
}

impl MultiplyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(block_rows: usize, block_depth: usize, parallel_threshold: usize) -> Self {
        Self {
            block_rows,
            block_depth,
            parallel_threshold,
        }
    }

    /// Forces the sequential band loop regardless of problem size.
    pub fn sequential() -> Self {
        Self {
            parallel_threshold: usize::MAX,
            ..Self::default()
        }
    }
}

pub(crate) fn check_conformant(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(ClaError::DimensionMismatch(format!(
            "Cannot multiply {}x{} by {}x{}",
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols()
        )));
    }
    Ok(())
}

/// Reference triple-loop product. Slow; used to check the blocked kernel.
pub fn multiply_naive(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    check_conformant(a, b)?;
    let (m, k) = a.shape();
    let n = b.cols();
    let mut c = Matrix::new(m, n);
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0;
            for p in 0..k {
                sum += a[(i, p)] * b[(p, j)];
            }
            c[(i, j)] = sum;
        }
    }
    Ok(c)
}

/// Accumulates `a * b` into `c`.
///
/// Callers have checked that `a.cols == b.rows` and that `c` has shape
/// `(a.rows, b.cols)`. C is split into bands of `block_rows` rows; every band
/// is owned by exactly one worker, and the accumulation order inside a band
/// does not depend on how bands are scheduled.
pub(crate) fn multiply_blocked(a: &Matrix, b: &Matrix, c: &mut Matrix, config: &MultiplyConfig) {
    let (m, k) = a.shape();
    let n = b.cols();
    if m == 0 || n == 0 || k == 0 {
        return;
    }

    // Blocks never exceed the problem, so `band_rows * n` stays within `m * n`.
    let band_rows = config.block_rows.clamp(1, m);
    let operands = Operands {
        a: a.data(),
        b: b.data(),
        k,
        n,
        depth: config.block_depth.clamp(1, k),
    };
    let work = m.saturating_mul(n).saturating_mul(k);
    let c_data = c.data_mut();

    cfg_if! {
        if #[cfg(feature = "native")] {
            if work >= config.parallel_threshold {
                use rayon::prelude::*;
                log::debug!(
                    "blocked multiply {}x{}x{}: {} bands on {} threads",
                    m,
                    k,
                    n,
                    m.div_ceil(band_rows),
                    rayon::current_num_threads()
                );
                c_data
                    .par_chunks_mut(band_rows * n)
                    .enumerate()
                    .for_each(|(idx, c_band)| operands.band(idx * band_rows, c_band));
                return;
            }
        }
    }

    log::debug!(
        "blocked multiply {}x{}x{}: {} bands, sequential (work {})",
        m,
        k,
        n,
        m.div_ceil(band_rows),
        work
    );
    c_data
        .chunks_mut(band_rows * n)
        .enumerate()
        .for_each(|(idx, c_band)| operands.band(idx * band_rows, c_band));
}

/// Row-major operand buffers: A is `m x k`, B is `k x n`.
struct Operands<'a> {
    a: &'a [f64],
    b: &'a [f64],
    k: usize,
    n: usize,
    depth: usize,
}

impl Operands<'_> {
    /// Computes the rows of C starting at `row0` into `c_band`.
    fn band(&self, row0: usize, c_band: &mut [f64]) {
        let rows = c_band.len() / self.n;
        for p0 in (0..self.k).step_by(self.depth) {
            let p1 = (p0 + self.depth).min(self.k);
            // The depth-block x TILE_COLS panel of B stays hot while i sweeps the band.
            for j in (0..self.n).step_by(TILE_COLS) {
                let nr = TILE_COLS.min(self.n - j);
                for i in (0..rows).step_by(TILE_ROWS) {
                    let mr = TILE_ROWS.min(rows - i);
                    if mr == TILE_ROWS && nr == TILE_COLS {
                        // constant extents, fully unrolled after inlining
                        self.tile(c_band, row0, i, j, p0..p1, TILE_ROWS, TILE_COLS);
                    } else {
                        self.tile(c_band, row0, i, j, p0..p1, mr, nr);
                    }
                }
            }
        }
    }

    /// `C[i..i+mr, j..j+nr] += A[i..i+mr, depth] * B[depth, j..j+nr]`, with `i`
    /// relative to the band.
    #[inline(always)]
    #[allow(clippy::too_many_arguments)]
    fn tile(
        &self,
        c_band: &mut [f64],
        row0: usize,
        i: usize,
        j: usize,
        depth: Range<usize>,
        mr: usize,
        nr: usize,
    ) {
        let mut acc = [[0.0f64; TILE_COLS]; TILE_ROWS];
        for p in depth {
            let b_row = &self.b[p * self.n + j..p * self.n + j + nr];
            for (r, acc_row) in acc.iter_mut().enumerate().take(mr) {
                let a_ip = self.a[(row0 + i + r) * self.k + p];
                for (acc_v, &b_v) in acc_row[..nr].iter_mut().zip(b_row) {
                    *acc_v += a_ip * b_v;
                }
            }
        }
        for (r, acc_row) in acc.iter().enumerate().take(mr) {
            let start = (i + r) * self.n + j;
            for (c_v, &acc_v) in c_band[start..start + nr].iter_mut().zip(&acc_row[..nr]) {
                *c_v += acc_v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Dense;

    fn random_matrix(rng: &mut fastrand::Rng, rows: usize, cols: usize) -> Matrix {
        let data = (0..rows * cols).map(|_| rng.f64() * 2.0 - 1.0).collect();
        Matrix::from_vec(rows, cols, data).unwrap()
    }

    fn assert_close_to_naive(a: &Matrix, b: &Matrix, config: &MultiplyConfig) {
        let blocked = a.matmul_with(b, config).unwrap();
        let naive = multiply_naive(a, b).unwrap();
        assert_eq!(blocked.shape(), naive.shape());
        for (x, y) in blocked.as_slice().iter().zip(naive.as_slice()) {
            let scale = y.abs().max(1.0);
            assert!(
                (x - y).abs() <= 1e-9 * scale,
                "blocked {} vs naive {}",
                x,
                y
            );
        }
    }

    #[test]
    fn test_blocked_matches_naive_small_shapes() {
        let mut rng = fastrand::Rng::with_seed(7);
        let config = MultiplyConfig::default();
        for &(m, k, n) in &[(1, 1, 1), (1, 5, 1), (3, 5, 7), (8, 8, 8), (4, 1, 12), (5, 2, 13)] {
            let a = random_matrix(&mut rng, m, k);
            let b = random_matrix(&mut rng, k, n);
            assert_close_to_naive(&a, &b, &config);
        }
    }

    #[test]
    fn test_blocked_matches_naive_uneven_blocks() {
        // block sizes that do not divide any dimension
        let mut rng = fastrand::Rng::with_seed(11);
        let config = MultiplyConfig::with_params(5, 3, 0);
        let a = random_matrix(&mut rng, 37, 29);
        let b = random_matrix(&mut rng, 29, 41);
        assert_close_to_naive(&a, &b, &config);
    }

    #[test]
    fn test_parallel_and_sequential_are_identical() {
        let mut rng = fastrand::Rng::with_seed(3);
        let a = random_matrix(&mut rng, 130, 70);
        let b = random_matrix(&mut rng, 70, 90);
        let par = a
            .matmul_with(&b, &MultiplyConfig::with_params(16, 32, 0))
            .unwrap();
        let seq = a
            .matmul_with(&b, &MultiplyConfig::with_params(16, 32, usize::MAX))
            .unwrap();
        assert_eq!(par, seq);
    }

    #[test]
    fn test_empty_dimensions() {
        let a = Matrix::new(3, 0);
        let b = Matrix::new(0, 4);
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.shape(), (3, 4));
        assert!(c.as_slice().iter().all(|&v| v == 0.0));

        let c = Matrix::new(0, 2).matmul(&Matrix::new(2, 5)).unwrap();
        assert_eq!(c.shape(), (0, 5));
    }

    #[test]
    fn test_naive_dimension_mismatch() {
        let a = Matrix::new(2, 3);
        assert!(matches!(
            multiply_naive(&a, &a),
            Err(ClaError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_zero_block_params_are_clamped() {
        let a = Matrix::identity(6);
        let b = Matrix::from_vec(6, 1, (0..6).map(f64::from).collect()).unwrap();
        let c = a
            .matmul_with(&b, &MultiplyConfig::with_params(0, 0, usize::MAX))
            .unwrap();
        assert_eq!(c, b);
    }

    #[test]
    fn test_oversized_block_params_are_clamped() {
        let mut rng = fastrand::Rng::with_seed(21);
        let a = random_matrix(&mut rng, 5, 7);
        let b = random_matrix(&mut rng, 7, 3);
        let expected = multiply_naive(&a, &b).unwrap();
        for config in [
            MultiplyConfig::with_params(usize::MAX, 96, usize::MAX),
            MultiplyConfig::with_params(usize::MAX, usize::MAX, 0),
        ] {
            let c = a.matmul_with(&b, &config).unwrap();
            assert!(c.approx_eq(&expected, 1e-12));
        }
        let eye = Matrix::identity(3);
        let c = eye
            .matmul_with(&eye, &MultiplyConfig::with_params(usize::MAX, 96, usize::MAX))
            .unwrap();
        assert_eq!(c, eye);
    }
}
