//! Dense LU factorization with partial pivoting.

use crate::factorization::{Factorization, LuConfig};
use cla_core::{ClaError, Dense, Matrix, Result, Vector};

/// LU factorization `P·A = L·U` of a square matrix.
///
/// The factorization is computed once, from a private copy of `A`, and never
/// changes afterwards. A zero pivot does not abort construction; it is
/// recorded and reported by `solve`, `solve_matrix` and `inverse` as
/// `ClaError::SingularMatrix`.
#[derive(Debug, Clone)]
pub struct LapackLU {
    /// L strictly below the diagonal (unit diagonal implied), U on and above it.
    lu: Matrix,
    /// Row `i` of `P·A` is row `perm[i]` of `A`.
    perm: Vec<usize>,
    pivot_sign: f64,
    /// First column whose pivot was at or below `config.epsilon * max|a_ij|`.
    singular: Option<usize>,
    config: LuConfig,
}

impl LapackLU {
    /// Factors a copy of `a` with the default tolerance.
    pub fn new(a: &Matrix) -> Result<Self> {
        Self::with_config(a, LuConfig::default())
    }

    pub fn with_config(a: &Matrix, config: LuConfig) -> Result<Self> {
        Self::factor(a.clone(), config)
    }

    /// Factors `a` in its own buffer.
    pub fn from_matrix(a: Matrix) -> Result<Self> {
        Self::factor(a, LuConfig::default())
    }

    fn factor(mut lu: Matrix, config: LuConfig) -> Result<Self> {
        if !lu.is_square() {
            return Err(ClaError::DimensionMismatch(format!(
                "LU factorization requires a square matrix (dims: {}x{})",
                lu.rows(),
                lu.cols()
            )));
        }

        let n = lu.rows();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut pivot_sign = 1.0;
        let mut singular = None;
        let data = lu.data_mut();

        // Pivot tolerance is relative to the largest entry of A.
        let scale = data.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let threshold = config.epsilon * scale;

        for k in 0..n {
            // Find pivot
            let mut max_row = k;
            let mut max_val = data[k * n + k].abs();
            for i in (k + 1)..n {
                let val = data[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val.is_nan() || max_val <= threshold {
                if singular.is_none() {
                    singular = Some(k);
                }
                for i in (k + 1)..n {
                    data[i * n + k] = 0.0;
                }
                continue;
            }

            if max_row != k {
                swap_rows(data, n, k, max_row);
                perm.swap(k, max_row);
                pivot_sign = -pivot_sign;
            }

            // Compute multipliers and eliminate
            let (upper, lower) = data.split_at_mut((k + 1) * n);
            let pivot_row = &upper[k * n..];
            let pivot = pivot_row[k];
            for row in lower.chunks_exact_mut(n) {
                let mult = row[k] / pivot;
                row[k] = mult;
                if mult != 0.0 {
                    axpy_row(&mut row[k + 1..], -mult, &pivot_row[k + 1..]);
                }
            }
        }

        if let Some(col) = singular {
            log::warn!(
                "{}x{} matrix is singular: pivot in column {} is at or below {:e} (max |a_ij| = {:e})",
                n,
                n,
                col,
                threshold,
                scale
            );
        }
        log::debug!("factored {}x{} matrix, pivot sign {}", n, n, pivot_sign);

        Ok(Self {
            lu,
            perm,
            pivot_sign,
            singular,
            config,
        })
    }

    pub fn dim(&self) -> usize {
        self.lu.rows()
    }

    pub fn config(&self) -> &LuConfig {
        &self.config
    }

    /// Unit lower-triangular factor `L`.
    pub fn l_factor(&self) -> Matrix {
        let n = self.dim();
        let mut l = Matrix::identity(n);
        for i in 0..n {
            for j in 0..i {
                l[(i, j)] = self.lu[(i, j)];
            }
        }
        l
    }

    /// Upper-triangular factor `U`.
    pub fn u_factor(&self) -> Matrix {
        let n = self.dim();
        let mut u = Matrix::new(n, n);
        for i in 0..n {
            for j in i..n {
                u[(i, j)] = self.lu[(i, j)];
            }
        }
        u
    }

    /// Permutation matrix `P` with `P[i, pivots()[i]] = 1`, so that `P·A = L·U`.
    pub fn p_factor(&self) -> Matrix {
        let n = self.dim();
        let mut p = Matrix::new(n, n);
        for (i, &src) in self.perm.iter().enumerate() {
            p[(i, src)] = 1.0;
        }
        p
    }

    /// Row order of `P·A` as indices into `A`.
    pub fn pivots(&self) -> &[usize] {
        &self.perm
    }

    /// `+1.0` for an even number of row interchanges, `-1.0` for odd.
    pub fn pivot_sign(&self) -> f64 {
        self.pivot_sign
    }

    pub fn is_singular(&self) -> bool {
        self.singular.is_some()
    }

    /// Column of the first zero pivot, if any.
    pub fn singular_pivot(&self) -> Option<usize> {
        self.singular
    }

    /// `det(A)`; exactly zero for a singular factorization.
    pub fn determinant(&self) -> f64 {
        if self.is_singular() {
            return 0.0;
        }
        let diag: f64 = (0..self.dim()).map(|i| self.lu[(i, i)]).product();
        self.pivot_sign * diag
    }

    /// Solves `A x = b`.
    pub fn solve(&self, b: &Vector) -> Result<Vector> {
        self.validate_rhs(b.len())?;
        self.ensure_nonsingular()?;
        let mut x = self.permute(b.as_slice(), 1);
        self.substitute(&mut x, 1);
        Ok(Vector::from_vec(x))
    }

    /// Overwrites `b` with the solution of `A x = b`. `b` is untouched on error.
    pub fn solve_in_place(&self, b: &mut Vector) -> Result<()> {
        let x = self.solve(b)?;
        b.as_mut_slice().copy_from_slice(x.as_slice());
        Ok(())
    }

    /// Solves `A X = B` for every column of `B` at once.
    pub fn solve_matrix(&self, b: &Matrix) -> Result<Matrix> {
        self.validate_rhs(b.rows())?;
        self.ensure_nonsingular()?;
        let m = b.cols();
        let mut x = self.permute(b.data(), m);
        self.substitute(&mut x, m);
        Matrix::from_vec(self.dim(), m, x)
    }

    /// `A^-1`, assembled by solving against the identity.
    pub fn inverse(&self) -> Result<Matrix> {
        self.solve_matrix(&Matrix::identity(self.dim()))
    }

    fn ensure_nonsingular(&self) -> Result<()> {
        match self.singular {
            Some(pivot) => Err(ClaError::SingularMatrix { pivot }),
            None => Ok(()),
        }
    }

    /// Rows of the row-major `n x m` block `b`, reordered into `P·b`.
    fn permute(&self, b: &[f64], m: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(b.len());
        for &src in &self.perm {
            out.extend_from_slice(&b[src * m..(src + 1) * m]);
        }
        out
    }

    /// Replaces the permuted `n x m` block `x` with `U^-1 · L^-1 · x`.
    fn substitute(&self, x: &mut [f64], m: usize) {
        let n = self.dim();
        let lu = self.lu.data();

        // Forward substitution: L y = P b
        for i in 1..n {
            let (done, rest) = x.split_at_mut(i * m);
            let row = &mut rest[..m];
            for (j, &l) in lu[i * n..i * n + i].iter().enumerate() {
                if l != 0.0 {
                    axpy_row(row, -l, &done[j * m..(j + 1) * m]);
                }
            }
        }

        // Backward substitution: U x = y
        for i in (0..n).rev() {
            let (head, tail) = x.split_at_mut((i + 1) * m);
            let row = &mut head[i * m..];
            for (off, &u) in lu[i * n + i + 1..(i + 1) * n].iter().enumerate() {
                if u != 0.0 {
                    axpy_row(row, -u, &tail[off * m..(off + 1) * m]);
                }
            }
            let diag = lu[i * n + i];
            for v in row.iter_mut() {
                *v /= diag;
            }
        }
    }
}

impl Factorization for LapackLU {
    fn dim(&self) -> usize {
        LapackLU::dim(self)
    }

    fn solve(&self, b: &Vector) -> Result<Vector> {
        LapackLU::solve(self, b)
    }

    fn inverse(&self) -> Result<Matrix> {
        LapackLU::inverse(self)
    }
}

/// `y += alpha * x`
#[inline]
fn axpy_row(y: &mut [f64], alpha: f64, x: &[f64]) {
    for (y_v, &x_v) in y.iter_mut().zip(x) {
        *y_v += alpha * x_v;
    }
}

fn swap_rows(data: &mut [f64], n: usize, r1: usize, r2: usize) {
    let (lo, hi) = (r1.min(r2), r1.max(r2));
    let (top, bottom) = data.split_at_mut(hi * n);
    top[lo * n..(lo + 1) * n].swap_with_slice(&mut bottom[..n]);
}
