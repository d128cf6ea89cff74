use cla_lapack::{ClaError, Dense, Factorization, LapackLU, Matrix, Vector};

// Helper for float comparison in tests
fn assert_approx_eq_vec(a: &[f64], b: &[f64], tolerance: f64) {
    assert_eq!(a.len(), b.len(), "Vector lengths differ");
    for i in 0..a.len() {
        let diff = (a[i] - b[i]).abs();
        assert!(
            diff <= tolerance,
            "Verification failed at index {}: expected {}, got {}, diff {}",
            i,
            b[i],
            a[i],
            diff
        );
    }
}

/// Random matrix with entries in [-1, 1) and `shift` added to the diagonal.
fn random_matrix(rng: &mut fastrand::Rng, n: usize, shift: f64) -> Matrix {
    let mut a = Matrix::from_vec(n, n, (0..n * n).map(|_| rng.f64() * 2.0 - 1.0).collect())
        .unwrap();
    for i in 0..n {
        a[(i, i)] += shift;
    }
    a
}

fn scenario_matrix() -> Matrix {
    Matrix::from_rows(&[
        vec![6.0, 5.0, 3.0, -10.0],
        vec![3.0, 7.0, -3.0, 5.0],
        vec![12.0, 4.0, 4.0, 4.0],
        vec![0.0, 12.0, 0.0, -8.0],
    ])
    .unwrap()
}

#[test]
fn test_lu_scenario_factors() -> Result<(), ClaError> {
    let a = scenario_matrix();
    let lu = LapackLU::new(&a)?;

    let l = lu.l_factor();
    let u = lu.u_factor();
    let p = lu.p_factor();
    let lu_prod = l.matmul(&u)?;
    let pa = p.matmul(&a)?;
    assert_approx_eq_vec(lu_prod.as_slice(), pa.as_slice(), 1e-12);

    // P is a permutation: one 1.0 per row and column
    for i in 0..4 {
        assert_eq!(p.row(i).iter().sum::<f64>(), 1.0);
        assert_eq!(p.col(i).iter().sum::<f64>(), 1.0);
    }
    // 12 is the largest entry of column 0
    assert_eq!(lu.pivots()[0], 2);

    let x = lu.solve(&Vector::new(4))?;
    assert_eq!(x.as_slice(), &[0.0; 4]);
    Ok(())
}

#[test]
fn test_lu_scenario_solve_and_inverse() -> Result<(), ClaError> {
    let a = scenario_matrix();
    let lu = LapackLU::new(&a)?;

    let b = Vector::from_vec(vec![1.0, -2.0, 3.0, 0.5]);
    let x = lu.solve(&b)?;
    let ax = a.mat_vec(&x)?;
    assert_approx_eq_vec(ax.as_slice(), b.as_slice(), 1e-10);

    let inv = lu.inverse()?;
    let eye = a.matmul(&inv)?;
    assert_approx_eq_vec(eye.as_slice(), Matrix::identity(4).as_slice(), 1e-10);

    let det = lu.determinant();
    assert!(det.abs() > 1.0, "determinant {} should be well away from zero", det);
    Ok(())
}

#[test]
fn test_lu_random_systems() -> Result<(), ClaError> {
    let mut rng = fastrand::Rng::with_seed(42);
    for &n in &[1, 2, 7, 33, 100] {
        let a = random_matrix(&mut rng, n, n as f64);
        let b = Vector::from_vec((0..n).map(|_| rng.f64() * 10.0 - 5.0).collect());
        let lu = LapackLU::new(&a)?;

        let x = lu.solve(&b)?;
        let residual = (&a.mat_vec(&x)? - &b)?;
        assert!(
            residual.l2_norm() <= 1e-9 * b.l2_norm().max(1.0),
            "n = {}: residual {}",
            n,
            residual.l2_norm()
        );

        let inv = lu.inverse()?;
        assert!(a.matmul(&inv)?.approx_eq(&Matrix::identity(n), 1e-9));
    }
    Ok(())
}

#[test]
fn test_lu_solve_matrix_matches_column_solves() -> Result<(), ClaError> {
    let mut rng = fastrand::Rng::with_seed(5);
    let a = random_matrix(&mut rng, 12, 4.0);
    let rhs = Matrix::from_vec(12, 3, (0..36).map(|_| rng.f64()).collect())?;
    let lu = LapackLU::new(&a)?;

    let x = lu.solve_matrix(&rhs)?;
    assert_eq!(x.shape(), (12, 3));
    for j in 0..3 {
        let col = lu.solve(&rhs.col(j))?;
        assert_approx_eq_vec(x.col(j).as_slice(), col.as_slice(), 1e-12);
    }
    Ok(())
}

#[test]
fn test_lu_zero_row_is_singular() {
    let a = Matrix::from_rows(&[
        vec![1.0, 2.0, 3.0],
        vec![0.0, 0.0, 0.0],
        vec![4.0, 5.0, 6.0],
    ])
    .unwrap();

    // Construction succeeds; the failure surfaces on use
    let lu = LapackLU::new(&a).unwrap();
    assert!(lu.is_singular());
    assert_eq!(lu.determinant(), 0.0);

    let b = Vector::from_vec(vec![1.0, 2.0, 3.0]);
    assert!(matches!(
        lu.solve(&b),
        Err(ClaError::SingularMatrix { .. })
    ));
    assert!(matches!(lu.inverse(), Err(ClaError::SingularMatrix { .. })));

    let p = lu.p_factor();
    let lu_prod = lu.l_factor().matmul(&lu.u_factor()).unwrap();
    assert!(lu_prod.approx_eq(&p.matmul(&a).unwrap(), 1e-12));
}

#[test]
fn test_lu_determinant_matches_product_rule() -> Result<(), ClaError> {
    let mut rng = fastrand::Rng::with_seed(9);
    let a = random_matrix(&mut rng, 6, 2.0);
    let b = random_matrix(&mut rng, 6, 2.0);
    let det_a = LapackLU::new(&a)?.determinant();
    let det_b = LapackLU::new(&b)?.determinant();
    let det_ab = LapackLU::from_matrix(a.matmul(&b)?)?.determinant();
    assert!((det_ab - det_a * det_b).abs() <= 1e-9 * det_ab.abs().max(1.0));
    Ok(())
}

#[test]
fn test_lu_concurrent_readers() {
    let mut rng = fastrand::Rng::with_seed(77);
    let a = random_matrix(&mut rng, 20, 20.0);
    let lu = LapackLU::new(&a).unwrap();
    let expected = lu.inverse().unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let f: &dyn Factorization = &lu;
                assert_eq!(f.inverse().unwrap(), expected);
            });
        }
    });
}
