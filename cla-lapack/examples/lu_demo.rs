use cla_lapack::{ClaError, Dense, LapackLU, Matrix, Vector};
use std::time::Instant;

fn main() -> Result<(), ClaError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let a = Matrix::from_rows(&[
        vec![6.0, 5.0, 3.0, -10.0],
        vec![3.0, 7.0, -3.0, 5.0],
        vec![12.0, 4.0, 4.0, 4.0],
        vec![0.0, 12.0, 0.0, -8.0],
    ])?;
    let lu = LapackLU::new(&a)?;
    log::info!("A =\n{}", a);
    log::info!("L =\n{}", lu.l_factor());
    log::info!("U =\n{}", lu.u_factor());
    log::info!("P =\n{}", lu.p_factor());
    log::info!("det(A) = {}", lu.determinant());

    let b = Vector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    let x = lu.solve(&b)?;
    log::info!("solve(A, {}) = {}", b, x);

    // Larger system: time factor and inverse
    let n = 400;
    let mut rng = fastrand::Rng::with_seed(3);
    let mut big = Matrix::from_vec(n, n, (0..n * n).map(|_| rng.f64() - 0.5).collect())?;
    for i in 0..n {
        big[(i, i)] += n as f64;
    }

    let start_time = Instant::now();
    let lu = LapackLU::from_matrix(big.clone())?;
    log::info!("Factored {}x{} in {:?}", n, n, start_time.elapsed());

    let start_time = Instant::now();
    let inv = lu.inverse()?;
    log::info!("Inverted in {:?}", start_time.elapsed());

    let check = big.matmul(&inv)?;
    log::info!(
        "max |A*inv(A) - I| = {:.3e}",
        check
            .max_abs_diff(&Matrix::identity(n))
            .unwrap_or(f64::NAN)
    );
    Ok(())
}
