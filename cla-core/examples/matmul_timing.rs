use cla_core::{multiply_naive, ClaError, Dense, Matrix};
use std::time::Instant;

/// Creates an n x n matrix with entries in [-1, 1).
fn create_random_matrix(rng: &mut fastrand::Rng, n: usize) -> Result<Matrix, ClaError> {
    Matrix::from_vec(n, n, (0..n * n).map(|_| rng.f64() * 2.0 - 1.0).collect())
}

fn main() -> Result<(), ClaError> {
    // Initialize logging based on RUST_LOG environment variable
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut rng = fastrand::Rng::with_seed(1);
    for &n in &[10, 100, 1000] {
        log::info!("Setting up {}x{} operands...", n, n);
        let a = create_random_matrix(&mut rng, n)?;
        let b = create_random_matrix(&mut rng, n)?;

        let (c, blocked) = a.timed_mult(&b)?;
        log::info!("  Blocked: {:?}", blocked);

        // The triple loop gets slow quickly; only check it up to 100
        if n <= 100 {
            let start_time = Instant::now();
            let reference = multiply_naive(&a, &b)?;
            log::info!("  Naive: {:?}", start_time.elapsed());
            log::info!(
                "  Max abs diff: {:.3e}",
                c.max_abs_diff(&reference).unwrap_or(f64::NAN)
            );
        }

        let flops = 2.0 * (n as f64).powi(3);
        log::info!("  GFLOP/s: {:.2}", flops / blocked.as_secs_f64().max(1e-9) / 1e9);
    }
    Ok(())
}
