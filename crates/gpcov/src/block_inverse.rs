//! Closed form inversion of block exchangeable covariance matrices.
//!
//! When all subjects are observed at the same times, the covariance reads
//! `Sigma = J ⊗ C + noise I` where `J` is the (n_blocks, n_blocks) matrix of ones and `C`
//! the noise free (block_size, block_size) kernel block. Its inverse is
//!
//! `Sigma^-1 = I / noise - J ⊗ (C E^-1) / noise` with `E = n_blocks C + noise I`
//!
//! which only requires the factorization of `E`: `O(block_size^3)` instead of `O(n^3)`.

use crate::covariance::tile;
use crate::errors::{GpCovError, Result};
use crate::precision::{dense_precision, PrecisionCache};
use crate::utils::{checked_cholesky, chol_inverse, chol_log_det, mirror_lower};
use linfa::Float;
use log::debug;
use ndarray::{s, Array2, ArrayBase, Data, Ix2};

/// Inverse of the block exchangeable `sigma` made of `block_size` blocks with
/// `noise` variance on its diagonal.
///
/// When `block_size` is 0, `sigma` is inverted as a plain dense matrix.
pub fn block_inverse<F: Float>(
    sigma: &ArrayBase<impl Data<Elem = F>, Ix2>,
    block_size: usize,
    noise: F,
    tol: F,
) -> Result<Array2<F>> {
    block_precision(sigma, block_size, noise, tol).map(|cache| cache.into_parts().0)
}

/// Inverse and log determinant of the block exchangeable `sigma`, see [`block_inverse`].
///
/// The log determinant is given by the eigenvalues of `J ⊗ C + noise I`:
/// `log det Sigma = log det E + block_size (n_blocks - 1) log(noise)`.
pub fn block_precision<F: Float>(
    sigma: &ArrayBase<impl Data<Elem = F>, Ix2>,
    block_size: usize,
    noise: F,
    tol: F,
) -> Result<PrecisionCache<F>> {
    if block_size == 0 || sigma.nrows() == 0 {
        return dense_precision(sigma, tol);
    }
    if !(noise > F::zero()) {
        return Err(GpCovError::NumericalDegeneracy(format!(
            "block inversion requires a positive noise variance, got {noise}"
        )));
    }
    let n = sigma.nrows();
    debug_assert!(
        n % block_size == 0,
        "matrix of size {n} cannot be split in blocks of size {block_size}"
    );
    let n_blocks = n / block_size;
    debug!("Block inversion of {n_blocks} blocks of size {block_size}");

    let mut c = sigma.slice(s![..block_size, ..block_size]).to_owned();
    c.diag_mut().mapv_inplace(|v| v - noise);

    let mut e = c.mapv(|v| v * F::cast(n_blocks));
    e.diag_mut().mapv_inplace(|v| v + noise);
    let le = checked_cholesky(&e, tol, "block capacitance")?;
    let e_inv = chol_inverse(&le)?;

    let unit = c.dot(&e_inv).mapv(|v| -v / noise);
    let mut inv = tile(&mirror_lower(&unit), n_blocks);
    let inv_noise = F::one() / noise;
    inv.diag_mut().mapv_inplace(|v| v + inv_noise);

    let log_det = chol_log_det(&le) + F::cast(block_size * (n_blocks - 1)) * noise.ln();
    Ok(PrecisionCache::new(inv, log_det))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance::{block_exchangeable_covariance, covariance_matrix};
    use crate::kernels::KernelSpec;
    use crate::utils::DEGENERACY_TOL;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, concatenate, Axis};

    fn repeated_times(n_subjects: usize) -> ndarray::Array1<f64> {
        let times = array![0., 1., 2.5];
        let views = vec![times.view(); n_subjects];
        concatenate(Axis(0), &views).unwrap()
    }

    #[test]
    fn test_block_inverse() {
        let kernel = KernelSpec::squared_exponential(0., 0., -1.);
        let times = repeated_times(4);
        let sigma = block_exchangeable_covariance(&kernel, &times, 3);
        let inv = block_inverse(&sigma, 3, kernel.noise_variance(), DEGENERACY_TOL).unwrap();
        assert_abs_diff_eq!(sigma.dot(&inv), Array2::eye(12), epsilon = 1e-8);
    }

    #[test]
    fn test_block_precision_log_det() {
        let kernel = KernelSpec::polynomial(-1., -1., -1.5, 0.);
        let times = repeated_times(3);
        let sigma = block_exchangeable_covariance(&kernel, &times, 3);
        let block = block_precision(&sigma, 3, kernel.noise_variance(), DEGENERACY_TOL).unwrap();
        let dense = dense_precision(&sigma, DEGENERACY_TOL).unwrap();
        assert_abs_diff_eq!(block.precision(), dense.precision(), epsilon = 1e-8);
        assert_abs_diff_eq!(block.log_det(), dense.log_det(), epsilon = 1e-8);
    }

    #[test]
    fn test_block_inverse_without_blocks() {
        let kernel = KernelSpec::squared_exponential(0., 0., -2.);
        let sigma = covariance_matrix(&kernel, &array![0., 0.3, 1.4, 2.]);
        let inv = block_inverse(&sigma, 0, kernel.noise_variance(), DEGENERACY_TOL).unwrap();
        assert_abs_diff_eq!(inv.dot(&sigma), Array2::eye(4), epsilon = 1e-10);
    }

    #[test]
    fn test_block_precision_empty() {
        let kernel = KernelSpec::squared_exponential(0., 0., -1.);
        let sigma = block_exchangeable_covariance(&kernel, &ndarray::Array1::<f64>::zeros(0), 3);
        let cache = block_precision(&sigma, 3, kernel.noise_variance(), DEGENERACY_TOL).unwrap();
        assert_eq!(cache, PrecisionCache::default());
    }

    #[test]
    fn test_block_inverse_zero_noise() {
        let kernel = KernelSpec::squared_exponential(0., 0., f64::NEG_INFINITY);
        let sigma = block_exchangeable_covariance(&kernel, &repeated_times(2), 3);
        assert!(matches!(
            block_inverse(&sigma, 3, 0., DEGENERACY_TOL),
            Err(GpCovError::NumericalDegeneracy(_))
        ));
    }
}
