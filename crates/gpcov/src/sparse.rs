//! Low rank approximation of the precision matrix using inducing points.
//!
//! With `m` inducing points and `n` time points, the approximation costs `O(n.m^2)`
//! instead of the `O(n^3)` of the exact inversion, it is meant for `m << n`.
//!
//! # Reference
//!
//! Matthias Bauer, Mark van der Wilk, and Carl Edward Rasmussen.
//! [Understanding Probabilistic Sparse Gaussian Process Approximations](https://arxiv.org/pdf/1606.04820.pdf).
//! In: Advances in Neural Information Processing Systems. Ed. by D. Lee et al. Vol. 29. Curran Associates, Inc., 2016

use crate::covariance::{cross_covariance, inducing_covariance};
use crate::errors::{GpCovError, Result};
use crate::kernels::KernelSpec;
use crate::precision::PrecisionCache;
use crate::utils::{checked_cholesky, chol_inverse, chol_log_det};
use linfa::Float;
use linfa_linalg::triangular::*;
use log::warn;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1};

/// FITC approximation of the precision of the covariance of observations at `times`
/// given inducing points `grid`.
///
/// With `Kuu = L L^T` the inducing points covariance and `Ktu` the cross covariance,
/// `Aut = L^-1 Ktu^T` gives the Nystrom approximation `Qtt = Aut^T Aut` of the covariance.
/// Its diagonal is corrected with `Lambda = diag(diag(M) - diag(Qtt))` and the precision
/// of `Qtt + Lambda` is computed with the Woodbury identity:
///
/// `Lambda^-1 - Lambda^-1 Aut^T W Aut Lambda^-1` where `W = (I + Aut Lambda^-1 Aut^T)^-1`
///
/// The returned log determinant is `log det(I + Aut Lambda^-1 Aut^T) + log det(Lambda)`.
pub fn sparse_precision<F: Float>(
    kernel: &KernelSpec<F>,
    times: &ArrayBase<impl Data<Elem = F>, Ix1>,
    grid: &ArrayBase<impl Data<Elem = F>, Ix1>,
    tol: F,
) -> Result<PrecisionCache<F>> {
    let m = grid.len();
    let ktu = cross_covariance(kernel, times, grid);
    let kuu = inducing_covariance(kernel, grid);

    // Compute (lower) Cholesky decomposition: Kuu = L L^T
    let l = checked_cholesky(&kuu, tol, "inducing points covariance")?;
    // Qtt = Aut^T Aut
    let aut = l.solve_triangular(&ktu.t(), UPLO::Lower)?;

    // Compute diagonal correction: lambda = diag(M) - diag(Qtt)
    let m_diag: Array1<F> = times.mapv(|t| kernel.variance(t));
    let lambda = m_diag - (&aut * &aut).sum_axis(Axis(0));
    if let Some(i) = lambda.iter().position(|v| !(*v > F::zero())) {
        warn!("Non positive diagonal correction at time index {i}: {}", lambda[i]);
        return Err(GpCovError::NumericalDegeneracy(format!(
            "diagonal correction {} at time index {i} is not positive",
            lambda[i]
        )));
    }
    let lambda_inv = lambda.mapv(|v| F::one() / v);

    // Aut Lambda^-1
    let aut_li = &aut * &lambda_inv.view().insert_axis(Axis(0));
    // Compute (lower) Cholesky decomposition: I + Aut Lambda^-1 Aut^T = Lb Lb^T
    let b = Array2::<F>::eye(m) + aut_li.dot(&aut.t());
    let lb = checked_cholesky(&b, tol, "inducing points capacitance")?;
    let w = chol_inverse(&lb)?;

    let mut precision = -aut_li.t().dot(&w).dot(&aut_li);
    precision
        .diag_mut()
        .zip_mut_with(&lambda_inv, |p, li| *p = *p + *li);

    let log_det = chol_log_det(&lb) + lambda.mapv(|v| v.ln()).sum();
    Ok(PrecisionCache::new(precision, log_det))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance::covariance_matrix;
    use crate::precision::dense_precision;
    use crate::utils::DEGENERACY_TOL;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};

    /// Dense FITC covariance Qtt + Lambda used as reference
    fn fitc_covariance(
        kernel: &KernelSpec<f64>,
        times: &Array1<f64>,
        grid: &Array1<f64>,
    ) -> Array2<f64> {
        let ktu = cross_covariance(kernel, times, grid);
        let kuu = inducing_covariance(kernel, grid);
        let kuu_inv = dense_precision(&kuu, DEGENERACY_TOL).unwrap().into_parts().0;
        let mut cov = ktu.dot(&kuu_inv).dot(&ktu.t());
        for i in 0..times.len() {
            cov[[i, i]] = kernel.variance(times[i]);
        }
        cov
    }

    #[test]
    fn test_sparse_precision_matches_fitc_covariance() {
        let kernel = KernelSpec::squared_exponential(0., 0.5, -2.);
        let times = Array::linspace(0., 5., 20);
        let grid = array![0.5, 1.5, 2.5, 3.5, 4.5];
        let cache = sparse_precision(&kernel, &times, &grid, DEGENERACY_TOL).unwrap();

        let cov = fitc_covariance(&kernel, &times, &grid);
        let expected = dense_precision(&cov, DEGENERACY_TOL).unwrap();
        assert_abs_diff_eq!(cache.precision(), expected.precision(), epsilon = 1e-6);
        assert_abs_diff_eq!(cache.log_det(), expected.log_det(), epsilon = 1e-8);
        assert_abs_diff_eq!(cache.precision().dot(&cov), Array2::eye(20), epsilon = 1e-6);
    }

    #[test]
    fn test_sparse_precision_close_to_exact_with_dense_grid() {
        let kernel = KernelSpec::squared_exponential(0., 0., -2.);
        let times = array![0.2, 0.9, 1.7, 2.4];
        // inducing points on the time points themselves give the exact covariance
        let cache = sparse_precision(&kernel, &times, &times, DEGENERACY_TOL).unwrap();
        let exact = dense_precision(&covariance_matrix(&kernel, &times), DEGENERACY_TOL).unwrap();
        assert_abs_diff_eq!(cache.precision(), exact.precision(), epsilon = 1e-6);
        assert_abs_diff_eq!(cache.log_det(), exact.log_det(), epsilon = 1e-6);
    }

    #[test]
    fn test_sparse_precision_polynomial() {
        let kernel = KernelSpec::polynomial(-1., -2., -1., 0.);
        let times = Array::linspace(0., 3., 12);
        let grid = array![0.5, 1., 2., 2.5];
        let cache = sparse_precision(&kernel, &times, &grid, DEGENERACY_TOL).unwrap();
        assert_eq!(cache.dim(), 12);
        let p = cache.precision();
        assert_abs_diff_eq!(p.to_owned(), p.t(), epsilon = 1e-10);
        assert!(cache.log_det().is_finite());
    }
}
