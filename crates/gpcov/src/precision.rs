//! Precision matrices (inverse covariances) together with covariance log determinants.

use crate::covariance::covariance_matrix;
use crate::errors::Result;
use crate::kernels::KernelSpec;
use crate::sparse::sparse_precision;
use crate::utils::{checked_cholesky, chol_inverse, chol_log_det, is_active_grid};
use linfa::Float;
use log::debug;
use ndarray::{Array2, ArrayBase, Data, Ix1, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A precision matrix `M^-1` and the log determinant of the covariance `M` it inverts.
///
/// The cache is created by a full build, replaced on every incremental update
/// (see [`PrecisionCache::append_block`] and [`PrecisionCache::remove_block`]) and owned
/// by the caller: computations never retain it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct PrecisionCache<F: Float> {
    precision: Array2<F>,
    log_det: F,
}

impl<F: Float> Default for PrecisionCache<F> {
    /// Precision of an empty set of time points
    fn default() -> Self {
        PrecisionCache {
            precision: Array2::zeros((0, 0)),
            log_det: F::zero(),
        }
    }
}

impl<F: Float> PrecisionCache<F> {
    /// Constructor from a precision matrix and the log determinant of its inverse
    pub fn new(precision: Array2<F>, log_det: F) -> Self {
        PrecisionCache { precision, log_det }
    }

    /// Precision matrix
    pub fn precision(&self) -> &Array2<F> {
        &self.precision
    }

    /// Log determinant of the covariance matrix
    pub fn log_det(&self) -> F {
        self.log_det
    }

    /// Number of time points
    pub fn dim(&self) -> usize {
        self.precision.nrows()
    }

    /// Decompose into (precision, log determinant)
    pub fn into_parts(self) -> (Array2<F>, F) {
        (self.precision, self.log_det)
    }
}

impl<F: Float> fmt::Display for PrecisionCache<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Precision(dim={}, log_det={})", self.dim(), self.log_det)
    }
}

/// Exact precision of the given `covariance` matrix using its Cholesky decomposition `L`:
/// `M^-1 = L^-T L^-1` and `log det M = 2 sum(log L_ii)`.
pub fn dense_precision<F: Float>(
    covariance: &ArrayBase<impl Data<Elem = F>, Ix2>,
    tol: F,
) -> Result<PrecisionCache<F>> {
    let l = checked_cholesky(covariance, tol, "covariance")?;
    let log_det = chol_log_det(&l);
    let precision = chol_inverse(&l)?;
    Ok(PrecisionCache { precision, log_det })
}

/// Precision of the covariance of observations at `times`.
///
/// When `grid` holds inducing points the low rank approximation of [`sparse_precision`] is used,
/// otherwise (empty or all-zero grid) the exact covariance is built and inverted.
pub fn precision_matrix<F: Float>(
    kernel: &KernelSpec<F>,
    times: &ArrayBase<impl Data<Elem = F>, Ix1>,
    grid: &ArrayBase<impl Data<Elem = F>, Ix1>,
    tol: F,
) -> Result<PrecisionCache<F>> {
    if is_active_grid(grid) {
        debug!(
            "Sparse precision of {} times with {} inducing points",
            times.len(),
            grid.len()
        );
        sparse_precision(kernel, times, grid, tol)
    } else {
        debug!("Dense precision of {} times", times.len());
        dense_precision(&covariance_matrix(kernel, times), tol)
    }
}
