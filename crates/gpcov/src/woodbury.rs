//! Incremental updates of a precision matrix when one subject block of time points is
//! appended to or removed from the end of the time point set.
//!
//! Let the covariance of the larger set be partitioned as
//!
//! ```text
//!     | K    kno^T |
//! M = |            |
//!     | kno  Knew  |
//! ```
//!
//! where `K` is the (n, n) covariance of the smaller set and `Knew` the (k, k) covariance of
//! the subject block. With `B = K^-1 kno^T` and the Schur complement `A = Knew - kno B`:
//!
//! * `log det M = log det K + log det A`,
//! * `M^-1 = | K^-1 + B A^-1 B^T   -B A^-1 |`
//!   `       | -A^-1 B^T            A^-1   |`
//!
//! Only `k x k` factorizations are needed instead of the `O(n^3)` full inversion, the
//! [`PrecisionCache`] of the sampler being updated at each subject move.
//!
//! # Reference
//!
//! [Woodbury matrix identity](https://en.wikipedia.org/wiki/Woodbury_matrix_identity)

use crate::errors::{GpCovError, Result};
use crate::precision::{dense_precision, PrecisionCache};
use crate::utils::{
    checked_cholesky_scaled, chol_inverse, chol_log_det, mirror_lower, DEGENERACY_TOL,
};
use linfa::Float;
use linfa_linalg::qr::*;
use log::debug;
use ndarray::{s, Array2, ArrayBase, ArrayView2, Data, Ix2};

/// Update the precision of a set of `prior_dim` time points to the precision of a set of
/// `new_dim` time points, one trailing block of time points being appended or removed.
///
/// * `covariance`: covariance matrix of the larger set, i.e. the new set when appending and
///   the prior set when removing. The covariance of the smaller set is its leading block.
/// * `log_det`: log determinant of the prior covariance.
/// * `prior_inverse`: cached inverse of the prior covariance (the prior precision), it is
///   recomputed from `covariance` when not given.
/// * `tol`: relative tolerance on the Schur complement Cholesky pivots, see
///   [`DEGENERACY_TOL`].
///
/// # Errors
///
/// * [`GpCovError::DimensionMismatch`] when dimensions are inconsistent or unchanged
/// * [`GpCovError::NumericalDegeneracy`] when the Schur complement `A` of the block is
///   singular, typically with duplicated time points and no noise.
pub fn update_precision<F: Float>(
    covariance: &ArrayBase<impl Data<Elem = F>, Ix2>,
    log_det: F,
    prior_dim: usize,
    new_dim: usize,
    prior_inverse: Option<ArrayView2<F>>,
    tol: F,
) -> Result<PrecisionCache<F>> {
    let n = covariance.nrows();
    if covariance.ncols() != n {
        return Err(GpCovError::DimensionMismatch(format!(
            "covariance should be square, got {:?}",
            covariance.dim()
        )));
    }
    if prior_dim == new_dim || prior_dim.max(new_dim) != n {
        return Err(GpCovError::DimensionMismatch(format!(
            "one block should be appended or removed from a ({prior_dim}, {prior_dim}) precision \
            to get a ({new_dim}, {new_dim}) precision given a ({n}, {n}) covariance"
        )));
    }
    if let Some(inv) = prior_inverse.as_ref() {
        if inv.dim() != (prior_dim, prior_dim) {
            return Err(GpCovError::DimensionMismatch(format!(
                "cached inverse should be ({prior_dim}, {prior_dim}), got {:?}",
                inv.dim()
            )));
        }
    }

    if prior_dim < new_dim {
        debug!(
            "Append block of {} time points to precision of dim {prior_dim}",
            new_dim - prior_dim
        );
        append(covariance, log_det, prior_dim, prior_inverse, tol)
    } else {
        debug!(
            "Remove block of {} time points from precision of dim {prior_dim}",
            prior_dim - new_dim
        );
        remove(covariance, log_det, new_dim, prior_inverse, tol)
    }
}

/// `covariance` is the (n + k, n + k) covariance of the new set
fn append<F: Float>(
    covariance: &ArrayBase<impl Data<Elem = F>, Ix2>,
    log_det: F,
    n: usize,
    prior_inverse: Option<ArrayView2<F>>,
    tol: F,
) -> Result<PrecisionCache<F>> {
    let n_new = covariance.nrows();
    let m0 = match prior_inverse {
        Some(inv) => inv.to_owned(),
        None => dense_precision(&covariance.slice(s![..n, ..n]), tol)?
            .into_parts()
            .0,
    };

    let kno = covariance.slice(s![n.., ..n]);
    let knew = mirror_lower(&covariance.slice(s![n.., n..]));

    let b = m0.dot(&kno.t());
    let a = mirror_lower(&(&knew - &kno.dot(&b)));
    // pivots are compared to the scale of Knew as A may vanish by cancellation
    let la = checked_cholesky_scaled(&a, &knew.diag(), tol, "appended block Schur complement")?;
    let a_inv = chol_inverse(&la)?;

    // kno M0 = B^T as M0 is symmetric
    let b_ainv = b.dot(&a_inv);
    let mut precision = Array2::<F>::zeros((n_new, n_new));
    precision
        .slice_mut(s![..n, ..n])
        .assign(&(&m0 + &b_ainv.dot(&b.t())));
    let top_right = b_ainv.mapv(|v| -v);
    precision.slice_mut(s![n.., ..n]).assign(&top_right.t());
    precision.slice_mut(s![..n, n..]).assign(&top_right);
    precision.slice_mut(s![n.., n..]).assign(&a_inv);

    Ok(PrecisionCache::new(precision, log_det + chol_log_det(&la)))
}

/// `covariance` is the (n_new + k, n_new + k) covariance of the prior set
fn remove<F: Float>(
    covariance: &ArrayBase<impl Data<Elem = F>, Ix2>,
    log_det: F,
    n_new: usize,
    prior_inverse: Option<ArrayView2<F>>,
    tol: F,
) -> Result<PrecisionCache<F>> {
    let k = covariance.nrows() - n_new;
    let m0_inv = match prior_inverse {
        Some(inv) => inv.to_owned(),
        None => dense_precision(covariance, tol)?.into_parts().0,
    };

    let kno = covariance.slice(s![n_new.., ..n_new]);
    let knew = mirror_lower(&covariance.slice(s![n_new.., n_new..]));

    // First rank-k correction cancelling the kno lower left block:
    // M1 = (M0 + U V)^-1 with U = [0; I], V = [-kno, 0]
    //    = M0^-1 - M0^-1 U (I + V M0^-1 U)^-1 V M0^-1
    let m0_inv_u = m0_inv.slice(s![.., n_new..]);
    let v_m0_inv = kno.dot(&m0_inv.slice(s![..n_new, ..])).mapv(|v| -v);
    let t = Array2::<F>::eye(k) + &v_m0_inv.slice(s![.., n_new..]);
    let t_inv = t.qr()?.inverse()?;
    let m1_inv = &m0_inv - &m0_inv_u.dot(&t_inv).dot(&v_m0_inv);

    // Second rank-k correction cancelling the kno^T upper right block:
    // M2 = (M1 + U1 V1)^-1 with U1 = -V^T = [kno^T; 0], V1 = -U^T = [0, -I]
    // hence M2 = blockdiag(K, Knew)^-1 and its leading block is K^-1
    let m1_inv_u1 = m1_inv.slice(s![.., ..n_new]).dot(&kno.t());
    let v1_m1_inv = m1_inv.slice(s![n_new.., ..]).mapv(|v| -v);
    let t1 = Array2::<F>::eye(k) + &v1_m1_inv.slice(s![.., ..n_new]).dot(&kno.t());
    let t1_inv = t1.qr()?.inverse()?;
    let m2_inv = &m1_inv.slice(s![..n_new, ..n_new])
        - &m1_inv_u1
            .slice(s![..n_new, ..])
            .dot(&t1_inv)
            .dot(&v1_m1_inv.slice(s![.., ..n_new]));
    let precision = mirror_lower(&m2_inv);

    let b = precision.dot(&kno.t());
    let a = mirror_lower(&(&knew - &kno.dot(&b)));
    let la = checked_cholesky_scaled(&a, &knew.diag(), tol, "removed block Schur complement")?;

    Ok(PrecisionCache::new(precision, log_det - chol_log_det(&la)))
}

impl<F: Float> PrecisionCache<F> {
    /// Precision of the time point set extended with one subject block, given the
    /// `covariance` of the extended set. The cached precision and log determinant
    /// are those of the leading block of `covariance`.
    ///
    /// Shortcut over [`update_precision`] with the default [`DEGENERACY_TOL`] tolerance,
    /// see `GpCovValidParams::append_subject` for a configured tolerance.
    pub fn append_block(&self, covariance: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Self> {
        update_precision(
            covariance,
            self.log_det(),
            self.dim(),
            covariance.nrows(),
            Some(self.precision().view()),
            F::cast(DEGENERACY_TOL),
        )
    }

    /// Precision of the time point set without its last `block_len` time points,
    /// given the `covariance` of the current set.
    ///
    /// Shortcut over [`update_precision`] with the default [`DEGENERACY_TOL`] tolerance,
    /// see `GpCovValidParams::remove_subject` for a configured tolerance.
    pub fn remove_block(
        &self,
        covariance: &ArrayBase<impl Data<Elem = F>, Ix2>,
        block_len: usize,
    ) -> Result<Self> {
        if block_len > self.dim() {
            return Err(GpCovError::DimensionMismatch(format!(
                "cannot remove {block_len} time points from a set of {}",
                self.dim()
            )));
        }
        update_precision(
            covariance,
            self.log_det(),
            self.dim(),
            self.dim() - block_len,
            Some(self.precision().view()),
            F::cast(DEGENERACY_TOL),
        )
    }
}
