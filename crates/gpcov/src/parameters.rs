use crate::block_inverse::block_precision;
use crate::covariance::{block_exchangeable_covariance, cross_covariance};
use crate::errors::{GpCovError, Result};
use crate::kernels::KernelSpec;
use crate::permutation::BlockPermutation;
use crate::precision::{dense_precision, PrecisionCache};
use crate::sparse::sparse_precision;
use crate::utils::{is_active_grid, DEGENERACY_TOL};
use crate::woodbury::update_precision;
use linfa::{Float, ParamGuard};
use log::debug;
use ndarray::{s, Array1, Array2, ArrayBase, Data, Ix1};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A set of validated covariance parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct GpCovValidParams<F: Float> {
    /// Kernel and its hyperparameters
    pub(crate) kernel: KernelSpec<F>,
    /// Number of time points shared by all subjects, 0 when subjects are not observed
    /// at the same times
    pub(crate) block_size: usize,
    /// Inducing points, empty or all-zero means no low rank approximation
    pub(crate) inducings: Array1<F>,
    /// Relative tolerance on Cholesky pivots
    pub(crate) degeneracy_tol: F,
}

impl<F: Float> Default for GpCovValidParams<F> {
    fn default() -> GpCovValidParams<F> {
        GpCovValidParams {
            kernel: KernelSpec::default(),
            block_size: 0,
            inducings: Array1::zeros(0),
            degeneracy_tol: F::cast(DEGENERACY_TOL),
        }
    }
}

impl<F: Float> GpCovValidParams<F> {
    /// Get the kernel
    pub fn kernel(&self) -> &KernelSpec<F> {
        &self.kernel
    }

    /// Get the block size (0 when no block structure)
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Get the inducing points
    pub fn inducings(&self) -> &Array1<F> {
        &self.inducings
    }

    /// Get the degeneracy tolerance
    pub fn degeneracy_tol(&self) -> F {
        self.degeneracy_tol
    }

    /// Covariance matrix of observations at `times`, using the block structure if any
    pub fn covariance(&self, times: &ArrayBase<impl Data<Elem = F>, Ix1>) -> Array2<F> {
        block_exchangeable_covariance(&self.kernel, times, self.block_size)
    }

    /// Noise free covariance between observations at `times` and `others`
    pub fn cross_covariance(
        &self,
        times: &ArrayBase<impl Data<Elem = F>, Ix1>,
        others: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Array2<F> {
        cross_covariance(&self.kernel, times, others)
    }

    /// Precision and log determinant of the covariance of observations at `times`.
    ///
    /// The low rank approximation is used when inducing points are given, then the
    /// closed form block inversion when subjects share their time points, otherwise the
    /// exact dense inversion.
    pub fn precision(
        &self,
        times: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<PrecisionCache<F>> {
        if is_active_grid(&self.inducings) {
            debug!(
                "Sparse precision of {} times with {} inducing points",
                times.len(),
                self.inducings.len()
            );
            sparse_precision(&self.kernel, times, &self.inducings, self.degeneracy_tol)
        } else if self.block_size > 0 {
            block_precision(
                &self.covariance(times),
                self.block_size,
                self.kernel.noise_variance(),
                self.degeneracy_tol,
            )
        } else {
            debug!("Dense precision of {} times", times.len());
            dense_precision(&self.covariance(times), self.degeneracy_tol)
        }
    }

    /// Update `cache`, the precision of the leading time points of `times`, to the
    /// precision of the whole `times` set, the trailing time points being a new subject.
    ///
    /// The low rank approximation has no incremental update and is recomputed.
    pub fn append_subject(
        &self,
        cache: &PrecisionCache<F>,
        times: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<PrecisionCache<F>> {
        if is_active_grid(&self.inducings) {
            return self.precision(times);
        }
        update_precision(
            &self.covariance(times),
            cache.log_det(),
            cache.dim(),
            times.len(),
            Some(cache.precision().view()),
            self.degeneracy_tol,
        )
    }

    /// Update `cache`, the precision of the `times` set, to the precision of the set
    /// without its last `block_len` time points.
    pub fn remove_subject(
        &self,
        cache: &PrecisionCache<F>,
        times: &ArrayBase<impl Data<Elem = F>, Ix1>,
        block_len: usize,
    ) -> Result<PrecisionCache<F>> {
        if block_len > times.len() {
            return Err(GpCovError::DimensionMismatch(format!(
                "cannot remove {block_len} time points from a set of {}",
                times.len()
            )));
        }
        let n_new = times.len() - block_len;
        if is_active_grid(&self.inducings) {
            return self.precision(&times.slice(s![..n_new]));
        }
        update_precision(
            &self.covariance(times),
            cache.log_det(),
            cache.dim(),
            n_new,
            Some(cache.precision().view()),
            self.degeneracy_tol,
        )
    }

    /// Remove the subject made of the `len` time points starting at `start` from `times`.
    ///
    /// The subject block is first moved at the end, see [`BlockPermutation`], then removed.
    /// Returns the remaining time points (in their original order) and their precision.
    pub fn remove_subject_at(
        &self,
        cache: &PrecisionCache<F>,
        times: &ArrayBase<impl Data<Elem = F>, Ix1>,
        start: usize,
        len: usize,
    ) -> Result<(Array1<F>, PrecisionCache<F>)> {
        if start + len > times.len() || cache.dim() != times.len() {
            return Err(GpCovError::DimensionMismatch(format!(
                "cannot remove block [{start}, {}) from a set of {} time points \
                with a precision of dim {}",
                start + len,
                times.len(),
                cache.dim()
            )));
        }
        let perm = BlockPermutation::new(start, len);
        let permuted_times = perm.apply_to_times(times);
        let permuted = PrecisionCache::new(perm.apply(cache.precision()), cache.log_det());
        let updated = self.remove_subject(&permuted, &permuted_times, len)?;
        let remaining = permuted_times.slice(s![..times.len() - len]).to_owned();
        Ok((remaining, updated))
    }
}

#[derive(Clone, Debug, PartialEq)]
/// The set of hyperparameters that can be specified for covariance and precision
/// computations.
pub struct GpCovParams<F: Float>(GpCovValidParams<F>);

impl<F: Float> GpCovParams<F> {
    /// A constructor for covariance parameters given the kernel
    pub fn new(kernel: KernelSpec<F>) -> GpCovParams<F> {
        Self(GpCovValidParams {
            kernel,
            ..Default::default()
        })
    }

    /// A constructor for covariance parameters from validated parameters
    pub fn new_from_valid(params: &GpCovValidParams<F>) -> Self {
        Self(params.clone())
    }

    /// Set the kernel
    pub fn kernel(mut self, kernel: KernelSpec<F>) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set the number of time points shared by all subjects.
    ///
    /// 0 means no block structure.
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.0.block_size = block_size;
        self
    }

    /// Set inducing points used by the low rank approximation.
    ///
    /// An empty or all-zero grid disables the approximation.
    pub fn inducings(mut self, inducings: Array1<F>) -> Self {
        self.0.inducings = inducings;
        self
    }

    /// Set the relative tolerance under which a Cholesky pivot is considered vanishing
    pub fn degeneracy_tol(mut self, tol: F) -> Self {
        self.0.degeneracy_tol = tol;
        self
    }
}

impl<F: Float> From<GpCovValidParams<F>> for GpCovParams<F> {
    fn from(valid: GpCovValidParams<F>) -> Self {
        GpCovParams(valid)
    }
}

impl<F: Float> ParamGuard for GpCovParams<F> {
    type Checked = GpCovValidParams<F>;
    type Error = GpCovError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let tol = self.0.degeneracy_tol;
        if !(tol > F::zero() && tol < F::one()) {
            return Err(GpCovError::InvalidValueError(format!(
                "`degeneracy_tol` should be in ]0, 1[, got {tol}"
            )));
        }
        if self.0.inducings.iter().any(|v| !v.is_finite()) {
            return Err(GpCovError::InvalidValueError(
                "inducing points should be finite".to_string(),
            ));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
