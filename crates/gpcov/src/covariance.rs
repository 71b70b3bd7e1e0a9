//! Covariance matrices assembly over ordered sets of time points.
//!
//! Time points are grouped contiguously by subject, the matrices are indexed
//! consistently with the given time ordering.

use crate::kernels::{covariance, KernelSpec};
use linfa::Float;
use ndarray::{s, Array2, ArrayBase, Data, Ix1, Ix2};

/// Compute the (n, n) covariance matrix of observations taken at `times`.
///
/// The strict lower triangle is filled with kernel values, mirrored onto the upper one,
/// then the diagonal is set once to the marginal variance (noise included).
pub fn covariance_matrix<F: Float>(
    kernel: &KernelSpec<F>,
    times: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Array2<F> {
    let n = times.len();
    let mut mat = Array2::<F>::zeros((n, n));
    for i in 1..n {
        for j in 0..i {
            mat[[i, j]] = covariance(kernel, i, j, times[i], times[j]);
        }
    }
    let mut mat = &mat + &mat.t();
    for i in 0..n {
        mat[[i, i]] = covariance(kernel, i, i, times[i], times[i]);
    }
    mat
}

/// Compute the covariance matrix of subjects sharing the same `block_size` time points.
///
/// One (block_size, block_size) kernel block is computed from the first `block_size` times
/// and tiled over all subject pairs, the noise variance is then added once on the global
/// diagonal. When `block_size` is 0, there is no block structure and the plain
/// [`covariance_matrix`] is returned.
///
/// The number of times has to be a multiple of `block_size`, all subjects being observed
/// at the same times.
pub fn block_exchangeable_covariance<F: Float>(
    kernel: &KernelSpec<F>,
    times: &ArrayBase<impl Data<Elem = F>, Ix1>,
    block_size: usize,
) -> Array2<F> {
    let n = times.len();
    if block_size == 0 || n == 0 {
        return covariance_matrix(kernel, times);
    }
    debug_assert!(
        n % block_size == 0,
        "{n} time points cannot be split in blocks of size {block_size}"
    );
    let unit = cross_covariance(
        kernel,
        &times.slice(s![..block_size]),
        &times.slice(s![..block_size]),
    );
    let mut mat = tile(&unit, n / block_size);
    let noise = kernel.noise_variance();
    mat.diag_mut().mapv_inplace(|v| v + noise);
    mat
}

/// Compute the (n, m) kernel matrix between `times` and `others` time points.
///
/// No noise is involved as observations are never shared between both sets.
pub fn cross_covariance<F: Float>(
    kernel: &KernelSpec<F>,
    times: &ArrayBase<impl Data<Elem = F>, Ix1>,
    others: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Array2<F> {
    Array2::from_shape_fn((times.len(), others.len()), |(i, j)| {
        kernel.value(times[i], others[j])
    })
}

/// Compute the (m, m) covariance matrix of the inducing points `grid`.
pub fn inducing_covariance<F: Float>(
    kernel: &KernelSpec<F>,
    grid: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Array2<F> {
    let mut kuu = cross_covariance(kernel, grid, grid);
    let jitter = kernel.inducing_jitter();
    kuu.diag_mut().mapv_inplace(|v| v + jitter);
    kuu
}

/// Replicate a square `block` `n_blocks` times along both axes
pub(crate) fn tile<F: Float>(
    block: &ArrayBase<impl Data<Elem = F>, Ix2>,
    n_blocks: usize,
) -> Array2<F> {
    let b = block.nrows();
    Array2::from_shape_fn((b * n_blocks, b * n_blocks), |(i, j)| block[[i % b, j % b]])
}
