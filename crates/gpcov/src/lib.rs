//! This library implements the [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process)
//! covariance machinery of a longitudinal profile regression sampler: subjects are observed at
//! sets of time points, the covariance of the observations is built from a kernel over time and
//! its inverse (the precision matrix) together with the covariance log determinant feed the
//! likelihood evaluations.
//!
//! Exact inversion is in O(N^3) where N is the total number of time points. As the sampler
//! moves one subject at a time between clusters, the precision is rather updated incrementally
//! using the [Woodbury identity](https://en.wikipedia.org/wiki/Woodbury_matrix_identity) when a
//! subject block is appended or removed (see [`update_precision`]). Two other shortcuts are
//! provided:
//! * a closed form inversion when all subjects share the same time points
//!   (see [`block_precision`]),
//! * a low rank approximation using M inducing points, in O(N.M^2) (see [`sparse_precision`]).
//!
//! Computations are configured by [`GpCovParams`] which validates into [`GpCovValidParams`].
//!
//! # Example
//!
//! ```
//! use gpcov::{GpCovParams, KernelSpec};
//! use linfa::ParamGuard;
//! use ndarray::array;
//!
//! let params = GpCovParams::new(KernelSpec::squared_exponential(0., 0., -2.))
//!     .check()
//!     .expect("valid parameters");
//!
//! // two subjects observed at 3 and 2 time points
//! let times = array![0., 1., 2., 0.5, 1.5];
//! let cache = params.precision(&times.slice(ndarray::s![..3])).expect("precision");
//! let cache = params.append_subject(&cache, &times).expect("update");
//! assert_eq!(cache.dim(), 5);
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod block_inverse;
mod covariance;
mod errors;
pub mod kernels;
mod parameters;
mod permutation;
mod precision;
mod sparse;
mod utils;
mod woodbury;

pub use block_inverse::*;
pub use covariance::*;
pub use errors::*;
pub use kernels::{KernelKind, KernelSpec};
pub use parameters::*;
pub use permutation::*;
pub use precision::*;
pub use sparse::*;
pub use utils::{is_active_grid, DEGENERACY_TOL};
pub use woodbury::*;
