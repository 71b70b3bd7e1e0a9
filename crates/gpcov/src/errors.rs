use linfa_linalg::LinalgError;
use thiserror::Error;

/// A result type for GP covariance computations
pub type Result<T> = std::result::Result<T, GpCovError>;

/// An error when building or updating GP covariance and precision matrices
#[derive(Error, Debug)]
pub enum GpCovError {
    /// When a factorization or a determinant reveals a singular or non positive definite matrix
    /// (typically duplicated time points or vanishing noise). The sampler is expected to reject
    /// the proposal which led to this state.
    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),
    /// When matrix dimensions are inconsistent with the requested operation
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(LinalgError),
    /// When error due to a bad value
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
}

impl From<LinalgError> for GpCovError {
    fn from(err: LinalgError) -> Self {
        match err {
            LinalgError::NotPositiveDefinite => {
                GpCovError::NumericalDegeneracy("matrix is not positive definite".to_string())
            }
            LinalgError::NonInvertible => {
                GpCovError::NumericalDegeneracy("matrix is not invertible".to_string())
            }
            err => GpCovError::LinalgError(err),
        }
    }
}
