//! A module for covariance kernels over scalar time points.
//!
//! The following kernel families are implemented:
//! * squared exponential,
//! * polynomial (squared linear trend).
//!
//! Hyperparameters are always stored in log-space and exponentiated on each evaluation,
//! nothing is cached in linear space.

use crate::errors::{GpCovError, Result};
use linfa::Float;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// Kernel family tag, used to build a [`KernelSpec`] from a hyperparameter vector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub enum KernelKind {
    /// Squared exponential kernel with (log amplitude, log lengthscale, log noise)
    #[default]
    SquaredExponential,
    /// Polynomial kernel with (log bias, log slope, log noise, log offset)
    Polynomial,
}

impl KernelKind {
    /// Number of log-hyperparameters expected by the kernel family
    pub fn n_params(&self) -> usize {
        match self {
            KernelKind::SquaredExponential => 3,
            KernelKind::Polynomial => 4,
        }
    }
}

impl From<KernelKind> for String {
    fn from(item: KernelKind) -> String {
        item.to_string()
    }
}

impl TryFrom<String> for KernelKind {
    type Error = GpCovError;
    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl FromStr for KernelKind {
    type Err = GpCovError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SquaredExponential" | "SQexponential" => Ok(KernelKind::SquaredExponential),
            "Polynomial" => Ok(KernelKind::Polynomial),
            _ => Err(GpCovError::InvalidValueError(format!(
                "Bad kernel name '{s}', should be 'SquaredExponential' or 'Polynomial'"
            ))),
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelKind::SquaredExponential => write!(f, "SquaredExponential"),
            KernelKind::Polynomial => write!(f, "Polynomial"),
        }
    }
}

/// A covariance kernel together with its log-space hyperparameters
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum KernelSpec<F: Float> {
    /// `exp(log_amplitude) * exp(-(t - t')^2 / (2 * exp(log_lengthscale)))`
    SquaredExponential {
        /// Log of the process variance
        log_amplitude: F,
        /// Log of the (squared) lengthscale
        log_lengthscale: F,
        /// Log of the noise variance
        log_noise: F,
    },
    /// `(exp(log_bias) + exp(log_slope) * (t - exp(log_offset)) * (t' - exp(log_offset)))^2`
    Polynomial {
        /// Log of the bias variance
        log_bias: F,
        /// Log of the slope variance
        log_slope: F,
        /// Log of the noise variance
        log_noise: F,
        /// Log of the time offset
        log_offset: F,
    },
}

impl<F: Float> Default for KernelSpec<F> {
    fn default() -> Self {
        KernelSpec::squared_exponential(F::zero(), F::zero(), F::cast(-2.))
    }
}

impl<F: Float> KernelSpec<F> {
    /// Squared exponential kernel constructor
    pub fn squared_exponential(log_amplitude: F, log_lengthscale: F, log_noise: F) -> Self {
        KernelSpec::SquaredExponential {
            log_amplitude,
            log_lengthscale,
            log_noise,
        }
    }

    /// Polynomial kernel constructor
    pub fn polynomial(log_bias: F, log_slope: F, log_noise: F, log_offset: F) -> Self {
        KernelSpec::Polynomial {
            log_bias,
            log_slope,
            log_noise,
            log_offset,
        }
    }

    /// Build a kernel from its family and the sampler hyperparameter vector `params`
    /// given in the family order (see [`KernelKind`]).
    pub fn from_log_params(kind: KernelKind, params: &[F]) -> Result<Self> {
        if params.len() != kind.n_params() {
            return Err(GpCovError::InvalidValueError(format!(
                "{} kernel expects {} log hyperparameters, got {}",
                kind,
                kind.n_params(),
                params.len()
            )));
        }
        let kernel = match kind {
            KernelKind::SquaredExponential => {
                KernelSpec::squared_exponential(params[0], params[1], params[2])
            }
            KernelKind::Polynomial => {
                KernelSpec::polynomial(params[0], params[1], params[2], params[3])
            }
        };
        Ok(kernel)
    }

    /// Kernel family
    pub fn kind(&self) -> KernelKind {
        match self {
            KernelSpec::SquaredExponential { .. } => KernelKind::SquaredExponential,
            KernelSpec::Polynomial { .. } => KernelKind::Polynomial,
        }
    }

    /// Log hyperparameters in the family order
    pub fn log_params(&self) -> Vec<F> {
        match *self {
            KernelSpec::SquaredExponential {
                log_amplitude,
                log_lengthscale,
                log_noise,
            } => vec![log_amplitude, log_lengthscale, log_noise],
            KernelSpec::Polynomial {
                log_bias,
                log_slope,
                log_noise,
                log_offset,
            } => vec![log_bias, log_slope, log_noise, log_offset],
        }
    }

    /// Kernel value between `ti` and `tj`, noise excluded.
    pub fn value(&self, ti: F, tj: F) -> F {
        match *self {
            KernelSpec::SquaredExponential {
                log_amplitude,
                log_lengthscale,
                ..
            } => {
                let d = ti - tj;
                let two_l = F::cast(2.) * log_lengthscale.exp();
                log_amplitude.exp() * (-d * d / two_l).exp()
            }
            KernelSpec::Polynomial {
                log_bias,
                log_slope,
                log_offset,
                ..
            } => {
                let offset = log_offset.exp();
                let a = log_bias.exp() + log_slope.exp() * (ti - offset) * (tj - offset);
                a * a
            }
        }
    }

    /// Noise variance added on the diagonal of covariance matrices
    pub fn noise_variance(&self) -> F {
        match *self {
            KernelSpec::SquaredExponential { log_noise, .. }
            | KernelSpec::Polynomial { log_noise, .. } => log_noise.exp(),
        }
    }

    /// Marginal variance of an observation at `t`, noise included
    pub fn variance(&self, t: F) -> F {
        self.value(t, t) + self.noise_variance()
    }

    /// Diagonal term added to the inducing points covariance.
    ///
    /// The polynomial kernel has rank at most 3, its inducing covariance is regularized
    /// with the noise variance.
    pub fn inducing_jitter(&self) -> F {
        match self {
            KernelSpec::SquaredExponential { .. } => F::zero(),
            KernelSpec::Polynomial { .. } => self.noise_variance(),
        }
    }
}

impl<F: Float> fmt::Display for KernelSpec<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let params = self
            .log_params()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}(log params=[{}])", self.kind(), params)
    }
}

/// Covariance between observations `i` and `j` taken at times `ti` and `tj`.
///
/// The noise variance only applies to the same observation (`i == j`), two distinct
/// observations at equal times are correlated but do not share noise.
pub fn covariance<F: Float>(kernel: &KernelSpec<F>, i: usize, j: usize, ti: F, tj: F) -> F {
    if i == j {
        kernel.variance(ti)
    } else {
        kernel.value(ti, tj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_squared_exponential_value() {
        let kernel = KernelSpec::squared_exponential(0., 0., -2.);
        assert_abs_diff_eq!(kernel.value(0., 1.), (-0.5f64).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(kernel.value(0., 2.), (-2f64).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(kernel.variance(1.), 1. + (-2f64).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(covariance(&kernel, 0, 0, 1., 1.), 1.1353352832, epsilon = 1e-10);
        assert_abs_diff_eq!(covariance(&kernel, 0, 1, 1., 1.), 1.);
    }

    #[test]
    fn test_squared_exponential_amplitude_in_log_space() {
        let kernel = KernelSpec::squared_exponential(2f64.ln(), 1f64.ln(), f64::NEG_INFINITY);
        assert_abs_diff_eq!(kernel.value(3., 3.), 2., epsilon = 1e-12);
        assert_eq!(kernel.noise_variance(), 0.);
    }

    #[test]
    fn test_polynomial_value() {
        // bias 1, slope 2, noise 0.5, offset 1
        let kernel = KernelSpec::polynomial(0., 2f64.ln(), 0.5f64.ln(), 0.);
        // (1 + 2 * (3 - 1) * (0 - 1))^2 = 9
        assert_abs_diff_eq!(kernel.value(3., 0.), 9., epsilon = 1e-12);
        // (1 + 2 * 4)^2 + 0.5
        assert_abs_diff_eq!(kernel.variance(3.), 81.5, epsilon = 1e-12);
        assert_abs_diff_eq!(kernel.inducing_jitter(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_hyperparameter_propagates() {
        let kernel = KernelSpec::squared_exponential(f64::NAN, 0., 0.);
        assert!(kernel.value(0., 1.).is_nan());
    }

    #[test]
    fn test_from_log_params() {
        let kernel =
            KernelSpec::from_log_params(KernelKind::Polynomial, &[0., 1., 2., 3.]).unwrap();
        assert_eq!(kernel, KernelSpec::polynomial(0., 1., 2., 3.));
        assert_eq!(kernel.log_params(), vec![0., 1., 2., 3.]);
        assert!(matches!(
            KernelSpec::from_log_params(KernelKind::SquaredExponential, &[0., 1.]),
            Err(GpCovError::InvalidValueError(_))
        ));
    }

    #[test]
    fn test_kernel_kind_names() {
        assert_eq!(
            "SQexponential".parse::<KernelKind>().unwrap(),
            KernelKind::SquaredExponential
        );
        assert_eq!(
            KernelKind::try_from("Polynomial".to_string()).unwrap(),
            KernelKind::Polynomial
        );
        assert!("Matern32".parse::<KernelKind>().is_err());
        assert_eq!(String::from(KernelKind::Polynomial), "Polynomial");
    }

    #[cfg(feature = "serializable")]
    #[test]
    fn test_save_load_kernel() {
        let data = r#""SQexponential""#;
        let kind: KernelKind = serde_json::from_str(data).unwrap();
        assert_eq!(kind, KernelKind::SquaredExponential);

        let kernel = KernelSpec::polynomial(-1., -2., -3., 0.5);
        let json = serde_json::to_string(&kernel).unwrap();
        let loaded: KernelSpec<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, kernel);
    }
}
