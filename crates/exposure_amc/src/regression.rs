//! Least squares fitting with an explicit ill-conditioning policy.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use exposure_core::ConfigurationError;

use crate::basis::{BasisFunctionType, BasisSystem};
use crate::model::RegressionModel;

/// Default condition number above which a fit is regularised.
pub const DEFAULT_CONDITION_THRESHOLD: f64 = 1e10;

/// What to do when the design matrix is ill-conditioned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RegularisationPolicy {
    /// Truncated SVD: singular values below `sigma_max / condition_threshold`
    /// are dropped.
    #[default]
    PseudoInverse,
    /// Tikhonov regularisation with penalty `lambda * sigma_max^2`.
    Ridge {
        /// Penalty relative to the largest squared singular value
        lambda: f64,
    },
}

/// Regression settings shared by all dates of a trade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Polynomial family
    pub basis: BasisFunctionType,
    /// Maximum total degree
    pub order: usize,
    /// Condition number above which `policy` applies
    pub condition_threshold: f64,
    /// Fallback for ill-conditioned fits
    pub policy: RegularisationPolicy,
    /// Standardise features by their sample mean and deviation before fitting
    pub normalise: bool,
    /// Regress exercise dates on in-the-money paths only
    pub in_the_money_only: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            basis: BasisFunctionType::Monomial,
            order: 2,
            condition_threshold: DEFAULT_CONDITION_THRESHOLD,
            policy: RegularisationPolicy::PseudoInverse,
            normalise: true,
            in_the_money_only: false,
        }
    }
}

impl RegressionConfig {
    /// Validates settings.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.order > 8 {
            return Err(ConfigurationError::invalid(
                "order",
                format!("must be at most 8, got {}", self.order),
            ));
        }
        if !(self.condition_threshold > 1.0) {
            return Err(ConfigurationError::invalid(
                "condition_threshold",
                "must be greater than 1",
            ));
        }
        if let RegularisationPolicy::Ridge { lambda } = self.policy {
            if !(lambda > 0.0 && lambda.is_finite()) {
                return Err(ConfigurationError::invalid(
                    "lambda",
                    format!("must be positive, got {}", lambda),
                ));
            }
        }
        Ok(())
    }
}

/// How the coefficients of a fit were obtained.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FitMethod {
    /// Plain least squares
    LeastSquares,
    /// Truncated SVD dropping `truncated` singular values
    PseudoInverse {
        /// Number of singular values set to zero
        truncated: usize,
    },
    /// Ridge with the effective penalty applied
    Ridge {
        /// Absolute penalty added to the squared singular values
        penalty: f64,
    },
    /// No samples: continuation value is zero
    Empty,
}

/// Diagnostics recorded for every fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Number of regression samples
    pub samples: usize,
    /// Number of basis functions
    pub basis_size: usize,
    /// Ratio of largest to smallest singular value
    pub condition_number: f64,
    /// Solution method actually used
    pub method: FitMethod,
    /// Root mean square in-sample residual
    pub rms_residual: f64,
}

impl FitDiagnostics {
    /// True if a regularisation fallback was used.
    pub fn regularised(&self) -> bool {
        matches!(
            self.method,
            FitMethod::PseudoInverse { .. } | FitMethod::Ridge { .. }
        )
    }
}

/// Fits a regression model to `features` (one row per sample) and `values`.
///
/// # Errors
/// `ConfigurationError::DimensionMismatch` if the row count differs from the
/// value count or rows have different widths.
pub fn fit_regression(
    config: &RegressionConfig,
    date_index: usize,
    features: &[Vec<f64>],
    values: &[f64],
) -> Result<RegressionModel, ConfigurationError> {
    if features.len() != values.len() {
        return Err(ConfigurationError::DimensionMismatch {
            what: "regression samples",
            expected: features.len(),
            got: values.len(),
        });
    }
    let dim = features.first().map_or(0, Vec::len);
    if let Some(row) = features.iter().find(|r| r.len() != dim) {
        return Err(ConfigurationError::DimensionMismatch {
            what: "regression features",
            expected: dim,
            got: row.len(),
        });
    }

    let basis = BasisSystem::new(config.basis, config.order, dim);
    let n = features.len();
    let m = basis.size();

    if n == 0 {
        let diagnostics = FitDiagnostics {
            samples: 0,
            basis_size: m,
            condition_number: f64::INFINITY,
            method: FitMethod::Empty,
            rms_residual: 0.0,
        };
        return Ok(RegressionModel::new(
            date_index,
            basis,
            vec![0.0; dim],
            vec![1.0; dim],
            vec![0.0; m],
            diagnostics,
        ));
    }

    let (means, scales) = if config.normalise {
        feature_moments(features, dim)
    } else {
        (vec![0.0; dim], vec![1.0; dim])
    };

    let mut design = DMatrix::<f64>::zeros(n, m);
    let mut scaled = vec![0.0; dim];
    let mut row = vec![0.0; m];
    for (i, x) in features.iter().enumerate() {
        for j in 0..dim {
            scaled[j] = (x[j] - means[j]) / scales[j];
        }
        basis.evaluate(&scaled, &mut row);
        for (k, v) in row.iter().enumerate() {
            design[(i, k)] = *v;
        }
    }
    let rhs = DVector::from_column_slice(values);

    let svd = design.clone().svd(true, true);
    let sigma_max = svd.singular_values.iter().cloned().fold(0.0, f64::max);
    let sigma_min = if n < m {
        0.0
    } else {
        svd.singular_values
            .iter()
            .cloned()
            .fold(f64::INFINITY, f64::min)
    };
    let condition_number = if sigma_min > 0.0 {
        sigma_max / sigma_min
    } else {
        f64::INFINITY
    };

    let (method, filter): (FitMethod, Box<dyn Fn(f64) -> f64>) =
        if condition_number <= config.condition_threshold {
            (FitMethod::LeastSquares, Box::new(|s: f64| 1.0 / s))
        } else {
            match config.policy {
                RegularisationPolicy::PseudoInverse => {
                    let cutoff = sigma_max / config.condition_threshold;
                    let truncated = svd
                        .singular_values
                        .iter()
                        .filter(|&&s| s <= cutoff)
                        .count()
                        + m.saturating_sub(n);
                    (
                        FitMethod::PseudoInverse { truncated },
                        Box::new(move |s: f64| if s > cutoff { 1.0 / s } else { 0.0 }),
                    )
                }
                RegularisationPolicy::Ridge { lambda } => {
                    let penalty = lambda * sigma_max * sigma_max;
                    (
                        FitMethod::Ridge { penalty },
                        Box::new(move |s: f64| s / (s * s + penalty)),
                    )
                }
            }
        };

    if method != FitMethod::LeastSquares {
        warn!(
            date_index,
            condition_number,
            threshold = config.condition_threshold,
            ?method,
            "Ill-conditioned regression, applying regularisation"
        );
    }

    let coefficients = match (&svd.u, &svd.v_t) {
        (Some(u), Some(v_t)) => {
            let uty = u.transpose() * &rhs;
            let mut weighted = DVector::<f64>::zeros(svd.singular_values.len());
            for (k, &s) in svd.singular_values.iter().enumerate() {
                weighted[k] = if s > 0.0 { filter(s) * uty[k] } else { 0.0 };
            }
            v_t.transpose() * weighted
        }
        _ => DVector::<f64>::zeros(m),
    };

    let residual = &design * &coefficients - &rhs;
    let rms_residual = (residual.norm_squared() / n as f64).sqrt();

    let diagnostics = FitDiagnostics {
        samples: n,
        basis_size: m,
        condition_number,
        method,
        rms_residual,
    };

    Ok(RegressionModel::new(
        date_index,
        basis,
        means,
        scales,
        coefficients.iter().cloned().collect(),
        diagnostics,
    ))
}

/// Sample mean and standard deviation per feature; constant features scale by 1.
fn feature_moments(features: &[Vec<f64>], dim: usize) -> (Vec<f64>, Vec<f64>) {
    let n = features.len() as f64;
    let mut means = vec![0.0; dim];
    for x in features {
        for j in 0..dim {
            means[j] += x[j];
        }
    }
    means.iter_mut().for_each(|m| *m /= n);

    let mut scales = vec![0.0; dim];
    for x in features {
        for j in 0..dim {
            scales[j] += (x[j] - means[j]).powi(2);
        }
    }
    for (j, s) in scales.iter_mut().enumerate() {
        let sd = (*s / n).sqrt();
        *s = if sd > 1e-12 * means[j].abs().max(1.0) {
            sd
        } else {
            1.0
        };
    }
    (means, scales)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_samples(n: usize) -> Vec<Vec<f64>> {
        (0..n).map(|i| vec![i as f64 / n as f64 * 4.0 - 2.0]).collect()
    }

    #[test]
    fn test_recovers_quadratic() {
        let xs = grid_samples(50);
        let ys: Vec<f64> = xs.iter().map(|x| 1.0 + 2.0 * x[0] - 0.5 * x[0] * x[0]).collect();
        for basis in [
            BasisFunctionType::Monomial,
            BasisFunctionType::Laguerre,
            BasisFunctionType::Hermite,
        ] {
            let config = RegressionConfig {
                basis,
                ..RegressionConfig::default()
            };
            let model = fit_regression(&config, 0, &xs, &ys).unwrap();
            assert_eq!(model.diagnostics().method, FitMethod::LeastSquares);
            assert!(model.diagnostics().rms_residual < 1e-9);
            assert_relative_eq!(model.predict(&[0.7]), 1.0 + 1.4 - 0.245, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_collinear_features_fall_back_to_pseudo_inverse() {
        // Second feature duplicates the first: design matrix is rank deficient.
        let xs: Vec<Vec<f64>> = grid_samples(40).into_iter().map(|x| vec![x[0], x[0]]).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x[0]).collect();
        let config = RegressionConfig {
            order: 1,
            ..RegressionConfig::default()
        };
        let model = fit_regression(&config, 2, &xs, &ys).unwrap();
        assert!(model.diagnostics().regularised());
        assert!(matches!(
            model.diagnostics().method,
            FitMethod::PseudoInverse { truncated: 1 }
        ));
        assert_relative_eq!(model.predict(&[0.5, 0.5]), 1.5, epsilon = 1e-8);
    }

    #[test]
    fn test_ridge_fallback_is_finite() {
        let xs: Vec<Vec<f64>> = vec![vec![1.0]; 10];
        let ys = vec![2.0; 10];
        let config = RegressionConfig {
            order: 2,
            normalise: false,
            policy: RegularisationPolicy::Ridge { lambda: 1e-8 },
            ..RegressionConfig::default()
        };
        let model = fit_regression(&config, 0, &xs, &ys).unwrap();
        assert!(matches!(model.diagnostics().method, FitMethod::Ridge { .. }));
        assert_relative_eq!(model.predict(&[1.0]), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_fewer_samples_than_basis_functions() {
        let xs = vec![vec![0.0], vec![1.0]];
        let ys = vec![1.0, 3.0];
        let config = RegressionConfig {
            order: 4,
            ..RegressionConfig::default()
        };
        let model = fit_regression(&config, 0, &xs, &ys).unwrap();
        assert!(model.diagnostics().regularised());
        assert!(model.predict(&[0.5]).is_finite());
    }

    #[test]
    fn test_empty_fit_predicts_zero() {
        let model = fit_regression(&RegressionConfig::default(), 4, &[], &[]).unwrap();
        assert_eq!(model.diagnostics().method, FitMethod::Empty);
        assert_eq!(model.predict(&[]), 0.0);
    }

    #[test]
    fn test_mismatched_inputs() {
        let err = fit_regression(&RegressionConfig::default(), 0, &[vec![1.0]], &[]).unwrap_err();
        assert!(matches!(err, ConfigurationError::DimensionMismatch { .. }));

        let err = fit_regression(
            &RegressionConfig::default(),
            0,
            &[vec![1.0], vec![1.0, 2.0]],
            &[0.0, 0.0],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_config_validation() {
        assert!(RegressionConfig::default().validate().is_ok());
        let bad = RegressionConfig {
            condition_threshold: 0.5,
            ..RegressionConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = RegressionConfig {
            policy: RegularisationPolicy::Ridge { lambda: -1.0 },
            ..RegressionConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
