//! Deterministic discount and credit curves.
//!
//! This module provides:
//! - [`YieldCurve`] / [`FlatCurve`]: discount factors for post-processing
//! - [`CreditCurve`] / [`HazardRateCurve`]: piecewise-flat hazard rates and
//!   survival probabilities for CVA and DVA

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Discount curve as a function of year fraction.
pub trait YieldCurve: Send + Sync {
    /// Discount factor to time `t`; times before zero discount to 1.
    fn discount_factor(&self, t: f64) -> f64;

    /// Continuously compounded zero rate to `t`.
    fn zero_rate(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        -self.discount_factor(t).ln() / t
    }
}

/// Flat continuously compounded yield curve.
///
/// # Examples
///
/// ```
/// use exposure_core::curves::{FlatCurve, YieldCurve};
///
/// let curve = FlatCurve::new(0.05);
/// assert!((curve.discount_factor(1.0) - (-0.05_f64).exp()).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatCurve {
    rate: f64,
}

impl FlatCurve {
    /// Creates a flat curve at `rate`.
    #[inline]
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// The flat rate.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl YieldCurve for FlatCurve {
    fn discount_factor(&self, t: f64) -> f64 {
        (-self.rate * t.max(0.0)).exp()
    }

    fn zero_rate(&self, _t: f64) -> f64 {
        self.rate
    }
}

/// Default probability term structure.
pub trait CreditCurve: Send + Sync {
    /// Instantaneous hazard rate at `t`.
    fn hazard_rate(&self, t: f64) -> f64;

    /// Probability of no default up to `t`.
    fn survival_probability(&self, t: f64) -> f64;

    /// Probability of default up to `t`.
    fn default_probability(&self, t: f64) -> f64 {
        1.0 - self.survival_probability(t)
    }

    /// Probability of default in `(t1, t2]`.
    fn marginal_default_probability(&self, t1: f64, t2: f64) -> f64 {
        (self.survival_probability(t1) - self.survival_probability(t2)).max(0.0)
    }
}

/// Piecewise-flat hazard rate curve.
///
/// The rate `hazard_rates[i]` applies on `(tenors[i-1], tenors[i]]`, the first
/// rate applies from zero, and the last rate is extrapolated flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardRateCurve {
    tenors: Vec<f64>,
    hazard_rates: Vec<f64>,
}

impl HazardRateCurve {
    /// Creates a curve from pillar tenors and hazard rates.
    ///
    /// # Errors
    /// `ConfigurationError` if the inputs are empty, of different length, not
    /// strictly increasing and positive, or if a hazard rate is negative.
    pub fn new(tenors: &[f64], hazard_rates: &[f64]) -> Result<Self, ConfigurationError> {
        if tenors.is_empty() {
            return Err(ConfigurationError::invalid("tenors", "must not be empty"));
        }
        if tenors.len() != hazard_rates.len() {
            return Err(ConfigurationError::DimensionMismatch {
                what: "hazard rates",
                expected: tenors.len(),
                got: hazard_rates.len(),
            });
        }
        for (i, &t) in tenors.iter().enumerate() {
            if t <= 0.0 || (i > 0 && t <= tenors[i - 1]) {
                return Err(ConfigurationError::invalid(
                    "tenors",
                    "must be positive and strictly increasing",
                ));
            }
        }
        if let Some(h) = hazard_rates.iter().find(|h| h.is_nan() || **h < 0.0) {
            return Err(ConfigurationError::invalid(
                "hazard_rate",
                format!("must be non-negative, got {}", h),
            ));
        }
        Ok(Self {
            tenors: tenors.to_vec(),
            hazard_rates: hazard_rates.to_vec(),
        })
    }

    /// Flat hazard rate at every tenor.
    pub fn flat(hazard_rate: f64) -> Result<Self, ConfigurationError> {
        Self::new(&[1.0], &[hazard_rate])
    }

    /// Flat hazard rate implied by a CDS spread: `h = s / LGD`.
    pub fn from_spread(spread: f64, lgd: f64) -> Result<Self, ConfigurationError> {
        if lgd.is_nan() || lgd <= 0.0 || lgd > 1.0 {
            return Err(ConfigurationError::invalid("lgd", "must be in (0, 1]"));
        }
        Self::flat(spread / lgd)
    }

    fn integrated_hazard(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        let mut integral = 0.0;
        let mut prev = 0.0;
        for (&tenor, &h) in self.tenors.iter().zip(&self.hazard_rates) {
            if t <= tenor {
                return integral + h * (t - prev);
            }
            integral += h * (tenor - prev);
            prev = tenor;
        }
        let last = self.hazard_rates[self.hazard_rates.len() - 1];
        integral + last * (t - prev)
    }
}

impl CreditCurve for HazardRateCurve {
    fn hazard_rate(&self, t: f64) -> f64 {
        let i = self.tenors.partition_point(|&tenor| tenor < t);
        self.hazard_rates[i.min(self.hazard_rates.len() - 1)]
    }

    fn survival_probability(&self, t: f64) -> f64 {
        (-self.integrated_hazard(t)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_curve() {
        let c = FlatCurve::new(0.03);
        assert_relative_eq!(c.discount_factor(0.0), 1.0);
        assert_relative_eq!(c.discount_factor(-1.0), 1.0);
        assert_relative_eq!(c.discount_factor(2.0), (-0.06_f64).exp(), epsilon = 1e-14);
        assert_relative_eq!(c.zero_rate(5.0), 0.03);
    }

    #[test]
    fn test_flat_hazard_survival() {
        let c = HazardRateCurve::flat(0.02).unwrap();
        assert_relative_eq!(c.survival_probability(5.0), (-0.1_f64).exp(), epsilon = 1e-14);
        assert_relative_eq!(c.hazard_rate(10.0), 0.02);
    }

    #[test]
    fn test_piecewise_hazard() {
        let c = HazardRateCurve::new(&[1.0, 3.0], &[0.01, 0.03]).unwrap();
        // 0.01 * 1 + 0.03 * 1
        assert_relative_eq!(c.survival_probability(2.0), (-0.04_f64).exp(), epsilon = 1e-14);
        // extrapolated beyond 3Y at 0.03
        assert_relative_eq!(
            c.survival_probability(4.0),
            (-(0.01 + 0.06 + 0.03_f64)).exp(),
            epsilon = 1e-14
        );
        assert_relative_eq!(c.hazard_rate(0.5), 0.01);
        assert_relative_eq!(c.hazard_rate(2.5), 0.03);
    }

    #[test]
    fn test_marginal_default_probability() {
        let c = HazardRateCurve::flat(0.05).unwrap();
        let p = c.marginal_default_probability(1.0, 2.0);
        assert_relative_eq!(
            p,
            (-0.05_f64).exp() - (-0.1_f64).exp(),
            epsilon = 1e-14
        );
        assert_relative_eq!(c.default_probability(0.0), 0.0);
    }

    #[test]
    fn test_invalid_curves() {
        assert!(HazardRateCurve::new(&[], &[]).is_err());
        assert!(HazardRateCurve::new(&[1.0, 0.5], &[0.01, 0.01]).is_err());
        assert!(HazardRateCurve::new(&[1.0], &[-0.01]).is_err());
        assert!(HazardRateCurve::new(&[1.0], &[0.01, 0.02]).is_err());
        assert!(HazardRateCurve::from_spread(0.01, 0.0).is_err());
    }

    #[test]
    fn test_from_spread() {
        let c = HazardRateCurve::from_spread(0.012, 0.6).unwrap();
        assert_relative_eq!(c.hazard_rate(1.0), 0.02, epsilon = 1e-14);
    }
}
