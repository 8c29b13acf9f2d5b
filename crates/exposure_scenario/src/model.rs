//! Cross-asset factor models.
//!
//! ## Hull-White One-Factor
//!
//! The short rate is `r(t) = x(t) + alpha(t)` with
//!
//! ```text
//! dx = -a x dt + sigma dW,   x(0) = 0
//! alpha(t) = f(0, t) + sigma^2 / (2 a^2) (1 - e^{-a t})^2
//! ```
//!
//! fitted to a flat initial curve `f(0, t) = r0`. The state `x` is stepped
//! exactly (Ornstein-Uhlenbeck transition), and discount bonds follow the
//! closed form
//!
//! ```text
//! P(t, T | x) = P(0, T) / P(0, t) * exp(-B x - sigma^2 / (4 a) (1 - e^{-2 a t}) B^2)
//! B(t, T)     = (1 - e^{-a (T - t)}) / a
//! ```
//!
//! ## Geometric Brownian Motion
//!
//! Equity and FX spots follow `dS = mu S dt + sigma S dW`, stepped exactly in
//! log space.

use exposure_core::{ConfigurationError, RiskFactorId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::correlation::{CholeskyFactor, CorrelationMatrix};

/// Hull-White one-factor parameters for one currency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HullWhiteParams {
    /// Currency code, e.g. "EUR"
    pub currency: String,
    /// Mean reversion speed `a`
    pub mean_reversion: f64,
    /// Short rate volatility `sigma`
    pub volatility: f64,
    /// Flat initial zero rate `r0`
    pub initial_rate: f64,
}

impl HullWhiteParams {
    /// Validates parameter ranges.
    ///
    /// # Errors
    /// `mean_reversion` must be positive, `volatility` non-negative, and
    /// `initial_rate` finite.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.mean_reversion > 0.0 && self.mean_reversion.is_finite()) {
            return Err(ConfigurationError::invalid(
                "mean_reversion",
                format!("must be positive, got {}", self.mean_reversion),
            ));
        }
        if !(self.volatility >= 0.0 && self.volatility.is_finite()) {
            return Err(ConfigurationError::invalid(
                "volatility",
                format!("must be non-negative, got {}", self.volatility),
            ));
        }
        if !self.initial_rate.is_finite() {
            return Err(ConfigurationError::invalid("initial_rate", "must be finite"));
        }
        Ok(())
    }

    /// `B(t, T)`.
    #[inline]
    pub fn b(&self, t: f64, maturity: f64) -> f64 {
        (1.0 - (-self.mean_reversion * (maturity - t)).exp()) / self.mean_reversion
    }

    /// Deterministic shift `alpha(t)`.
    #[inline]
    pub fn alpha(&self, t: f64) -> f64 {
        let a = self.mean_reversion;
        let s = self.volatility;
        let g = 1.0 - (-a * t).exp();
        self.initial_rate + s * s / (2.0 * a * a) * g * g
    }

    /// Short rate given the state `x` at time `t`.
    #[inline]
    pub fn short_rate(&self, t: f64, x: f64) -> f64 {
        x + self.alpha(t)
    }

    /// Initial discount factor `P(0, T)`.
    #[inline]
    pub fn initial_discount(&self, maturity: f64) -> f64 {
        (-self.initial_rate * maturity).exp()
    }

    /// Zero coupon bond `P(t, T)` conditional on state `x(t) = x`.
    pub fn discount_bond(&self, t: f64, maturity: f64, x: f64) -> f64 {
        if maturity <= t {
            return 1.0;
        }
        let a = self.mean_reversion;
        let s = self.volatility;
        let b = self.b(t, maturity);
        let variance_term = s * s / (4.0 * a) * (1.0 - (-2.0 * a * t).exp()) * b * b;
        self.initial_discount(maturity) / self.initial_discount(t) * (-b * x - variance_term).exp()
    }

    /// Exact transition of `x` over `dt`: returns `(decay, std_dev)` such that
    /// `x(t + dt) = decay * x(t) + std_dev * Z`.
    pub fn transition(&self, dt: f64) -> (f64, f64) {
        let a = self.mean_reversion;
        let s = self.volatility;
        let decay = (-a * dt).exp();
        let variance = s * s * (1.0 - (-2.0 * a * dt).exp()) / (2.0 * a);
        (decay, variance.max(0.0).sqrt())
    }
}

/// Lognormal spot parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GbmParams {
    /// Equity name ("SPX") or currency pair ("EURUSD")
    pub name: String,
    /// Initial spot
    pub spot: f64,
    /// Risk-neutral drift, e.g. `r - q` or `r_dom - r_for`
    #[serde(default)]
    pub drift: f64,
    /// Lognormal volatility
    pub volatility: f64,
}

impl GbmParams {
    /// Validates parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.spot > 0.0 && self.spot.is_finite()) {
            return Err(ConfigurationError::invalid(
                "spot",
                format!("must be positive, got {}", self.spot),
            ));
        }
        if !(self.volatility >= 0.0 && self.volatility.is_finite()) {
            return Err(ConfigurationError::invalid(
                "volatility",
                format!("must be non-negative, got {}", self.volatility),
            ));
        }
        if !self.drift.is_finite() {
            return Err(ConfigurationError::invalid("drift", "must be finite"));
        }
        Ok(())
    }

    /// Multiplicative step `S(t + dt) / S(t)` for a standard normal `w`.
    #[inline]
    pub fn step(&self, dt: f64, w: f64) -> f64 {
        let v = self.volatility;
        ((self.drift - 0.5 * v * v) * dt + v * dt.sqrt() * w).exp()
    }
}

/// One simulated risk factor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum FactorModel {
    /// Short rate of a currency
    HullWhite(HullWhiteParams),
    /// Equity spot
    Equity(GbmParams),
    /// FX spot, domestic per foreign
    Fx(GbmParams),
}

impl FactorModel {
    /// Risk factor identifier of the simulated quantity.
    pub fn factor_id(&self) -> RiskFactorId {
        match self {
            FactorModel::HullWhite(p) => RiskFactorId::interest_rate(&p.currency),
            FactorModel::Equity(p) => RiskFactorId::equity(&p.name),
            FactorModel::Fx(p) => RiskFactorId::fx(&p.name),
        }
    }

    /// Value at the as-of date.
    pub fn initial_value(&self) -> f64 {
        match self {
            FactorModel::HullWhite(_) => 0.0,
            FactorModel::Equity(p) | FactorModel::Fx(p) => p.spot,
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        match self {
            FactorModel::HullWhite(p) => p.validate(),
            FactorModel::Equity(p) | FactorModel::Fx(p) => p.validate(),
        }
    }
}

/// Serialisable model specification, validated into a [`CrossAssetModel`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Reporting and discounting currency
    pub base_currency: String,
    /// Flat rate used for the numeraire when the base currency has no
    /// Hull-White factor
    #[serde(default)]
    pub base_rate: f64,
    /// Simulated factors, in correlation order
    pub factors: Vec<FactorModel>,
    /// Optional factor correlation rows; identity if omitted
    #[serde(default)]
    pub correlation: Option<Vec<Vec<f64>>>,
}

/// Validated cross-asset model ready for simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct CrossAssetModel {
    base_currency: String,
    base_rate: f64,
    factors: Vec<FactorModel>,
    factor_ids: Vec<RiskFactorId>,
    cholesky: CholeskyFactor,
    base_hw_index: Option<usize>,
}

impl CrossAssetModel {
    /// Validates a specification.
    ///
    /// # Errors
    /// `ConfigurationError` on an empty factor list, duplicate factors, bad
    /// parameters or a correlation matrix that is mis-sized or not positive
    /// definite.
    pub fn new(spec: ModelSpec) -> Result<Self, ConfigurationError> {
        if spec.factors.is_empty() {
            return Err(ConfigurationError::invalid("factors", "must not be empty"));
        }
        if !spec.base_rate.is_finite() {
            return Err(ConfigurationError::invalid("base_rate", "must be finite"));
        }

        let mut seen = HashSet::new();
        let mut factor_ids = Vec::with_capacity(spec.factors.len());
        for factor in &spec.factors {
            factor.validate()?;
            let id = factor.factor_id();
            if !seen.insert(id.clone()) {
                return Err(ConfigurationError::Duplicate {
                    kind: "risk factor",
                    id: id.to_string(),
                });
            }
            factor_ids.push(id);
        }

        let dim = spec.factors.len();
        let correlation = match &spec.correlation {
            Some(rows) => CorrelationMatrix::from_rows(rows)?,
            None => CorrelationMatrix::identity(dim),
        };
        if correlation.dim() != dim {
            return Err(ConfigurationError::DimensionMismatch {
                what: "correlation matrix",
                expected: dim,
                got: correlation.dim(),
            });
        }
        let cholesky = correlation.cholesky()?;

        let base_hw_index = spec.factors.iter().position(
            |f| matches!(f, FactorModel::HullWhite(p) if p.currency == spec.base_currency),
        );

        Ok(Self {
            base_currency: spec.base_currency,
            base_rate: spec.base_rate,
            factors: spec.factors,
            factor_ids,
            cholesky,
            base_hw_index,
        })
    }

    /// Reporting currency.
    #[inline]
    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Flat base rate used when the base currency is not simulated.
    #[inline]
    pub fn base_rate(&self) -> f64 {
        self.base_rate
    }

    /// Simulated factors.
    #[inline]
    pub fn factors(&self) -> &[FactorModel] {
        &self.factors
    }

    /// Factor identifiers, in simulation order.
    #[inline]
    pub fn factor_ids(&self) -> &[RiskFactorId] {
        &self.factor_ids
    }

    /// Number of simulated factors.
    #[inline]
    pub fn dim(&self) -> usize {
        self.factors.len()
    }

    /// Cholesky factor of the factor correlation.
    #[inline]
    pub fn cholesky(&self) -> &CholeskyFactor {
        &self.cholesky
    }

    /// Index of the Hull-White factor of the base currency, if any.
    #[inline]
    pub fn base_hw_index(&self) -> Option<usize> {
        self.base_hw_index
    }

    /// Position and parameters of the Hull-White factor of `currency`.
    pub fn hull_white(&self, currency: &str) -> Option<(usize, &HullWhiteParams)> {
        self.factors.iter().enumerate().find_map(|(i, f)| match f {
            FactorModel::HullWhite(p) if p.currency == currency => Some((i, p)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hw(sigma: f64) -> HullWhiteParams {
        HullWhiteParams {
            currency: "EUR".to_string(),
            mean_reversion: 0.05,
            volatility: sigma,
            initial_rate: 0.02,
        }
    }

    #[test]
    fn test_discount_bond_at_origin_matches_curve() {
        let p = hw(0.01);
        assert_relative_eq!(p.discount_bond(0.0, 5.0, 0.0), (-0.1_f64).exp(), epsilon = 1e-14);
    }

    #[test]
    fn test_zero_vol_bond_is_deterministic_forward() {
        let p = hw(0.0);
        assert_relative_eq!(
            p.discount_bond(2.0, 5.0, 0.0),
            (-0.02_f64 * 3.0).exp(),
            epsilon = 1e-14
        );
        let (decay, std) = p.transition(0.5);
        assert_relative_eq!(decay, (-0.025_f64).exp());
        assert_eq!(std, 0.0);
    }

    #[test]
    fn test_bond_decreasing_in_state() {
        let p = hw(0.01);
        assert!(p.discount_bond(1.0, 5.0, 0.01) < p.discount_bond(1.0, 5.0, 0.0));
        assert_eq!(p.discount_bond(5.0, 5.0, 0.3), 1.0);
    }

    #[test]
    fn test_transition_variance() {
        let p = hw(0.01);
        let (_, std) = p.transition(1.0);
        let expected = (0.0001 * (1.0 - (-0.1_f64).exp()) / 0.1).sqrt();
        assert_relative_eq!(std, expected, epsilon = 1e-14);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut p = hw(0.01);
        p.mean_reversion = 0.0;
        assert!(p.validate().is_err());
        let mut p = hw(-0.01);
        assert!(p.validate().is_err());
        p.volatility = 0.0;
        assert!(p.validate().is_ok());

        let g = GbmParams {
            name: "SPX".to_string(),
            spot: 0.0,
            drift: 0.0,
            volatility: 0.2,
        };
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_cross_asset_model_duplicates() {
        let spec = ModelSpec {
            base_currency: "EUR".to_string(),
            base_rate: 0.0,
            factors: vec![FactorModel::HullWhite(hw(0.01)), FactorModel::HullWhite(hw(0.02))],
            correlation: None,
        };
        assert!(matches!(
            CrossAssetModel::new(spec),
            Err(ConfigurationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_cross_asset_model_lookup() {
        let spec = ModelSpec {
            base_currency: "EUR".to_string(),
            base_rate: 0.0,
            factors: vec![
                FactorModel::Equity(GbmParams {
                    name: "SX5E".to_string(),
                    spot: 4000.0,
                    drift: 0.01,
                    volatility: 0.2,
                }),
                FactorModel::HullWhite(hw(0.01)),
            ],
            correlation: Some(vec![vec![1.0, 0.3], vec![0.3, 1.0]]),
        };
        let model = CrossAssetModel::new(spec).unwrap();
        assert_eq!(model.base_hw_index(), Some(1));
        assert_eq!(model.factor_ids()[0].as_str(), "EQ/SX5E");
        assert!(model.hull_white("USD").is_none());
        assert_eq!(model.hull_white("EUR").map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_correlation_dimension_checked() {
        let spec = ModelSpec {
            base_currency: "EUR".to_string(),
            base_rate: 0.0,
            factors: vec![FactorModel::HullWhite(hw(0.01))],
            correlation: Some(vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
        };
        assert!(matches!(
            CrossAssetModel::new(spec),
            Err(ConfigurationError::DimensionMismatch { .. })
        ));
    }
}
