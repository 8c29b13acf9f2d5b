//! Credit and funding inputs for XVA.

use exposure_core::curves::{CreditCurve, HazardRateCurve};
use exposure_core::{ConfigurationError, CounterpartyId};
use serde::{Deserialize, Serialize};

/// Default term structure and loss given default of one party.
///
/// # Examples
///
/// ```
/// use exposure_xva::CreditParams;
///
/// let params = CreditParams::flat(0.02, 0.6).unwrap();
/// assert!((params.recovery_rate() - 0.4).abs() < 1e-12);
/// assert!(params.survival_probability(1.0) < 1.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreditParams {
    curve: HazardRateCurve,
    lgd: f64,
}

impl CreditParams {
    /// # Errors
    /// `ConfigurationError` unless `lgd` is in `[0, 1]`.
    pub fn new(curve: HazardRateCurve, lgd: f64) -> Result<Self, ConfigurationError> {
        if !(0.0..=1.0).contains(&lgd) {
            return Err(ConfigurationError::invalid(
                "lgd",
                format!("must be in [0, 1], got {}", lgd),
            ));
        }
        Ok(Self { curve, lgd })
    }

    /// Flat hazard rate.
    pub fn flat(hazard_rate: f64, lgd: f64) -> Result<Self, ConfigurationError> {
        Self::new(HazardRateCurve::flat(hazard_rate)?, lgd)
    }

    /// Piecewise-flat hazard rate curve.
    #[inline]
    pub fn curve(&self) -> &HazardRateCurve {
        &self.curve
    }

    /// Loss given default.
    #[inline]
    pub fn lgd(&self) -> f64 {
        self.lgd
    }

    /// `1 - LGD`.
    #[inline]
    pub fn recovery_rate(&self) -> f64 {
        1.0 - self.lgd
    }

    /// Probability of no default before `t`.
    #[inline]
    pub fn survival_probability(&self, t: f64) -> f64 {
        self.curve.survival_probability(t)
    }

    /// Probability of default in `(t1, t2]`.
    #[inline]
    pub fn marginal_default_probability(&self, t1: f64, t2: f64) -> f64 {
        self.curve.marginal_default_probability(t1, t2)
    }
}

/// A counterparty and its credit.
#[derive(Clone, Debug, PartialEq)]
pub struct Counterparty {
    /// Counterparty identifier
    pub id: CounterpartyId,
    /// Hazard curve and LGD
    pub credit: CreditParams,
}

impl Counterparty {
    /// Creates a counterparty.
    pub fn new(id: impl Into<CounterpartyId>, credit: CreditParams) -> Self {
        Self {
            id: id.into(),
            credit,
        }
    }
}

/// Funding spreads over the discount curve.
///
/// The borrowing spread applies to positive exposure (FCA) and the lending
/// spread to negative exposure (FBA).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FundingParams {
    /// Annualised, e.g. 0.005 = 50bp.
    #[serde(default)]
    pub spread_borrow: f64,
    /// Annualised lending spread.
    #[serde(default)]
    pub spread_lend: f64,
}

impl FundingParams {
    /// Same spread for borrowing and lending.
    #[inline]
    pub fn symmetric(spread: f64) -> Self {
        Self {
            spread_borrow: spread,
            spread_lend: spread,
        }
    }

    /// Spreads quoted in basis points.
    #[inline]
    pub fn from_bps(borrow_bps: f64, lend_bps: f64) -> Self {
        Self {
            spread_borrow: borrow_bps / 10_000.0,
            spread_lend: lend_bps / 10_000.0,
        }
    }

    /// Spreads must be non-negative.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.spread_borrow.is_nan() || self.spread_borrow < 0.0 {
            return Err(ConfigurationError::invalid(
                "spread_borrow",
                "must be non-negative",
            ));
        }
        if self.spread_lend.is_nan() || self.spread_lend < 0.0 {
            return Err(ConfigurationError::invalid(
                "spread_lend",
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lgd_range() {
        assert!(CreditParams::flat(0.01, 1.2).is_err());
        assert!(CreditParams::flat(0.01, -0.1).is_err());
        assert!(CreditParams::flat(0.01, 0.0).is_ok());
    }

    #[test]
    fn test_funding_from_bps() {
        let f = FundingParams::from_bps(60.0, 40.0);
        assert!((f.spread_borrow - 0.006).abs() < 1e-15);
        assert!((f.spread_lend - 0.004).abs() < 1e-15);
        assert!(FundingParams::symmetric(-0.01).validate().is_err());
    }
}
