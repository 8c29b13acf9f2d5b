//! Netting sets and collateral agreements.
//!
//! A [`NettingSet`] groups the trades whose values offset on default of one
//! counterparty. An optional [`CollateralAgreement`] (CSA) reduces the
//! exposure by the collateral balance held against the netting-set value.

use std::collections::HashMap;

use exposure_core::{ConfigurationError, CounterpartyId, NettingSetId, TradeId};
use exposure_cube::Portfolio;
use serde::{Deserialize, Serialize};

/// Margin period of risk used when an agreement does not state one.
pub const DEFAULT_MPOR_DAYS: u32 = 14;

/// Which margin flows are delayed by the margin period of risk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralCalculationType {
    /// Collateral in both directions settles after the MPoR.
    #[default]
    Symmetric,
    /// Collateral we post settles immediately; collateral we receive is lagged.
    AsymmetricCva,
    /// Collateral we receive settles immediately; collateral we post is lagged.
    AsymmetricDva,
    /// All collateral settles immediately.
    NoLag,
}

/// Credit support annex terms.
///
/// Amounts are in the base currency; positive balances are collateral held
/// by us, negative balances collateral posted to the counterparty.
///
/// # Examples
///
/// ```
/// use exposure_xva::CollateralAgreement;
///
/// let csa = CollateralAgreement {
///     threshold_receive: 100.0,
///     mta_receive: 10.0,
///     ..CollateralAgreement::default()
/// };
/// assert_eq!(csa.credit_support_amount(150.0), 50.0);
/// assert_eq!(csa.credit_support_amount(80.0), 0.0);
/// // 5 is below the minimum transfer amount
/// assert_eq!(csa.margin_call(105.0, 0.0), 0.0);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollateralAgreement {
    /// Unsecured exposure tolerated before we call for collateral.
    #[serde(default)]
    pub threshold_receive: f64,
    /// Unsecured exposure tolerated before we have to post collateral.
    #[serde(default)]
    pub threshold_pay: f64,
    /// Smallest call we make.
    #[serde(default)]
    pub mta_receive: f64,
    /// Smallest call we honour.
    #[serde(default)]
    pub mta_pay: f64,
    /// Independent amount held, added to the value before thresholds apply.
    #[serde(default)]
    pub independent_amount: f64,
    /// Margin period of risk in calendar days.
    #[serde(default = "default_mpor_days")]
    pub mpor_days: u32,
    /// Collateral balance before the t0 margin call.
    #[serde(default)]
    pub initial_balance: f64,
    /// Spread over the collateral rate we pay on collateral we hold.
    #[serde(default)]
    pub collateral_spread_receive: f64,
    /// Spread over the collateral rate we earn on collateral we post.
    #[serde(default)]
    pub collateral_spread_pay: f64,
}

fn default_mpor_days() -> u32 {
    DEFAULT_MPOR_DAYS
}

impl Default for CollateralAgreement {
    fn default() -> Self {
        Self {
            threshold_receive: 0.0,
            threshold_pay: 0.0,
            mta_receive: 0.0,
            mta_pay: 0.0,
            independent_amount: 0.0,
            mpor_days: DEFAULT_MPOR_DAYS,
            initial_balance: 0.0,
            collateral_spread_receive: 0.0,
            collateral_spread_pay: 0.0,
        }
    }
}

impl CollateralAgreement {
    /// MPoR as a year fraction (Act/365).
    #[inline]
    pub fn mpor(&self) -> f64 {
        f64::from(self.mpor_days) / 365.0
    }

    /// Checks thresholds and MTAs are finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, value) in [
            ("threshold_receive", self.threshold_receive),
            ("threshold_pay", self.threshold_pay),
            ("mta_receive", self.mta_receive),
            ("mta_pay", self.mta_pay),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::invalid(
                    name,
                    format!("must be finite and non-negative, got {}", value),
                ));
            }
        }
        for (name, value) in [
            ("independent_amount", self.independent_amount),
            ("initial_balance", self.initial_balance),
            ("collateral_spread_receive", self.collateral_spread_receive),
            ("collateral_spread_pay", self.collateral_spread_pay),
        ] {
            if !value.is_finite() {
                return Err(ConfigurationError::invalid(name, "must be finite"));
            }
        }
        Ok(())
    }

    /// Collateral the agreement entitles us to hold against `value`.
    pub fn credit_support_amount(&self, value: f64) -> f64 {
        let secured = value + self.independent_amount;
        if secured >= 0.0 {
            (secured - self.threshold_receive).max(0.0)
        } else {
            (secured + self.threshold_pay).min(0.0)
        }
    }

    /// Margin transferred to bring `balance` to the credit support amount,
    /// or zero when the shortfall is below the relevant MTA.
    pub fn margin_call(&self, value: f64, balance: f64) -> f64 {
        let shortfall = self.credit_support_amount(value) - balance;
        let mta = if shortfall >= 0.0 {
            self.mta_receive
        } else {
            self.mta_pay
        };
        if shortfall.abs() >= mta {
            shortfall
        } else {
            0.0
        }
    }

    /// Spread accrued on `balance`: the receive spread on collateral held,
    /// the pay spread on collateral posted.
    #[inline]
    pub fn collateral_spread(&self, balance: f64) -> f64 {
        if balance >= 0.0 {
            self.collateral_spread_receive
        } else {
            self.collateral_spread_pay
        }
    }

    /// COLVA accrued by one sample over `accrual` years: `-C s(C) dt`.
    ///
    /// Holding collateral (`C > 0`) with a positive spread is a cost.
    #[inline]
    pub fn colva_accrual(&self, balance: f64, accrual: f64) -> f64 {
        -balance * self.collateral_spread(balance) * accrual
    }

    /// Balance after the t0 margin call against `value`.
    pub fn t0_balance(&self, value: f64) -> f64 {
        self.initial_balance + self.margin_call(value, self.initial_balance)
    }
}

/// Margin settled at a date given the call against the current value and,
/// if available, the call against the MPoR-lagged value.
///
/// Positive margins are received, negative margins posted.
pub fn settled_margin(
    calculation_type: CollateralCalculationType,
    current_call: f64,
    lagged_call: Option<f64>,
) -> f64 {
    match calculation_type {
        CollateralCalculationType::NoLag => current_call,
        CollateralCalculationType::Symmetric => lagged_call.unwrap_or(0.0),
        CollateralCalculationType::AsymmetricCva => {
            if current_call < 0.0 {
                current_call
            } else {
                lagged_call.map_or(0.0, |m| m.max(0.0))
            }
        }
        CollateralCalculationType::AsymmetricDva => {
            if current_call > 0.0 {
                current_call
            } else {
                lagged_call.map_or(0.0, |m| m.min(0.0))
            }
        }
    }
}

/// Trades netted against one counterparty.
#[derive(Clone, Debug, PartialEq)]
pub struct NettingSet {
    id: NettingSetId,
    counterparty: CounterpartyId,
    trade_ids: Vec<TradeId>,
    collateral: Option<CollateralAgreement>,
}

impl NettingSet {
    /// An uncollateralised netting set with no trades.
    pub fn new(id: impl Into<NettingSetId>, counterparty: impl Into<CounterpartyId>) -> Self {
        Self {
            id: id.into(),
            counterparty: counterparty.into(),
            trade_ids: Vec::new(),
            collateral: None,
        }
    }

    /// Attaches a CSA.
    pub fn with_collateral(mut self, agreement: CollateralAgreement) -> Self {
        self.collateral = Some(agreement);
        self
    }

    /// Adds a trade.
    pub fn with_trade(mut self, trade_id: impl Into<TradeId>) -> Self {
        self.trade_ids.push(trade_id.into());
        self
    }

    /// Netting set identifier.
    #[inline]
    pub fn id(&self) -> &NettingSetId {
        &self.id
    }

    /// Counterparty facing the netting set.
    #[inline]
    pub fn counterparty_id(&self) -> &CounterpartyId {
        &self.counterparty
    }

    /// Trades netted together, in insertion order.
    #[inline]
    pub fn trade_ids(&self) -> &[TradeId] {
        &self.trade_ids
    }

    /// Collateral agreement, if the netting set is margined.
    #[inline]
    pub fn collateral(&self) -> Option<&CollateralAgreement> {
        self.collateral.as_ref()
    }

    /// Validates the CSA, if any.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match &self.collateral {
            Some(csa) => csa.validate().map_err(|e| {
                ConfigurationError::invalid(format!("netting set {}", self.id), e.to_string())
            }),
            None => Ok(()),
        }
    }
}

/// Fills each netting set with the portfolio trades booked into it.
///
/// # Errors
/// - `Duplicate` if two netting sets share an id
/// - `UnknownReference` if a trade names a netting set that is not defined
pub fn assign_trades(
    netting_sets: Vec<NettingSet>,
    portfolio: &Portfolio,
) -> Result<Vec<NettingSet>, ConfigurationError> {
    let mut netting_sets = netting_sets;
    let mut index = HashMap::with_capacity(netting_sets.len());
    for (i, ns) in netting_sets.iter().enumerate() {
        if index.insert(ns.id.clone(), i).is_some() {
            return Err(ConfigurationError::Duplicate {
                kind: "netting set",
                id: ns.id.to_string(),
            });
        }
        ns.validate()?;
    }
    for trade in portfolio.trades() {
        let i = *index.get(trade.netting_set_id()).ok_or_else(|| {
            ConfigurationError::UnknownReference {
                kind: "netting set",
                id: trade.netting_set_id().to_string(),
            }
        })?;
        let ns = &mut netting_sets[i];
        if !ns.trade_ids.contains(trade.id()) {
            ns.trade_ids.push(trade.id().clone());
        }
    }
    Ok(netting_sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exposure_core::RiskFactorId;
    use exposure_cube::{
        EquityForward, PathIndependentProduct, Position, Trade, TradeKind,
    };

    fn forward(id: &str, ns: &str) -> Trade {
        Trade::new(
            id,
            ns,
            TradeKind::PathIndependent(PathIndependentProduct::EquityForward(EquityForward {
                underlying: RiskFactorId::equity("SPX"),
                currency: "EUR".to_string(),
                quantity: 1.0,
                strike: 100.0,
                maturity: 1.0,
                position: Position::Long,
            })),
        )
    }

    #[test]
    fn test_credit_support_amount_thresholds() {
        let csa = CollateralAgreement {
            threshold_receive: 10.0,
            threshold_pay: 20.0,
            independent_amount: 5.0,
            ..CollateralAgreement::default()
        };
        assert_eq!(csa.credit_support_amount(15.0), 10.0);
        assert_eq!(csa.credit_support_amount(0.0), 0.0);
        assert_eq!(csa.credit_support_amount(-20.0), 0.0);
        assert_eq!(csa.credit_support_amount(-40.0), -15.0);
    }

    #[test]
    fn test_margin_call_respects_mta_by_direction() {
        let csa = CollateralAgreement {
            mta_receive: 10.0,
            mta_pay: 1.0,
            ..CollateralAgreement::default()
        };
        assert_eq!(csa.margin_call(9.0, 0.0), 0.0);
        assert_eq!(csa.margin_call(10.0, 0.0), 10.0);
        assert_eq!(csa.margin_call(-2.0, 0.0), -2.0);
        // returning collateral already held is a negative shortfall
        assert_eq!(csa.margin_call(0.0, 5.0), -5.0);
    }

    #[test]
    fn test_t0_balance() {
        let csa = CollateralAgreement {
            initial_balance: 3.0,
            ..CollateralAgreement::default()
        };
        assert_eq!(csa.t0_balance(50.0), 50.0);
    }

    #[test]
    fn test_colva_accrual_uses_spread_by_direction() {
        let csa = CollateralAgreement {
            collateral_spread_receive: 0.01,
            collateral_spread_pay: 0.02,
            ..CollateralAgreement::default()
        };
        // holding 100 for half a year at 1%
        assert_eq!(csa.colva_accrual(100.0, 0.5), -0.5);
        // posting 100 for half a year at 2%
        assert_eq!(csa.colva_accrual(-100.0, 0.5), 1.0);
        assert_eq!(csa.colva_accrual(0.0, 0.5), 0.0);
    }

    #[test]
    fn test_settled_margin_by_calculation_type() {
        use CollateralCalculationType::*;
        assert_eq!(settled_margin(NoLag, 5.0, Some(2.0)), 5.0);
        assert_eq!(settled_margin(Symmetric, 5.0, Some(2.0)), 2.0);
        assert_eq!(settled_margin(Symmetric, 5.0, None), 0.0);
        assert_eq!(settled_margin(AsymmetricCva, -5.0, Some(2.0)), -5.0);
        assert_eq!(settled_margin(AsymmetricCva, 5.0, Some(2.0)), 2.0);
        assert_eq!(settled_margin(AsymmetricCva, 5.0, Some(-2.0)), 0.0);
        assert_eq!(settled_margin(AsymmetricDva, 5.0, Some(-2.0)), 5.0);
        assert_eq!(settled_margin(AsymmetricDva, -5.0, Some(-2.0)), -2.0);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let ns = NettingSet::new("NS1", "CP1").with_collateral(CollateralAgreement {
            threshold_pay: -1.0,
            ..CollateralAgreement::default()
        });
        assert!(ns.validate().is_err());
    }

    #[test]
    fn test_assign_trades() {
        let portfolio = Portfolio::builder()
            .add_trade(forward("T1", "NS1"))
            .add_trade(forward("T2", "NS2"))
            .add_trade(forward("T3", "NS1"))
            .build()
            .unwrap();
        let sets = assign_trades(
            vec![NettingSet::new("NS1", "CP1"), NettingSet::new("NS2", "CP1")],
            &portfolio,
        )
        .unwrap();
        assert_eq!(
            sets[0].trade_ids(),
            &[TradeId::new("T1"), TradeId::new("T3")]
        );
        assert_eq!(sets[1].trade_ids(), &[TradeId::new("T2")]);
    }

    #[test]
    fn test_assign_trades_unknown_netting_set() {
        let portfolio = Portfolio::builder()
            .add_trade(forward("T1", "NS9"))
            .build()
            .unwrap();
        let err = assign_trades(vec![NettingSet::new("NS1", "CP1")], &portfolio).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownReference {
                kind: "netting set",
                id: "NS9".to_string()
            }
        );
    }

    #[test]
    fn test_csa_deserialises_with_defaults() {
        let csa: CollateralAgreement =
            serde_json::from_str(r#"{"threshold_receive": 1e6, "mta_receive": 1e4}"#).unwrap();
        assert_eq!(csa.mpor_days, DEFAULT_MPOR_DAYS);
        assert_eq!(csa.threshold_pay, 0.0);
    }
}
