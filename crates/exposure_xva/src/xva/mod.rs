//! XVA calculations (CVA, DVA, FCA/FBA, COLVA).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  XvaCalculator                   │
//! ├──────────────────────────────────────────────────┤
//! │  Inputs:                                         │
//! │    - netting-set ExposureProfiles (EPE/ENE)      │
//! │    - counterparty CreditParams                   │
//! │    - own CreditParams (DVA, bilateral)           │
//! │    - FundingParams, flat discount curve          │
//! ├──────────────────────────────────────────────────┤
//! │  Outputs:                                        │
//! │    - NettingSetXva                               │
//! │    - CounterpartyXva                             │
//! │    - PortfolioXva                                │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! All integrals use the trapezoidal rule over `[0, t1, ..., tn]`, the t0
//! point of the profile followed by the simulation dates. COLVA is the sum of
//! the profile's COLVA increments discounted from their accrual dates.

mod cva;
mod dva;
mod fva;
mod params;
mod result;

pub use cva::{compute_cva, compute_cva_with_survival};
pub use dva::{compute_dva, compute_dva_with_survival};
pub use fva::{compute_fba, compute_fca, compute_fva};
pub use params::{Counterparty, CreditParams, FundingParams};
pub use result::{CounterpartyXva, NettingSetXva, PortfolioXva, XvaCharges};

use std::collections::{BTreeMap, HashMap, HashSet};

use exposure_core::curves::{CreditCurve, FlatCurve, YieldCurve};
use exposure_core::{ConfigurationError, CounterpartyId, NettingSetId};
use rayon::prelude::*;
use tracing::info;

use crate::exposure::{ExposureProfile, ExposureSubject};

/// Settings shared by all netting sets.
#[derive(Clone, Debug)]
pub struct XvaConfig {
    /// Own credit for DVA; no DVA without it.
    pub own_credit: Option<CreditParams>,
    /// Funding spreads for FCA and FBA.
    pub funding: FundingParams,
    /// Weight CVA by own survival and DVA by counterparty survival.
    pub bilateral: bool,
    /// Discount curve for the exposure integrals.
    pub discount: FlatCurve,
}

impl Default for XvaConfig {
    fn default() -> Self {
        Self {
            own_credit: None,
            funding: FundingParams::default(),
            bilateral: false,
            discount: FlatCurve::new(0.0),
        }
    }
}

impl XvaConfig {
    /// Unilateral CVA on `discount`, no own credit or funding.
    pub fn new(discount: FlatCurve) -> Self {
        Self {
            discount,
            ..Self::default()
        }
    }

    /// Enables DVA.
    pub fn with_own_credit(mut self, own_credit: CreditParams) -> Self {
        self.own_credit = Some(own_credit);
        self
    }

    /// Sets the funding spreads.
    pub fn with_funding(mut self, funding: FundingParams) -> Self {
        self.funding = funding;
        self
    }

    /// Switches on survival weighting.
    pub fn bilateral(mut self) -> Self {
        self.bilateral = true;
        self
    }
}

/// Computes XVA from netting-set exposure profiles.
///
/// # Examples
///
/// ```
/// use exposure_core::curves::FlatCurve;
/// use exposure_xva::{Counterparty, CreditParams, XvaCalculator, XvaConfig};
///
/// let calculator = XvaCalculator::new(XvaConfig::new(FlatCurve::new(0.02)))
///     .with_counterparty(Counterparty::new("CP1", CreditParams::flat(0.02, 0.6).unwrap()))
///     .unwrap();
/// let xva = calculator.portfolio_xva(&[]).unwrap();
/// assert_eq!(xva.charges.cva, 0.0);
/// ```
#[derive(Clone, Debug)]
pub struct XvaCalculator {
    config: XvaConfig,
    counterparties: HashMap<CounterpartyId, CreditParams>,
}

impl XvaCalculator {
    /// Calculator without counterparties.
    pub fn new(config: XvaConfig) -> Self {
        Self {
            config,
            counterparties: HashMap::new(),
        }
    }

    /// Registers a counterparty.
    ///
    /// # Errors
    /// `ConfigurationError::Duplicate` if it is already registered.
    pub fn with_counterparty(mut self, counterparty: Counterparty) -> Result<Self, ConfigurationError> {
        if self.counterparties.contains_key(&counterparty.id) {
            return Err(ConfigurationError::Duplicate {
                kind: "counterparty",
                id: counterparty.id.to_string(),
            });
        }
        self.counterparties
            .insert(counterparty.id, counterparty.credit);
        Ok(self)
    }

    /// Shared settings.
    #[inline]
    pub fn config(&self) -> &XvaConfig {
        &self.config
    }

    fn credit(&self, counterparty_id: &CounterpartyId) -> Result<&CreditParams, ConfigurationError> {
        self.counterparties
            .get(counterparty_id)
            .ok_or_else(|| ConfigurationError::UnknownReference {
                kind: "counterparty",
                id: counterparty_id.to_string(),
            })
    }

    fn discount_factors(&self, times: &[f64]) -> Vec<f64> {
        times
            .iter()
            .map(|&t| self.config.discount.discount_factor(t))
            .collect()
    }

    /// CVA and DVA legs without the zero floor.
    fn credit_legs(
        &self,
        credit: &CreditParams,
        times: &[f64],
        df: &[f64],
        epe: &[f64],
        ene: &[f64],
    ) -> (f64, f64) {
        let own = self.config.own_credit.as_ref();
        let own_curve = own
            .filter(|_| self.config.bilateral)
            .map(|o| o.curve() as &dyn CreditCurve);
        let cva = cva::default_leg(epe, df, times, credit, own_curve);
        let dva = match own {
            Some(own) => {
                let nee: Vec<f64> = ene.iter().map(|e| -e).collect();
                let survivor = self
                    .config
                    .bilateral
                    .then(|| credit.curve() as &dyn CreditCurve);
                cva::default_leg(&nee, df, times, own, survivor)
            }
            None => 0.0,
        };
        (cva, dva)
    }

    /// CVA and DVA of a trade-level profile against `counterparty_id`.
    ///
    /// Unlike the netting-set figures these are not floored at zero, so the
    /// charges of allocated profiles add up to those of their netting set.
    ///
    /// # Errors
    /// `ConfigurationError::UnknownReference` for an unknown counterparty.
    pub fn trade_credit_charges(
        &self,
        counterparty_id: &CounterpartyId,
        times: &[f64],
        epe: &[f64],
        ene: &[f64],
    ) -> Result<(f64, f64), ConfigurationError> {
        let credit = self.credit(counterparty_id)?;
        let df = self.discount_factors(times);
        Ok(self.credit_legs(credit, times, &df, epe, ene))
    }

    /// XVA of one netting-set profile.
    ///
    /// # Errors
    /// `ConfigurationError` for a trade profile or an unknown counterparty.
    pub fn netting_set_xva(
        &self,
        profile: &ExposureProfile,
    ) -> Result<NettingSetXva, ConfigurationError> {
        let (netting_set_id, counterparty_id) = match profile.subject() {
            ExposureSubject::NettingSet {
                netting_set_id,
                counterparty_id,
            } => (netting_set_id, counterparty_id),
            ExposureSubject::Trade(id) => {
                return Err(ConfigurationError::invalid(
                    format!("profile {}", id),
                    "XVA needs a netting-set profile",
                ))
            }
        };
        let credit = self.credit(counterparty_id)?;

        let times = profile.times();
        let epe = profile.epe();
        let ene = profile.ene();
        let df = self.discount_factors(&times);

        let (cva, dva) = self.credit_legs(credit, &times, &df, &epe, &ene);
        let (fca, fba, _) = compute_fva(
            &epe,
            &ene,
            &df,
            &times,
            self.config.funding.spread_borrow,
            self.config.funding.spread_lend,
        );

        Ok(NettingSetXva {
            netting_set_id: netting_set_id.clone(),
            counterparty_id: counterparty_id.clone(),
            charges: XvaCharges {
                cva: cva.max(0.0),
                dva: dva.max(0.0),
                fca,
                fba,
                colva: profile
                    .colva_increments()
                    .iter()
                    .zip(&df)
                    .map(|(c, d)| c * d)
                    .sum(),
            },
            epe_b: profile.epe_b(),
            eepe_b: profile.eepe_b(),
        })
    }

    /// XVA of every netting-set profile, rolled up by counterparty.
    ///
    /// Netting sets are computed in parallel; counterparties are reported in
    /// id order and netting sets in input order within each.
    pub fn portfolio_xva(
        &self,
        profiles: &[ExposureProfile],
    ) -> Result<PortfolioXva, ConfigurationError> {
        self.config.funding.validate()?;
        let netting_sets = profiles
            .par_iter()
            .map(|p| self.netting_set_xva(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::<NettingSetId>::with_capacity(netting_sets.len());
        let mut grouped: BTreeMap<CounterpartyId, Vec<NettingSetXva>> = BTreeMap::new();
        for xva in netting_sets {
            if !seen.insert(xva.netting_set_id.clone()) {
                return Err(ConfigurationError::Duplicate {
                    kind: "netting set",
                    id: xva.netting_set_id.to_string(),
                });
            }
            grouped.entry(xva.counterparty_id.clone()).or_default().push(xva);
        }
        let portfolio = PortfolioXva::from_counterparties(
            grouped
                .into_iter()
                .map(|(id, sets)| CounterpartyXva::from_netting_sets(id, sets))
                .collect(),
        );
        info!(
            counterparties = portfolio.counterparties.len(),
            cva = portfolio.charges.cva,
            dva = portfolio.charges.dva,
            fva = portfolio.charges.fva(),
            colva = portfolio.charges.colva,
            "XVA computed"
        );
        Ok(portfolio)
    }
}
