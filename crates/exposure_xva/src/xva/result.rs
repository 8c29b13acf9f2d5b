//! XVA results at netting set, counterparty and portfolio level.

use std::iter::Sum;
use std::ops::Add;

use exposure_core::{CounterpartyId, NettingSetId};
use serde::Serialize;

/// Valuation adjustments. CVA, DVA, FCA and FBA are non-negative amounts;
/// COLVA is signed, negative when the collateral spread is a cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct XvaCharges {
    /// Credit valuation adjustment
    pub cva: f64,
    /// Debit valuation adjustment
    pub dva: f64,
    /// Funding cost adjustment
    pub fca: f64,
    /// Funding benefit adjustment
    pub fba: f64,
    /// Collateral rate spread adjustment
    pub colva: f64,
}

impl XvaCharges {
    /// FCA - FBA; positive is a cost.
    #[inline]
    pub fn fva(&self) -> f64 {
        self.fca - self.fba
    }

    /// CVA - DVA + FVA - COLVA, as a cost.
    #[inline]
    pub fn total(&self) -> f64 {
        self.bilateral_cva() + self.fva() - self.colva
    }

    /// CVA - DVA.
    #[inline]
    pub fn bilateral_cva(&self) -> f64 {
        self.cva - self.dva
    }
}

impl Add for XvaCharges {
    type Output = XvaCharges;

    fn add(self, rhs: XvaCharges) -> XvaCharges {
        XvaCharges {
            cva: self.cva + rhs.cva,
            dva: self.dva + rhs.dva,
            fca: self.fca + rhs.fca,
            fba: self.fba + rhs.fba,
            colva: self.colva + rhs.colva,
        }
    }
}

impl Sum for XvaCharges {
    fn sum<I: Iterator<Item = XvaCharges>>(iter: I) -> Self {
        iter.fold(XvaCharges::default(), Add::add)
    }
}

/// XVA of one netting set, with the Basel averages of its profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NettingSetXva {
    /// Netting set identifier
    pub netting_set_id: NettingSetId,
    /// Counterparty identifier
    pub counterparty_id: CounterpartyId,
    /// Adjustments of this netting set
    pub charges: XvaCharges,
    /// Basel EPE over the first year
    pub epe_b: f64,
    /// Basel effective EPE over the first year
    pub eepe_b: f64,
}

/// Netting sets of one counterparty and their sum.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CounterpartyXva {
    /// Counterparty identifier
    pub counterparty_id: CounterpartyId,
    /// Sum over the netting sets
    pub charges: XvaCharges,
    /// Netting sets in input order
    pub netting_sets: Vec<NettingSetXva>,
}

impl CounterpartyXva {
    /// Sums the charges of `netting_sets`.
    pub fn from_netting_sets(counterparty_id: CounterpartyId, netting_sets: Vec<NettingSetXva>) -> Self {
        Self {
            counterparty_id,
            charges: netting_sets.iter().map(|ns| ns.charges).sum(),
            netting_sets,
        }
    }
}

/// Portfolio totals, by counterparty in id order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PortfolioXva {
    /// Sum over all counterparties
    pub charges: XvaCharges,
    /// Counterparties in id order
    pub counterparties: Vec<CounterpartyXva>,
}

impl PortfolioXva {
    /// Sums the charges of `counterparties`.
    pub fn from_counterparties(counterparties: Vec<CounterpartyXva>) -> Self {
        Self {
            charges: counterparties.iter().map(|cp| cp.charges).sum(),
            counterparties,
        }
    }

    /// Netting-set results across all counterparties.
    pub fn netting_sets(&self) -> impl Iterator<Item = &NettingSetXva> {
        self.counterparties.iter().flat_map(|cp| cp.netting_sets.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn netting_set(id: &str, cva: f64, dva: f64, fca: f64, fba: f64) -> NettingSetXva {
        NettingSetXva {
            netting_set_id: NettingSetId::new(id),
            counterparty_id: CounterpartyId::new("CP1"),
            charges: XvaCharges {
                cva,
                dva,
                fca,
                fba,
                colva: 0.0,
            },
            ..NettingSetXva::default()
        }
    }

    #[test]
    fn test_charges_roll_up() {
        let cp = CounterpartyXva::from_netting_sets(
            CounterpartyId::new("CP1"),
            vec![
                netting_set("NS1", 10.0, 2.0, 3.0, 1.0),
                netting_set("NS2", 5.0, 1.0, 1.0, 0.5),
            ],
        );
        assert_relative_eq!(cp.charges.cva, 15.0);
        assert_relative_eq!(cp.charges.fva(), 2.5);
        assert_relative_eq!(cp.charges.total(), 15.0 - 3.0 + 2.5);

        let portfolio = PortfolioXva::from_counterparties(vec![cp]);
        assert_eq!(portfolio.counterparties.len(), 1);
        assert_eq!(portfolio.netting_sets().count(), 2);
        assert_relative_eq!(portfolio.charges.total(), 14.5);
    }

    #[test]
    fn test_colva_value_reduces_total_cost() {
        let a = XvaCharges {
            cva: 4.0,
            colva: -1.5,
            ..XvaCharges::default()
        };
        let b = XvaCharges {
            colva: 0.5,
            ..XvaCharges::default()
        };
        let sum = a + b;
        assert_relative_eq!(sum.colva, -1.0);
        assert_relative_eq!(sum.total(), 5.0);
    }

    #[test]
    fn test_nothing_to_charge() {
        let portfolio = PortfolioXva::from_counterparties(Vec::new());
        assert_eq!(portfolio.charges, XvaCharges::default());
        assert_eq!(portfolio.charges.total(), 0.0);
    }
}
