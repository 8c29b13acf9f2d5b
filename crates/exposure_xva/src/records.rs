//! Flat, serialisable rows for report output.

use chrono::NaiveDate;
use serde::Serialize;

use crate::allocation::TradeAllocation;
use crate::exposure::ExposureProfile;
use crate::xva::{PortfolioXva, XvaCharges};

/// One row of an exposure profile.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExposureRecord {
    /// Trade or netting set identifier
    pub id: String,
    /// Empty for the t0 row
    pub date_index: Option<usize>,
    /// Calendar date
    pub date: NaiveDate,
    /// Year fraction from the as-of date
    pub time: f64,
    /// Expected positive exposure
    pub epe: f64,
    /// Expected negative exposure
    pub ene: f64,
    /// Potential future exposure
    pub pfe: f64,
    /// Basel expected exposure
    pub ee_b: f64,
    /// Basel effective expected exposure
    pub eee_b: f64,
    /// Mean collateral balance
    pub expected_collateral: f64,
    /// Undiscounted COLVA accrued since the previous row
    pub colva_increment: f64,
    /// Samples behind the statistics
    pub valid_samples: usize,
}

/// One row of the XVA report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct XvaRecord {
    /// "netting_set", "counterparty" or "portfolio"
    pub level: &'static str,
    /// Netting set or counterparty identifier, "portfolio" on the total row
    pub id: String,
    /// Empty on the portfolio row
    pub counterparty_id: String,
    /// Credit valuation adjustment
    pub cva: f64,
    /// Debit valuation adjustment
    pub dva: f64,
    /// Funding cost adjustment
    pub fca: f64,
    /// Funding benefit adjustment
    pub fba: f64,
    /// FCA - FBA
    pub fva: f64,
    /// Collateral rate spread adjustment
    pub colva: f64,
    /// CVA - DVA + FVA - COLVA
    pub total_xva: f64,
}

/// One row of an allocated trade profile.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AllocatedExposureRecord {
    /// Allocated trade
    pub trade_id: String,
    /// Netting set of the trade
    pub netting_set_id: String,
    /// Empty for the t0 row
    pub date_index: Option<usize>,
    /// Calendar date
    pub date: NaiveDate,
    /// Year fraction from the as-of date
    pub time: f64,
    /// Share of the netted EPE
    pub allocated_epe: f64,
    /// Share of the netted ENE
    pub allocated_ene: f64,
}

/// Allocated credit charges of one trade.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AllocatedXvaRecord {
    /// Allocated trade
    pub trade_id: String,
    /// Netting set of the trade
    pub netting_set_id: String,
    pub counterparty_id: String,
    /// CVA of the allocated EPE
    pub allocated_cva: f64,
    /// DVA of the allocated ENE
    pub allocated_dva: f64,
}

impl TradeAllocation {
    /// t0 row followed by one row per simulation date.
    pub fn records(&self) -> Vec<AllocatedExposureRecord> {
        self.points
            .iter()
            .map(|p| AllocatedExposureRecord {
                trade_id: self.trade_id.to_string(),
                netting_set_id: self.netting_set_id.to_string(),
                date_index: p.date_index,
                date: p.date,
                time: p.time,
                allocated_epe: p.epe,
                allocated_ene: p.ene,
            })
            .collect()
    }

    /// The trade's row of the allocated XVA report.
    pub fn xva_record(&self) -> AllocatedXvaRecord {
        AllocatedXvaRecord {
            trade_id: self.trade_id.to_string(),
            netting_set_id: self.netting_set_id.to_string(),
            counterparty_id: self.counterparty_id.to_string(),
            allocated_cva: self.cva,
            allocated_dva: self.dva,
        }
    }
}

impl ExposureProfile {
    /// t0 row followed by one row per simulation date.
    pub fn records(&self) -> Vec<ExposureRecord> {
        self.all_points()
            .map(|p| ExposureRecord {
                id: self.id().to_string(),
                date_index: p.date_index,
                date: p.date,
                time: p.time,
                epe: p.epe,
                ene: p.ene,
                pfe: p.pfe,
                ee_b: p.ee_b,
                eee_b: p.eee_b,
                expected_collateral: p.expected_collateral,
                colva_increment: p.colva_increment,
                valid_samples: p.valid_samples,
            })
            .collect()
    }
}

impl XvaRecord {
    fn new(level: &'static str, id: String, counterparty_id: String, charges: &XvaCharges) -> Self {
        Self {
            level,
            id,
            counterparty_id,
            cva: charges.cva,
            dva: charges.dva,
            fca: charges.fca,
            fba: charges.fba,
            fva: charges.fva(),
            colva: charges.colva,
            total_xva: charges.total(),
        }
    }
}

impl PortfolioXva {
    /// Netting-set rows, then counterparty rows, then the portfolio total.
    pub fn records(&self) -> Vec<XvaRecord> {
        let netting_sets = self.netting_sets().map(|ns| {
            XvaRecord::new(
                "netting_set",
                ns.netting_set_id.to_string(),
                ns.counterparty_id.to_string(),
                &ns.charges,
            )
        });
        let counterparties = self.counterparties.iter().map(|cp| {
            XvaRecord::new(
                "counterparty",
                cp.counterparty_id.to_string(),
                cp.counterparty_id.to_string(),
                &cp.charges,
            )
        });
        let total = XvaRecord::new("portfolio", "portfolio".to_string(), String::new(), &self.charges);
        netting_sets
            .chain(counterparties)
            .chain(std::iter::once(total))
            .collect()
    }
}
