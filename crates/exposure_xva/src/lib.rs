//! # exposure_xva: Netting, Collateral, Exposure and XVA
//!
//! Post-processing of a sealed [`NpvCube`](exposure_cube::NpvCube):
//!
//! ```text
//!   NpvCube (sealed) ──► NettingAggregator ──► NettingSetExposure  (V, C, V - C)
//!        │                                            │
//!        └──► ExposureProfile::trade       ExposureProfile::netting_set
//!                      │                              │
//!                      ▼                              ▼
//!              ExposureRecord rows          XvaCalculator ──► PortfolioXva
//!                                                     │
//!                                  ExposureAllocator ◄┘  (per-trade EPE/ENE, CVA/DVA)
//! ```
//!
//! - [`netting`]: netting sets, CSA terms, margin calls
//! - [`aggregator`]: per-netting-set aggregation in date order, in parallel
//!   across netting sets
//! - [`exposure`]: EPE/ENE/PFE and Basel profile measures
//! - [`xva`]: CVA, DVA, FCA/FBA, COLVA and their roll-up
//! - [`allocation`]: netting-set exposure split back to trades
//! - [`records`]: serialisable report rows

#![warn(missing_docs)]

pub mod aggregator;
pub mod allocation;
pub mod exposure;
pub mod netting;
pub mod records;
pub mod xva;

pub use aggregator::{NettingAggregator, NettingSetAggregation, NettingSetExposure};
pub use allocation::{
    AllocatedPoint, AllocationConfig, AllocationMethod, ExposureAllocator, TradeAllocation,
    DEFAULT_MARGINAL_LIMIT,
};
pub use exposure::{
    exposure_statistics, quantile, ExposureConfig, ExposurePoint, ExposureProfile,
    ExposureStatistics, ExposureSubject, DEFAULT_PFE_QUANTILE,
};
pub use netting::{
    assign_trades, settled_margin, CollateralAgreement, CollateralCalculationType, NettingSet,
    DEFAULT_MPOR_DAYS,
};
pub use records::{AllocatedExposureRecord, AllocatedXvaRecord, ExposureRecord, XvaRecord};
pub use xva::{
    compute_cva, compute_cva_with_survival, compute_dva, compute_dva_with_survival, compute_fba,
    compute_fca, compute_fva, Counterparty, CounterpartyXva, CreditParams, FundingParams,
    NettingSetXva, PortfolioXva, XvaCalculator, XvaCharges, XvaConfig,
};
