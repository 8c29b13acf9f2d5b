//! # exposure_scenario: Scenario Generator
//!
//! Produces risk factor paths across simulation dates and samples under a
//! cross-asset model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             exposure_scenario                │
//! ├──────────────────────────────────────────────┤
//! │  model/        - Hull-White 1F, GBM,         │
//! │                  CrossAssetModel             │
//! │  correlation/  - Correlation, Cholesky       │
//! │  config/       - ScenarioGeneratorConfig     │
//! │  generator/    - ScenarioGenerator           │
//! │  scenario/     - ScenarioSet (date, sample)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Reproducibility
//!
//! Each sample draws from its own random stream derived from `(seed, sample)`,
//! so identical inputs give bit-identical scenario sets regardless of the
//! number of worker threads.

pub mod config;
pub mod correlation;
pub mod generator;
pub mod model;
pub mod scenario;

pub use config::{ScenarioGeneratorConfig, SequenceType};
pub use correlation::{CholeskyFactor, CorrelationMatrix};
pub use generator::ScenarioGenerator;
pub use model::{CrossAssetModel, FactorModel, GbmParams, HullWhiteParams, ModelSpec};
pub use scenario::ScenarioSet;
