//! # exposure_amc: American Monte Carlo Regression Engine
//!
//! Fits continuation value regressions per exercise date from simulated
//! paths, in a backward sweep from the last scheduled date to the first.
//!
//! ## Lifecycle
//!
//! ```text
//!   AmcRegressionEngine::new(config, schedule)
//!        │
//!        ▼   for each date, last to first:
//!   fit(date, features, realised) ── Collecting → Fitting → Published
//!        │
//!        ▼
//!   freeze() ──► FrozenRegressionModels (immutable, Send + Sync)
//!        │
//!        ▼
//!   forward valuation pass reads continuation values
//! ```
//!
//! ## Numerical Policy
//!
//! Least squares is solved by SVD. When the condition number of the design
//! matrix exceeds [`RegressionConfig::condition_threshold`] the configured
//! [`RegularisationPolicy`] is applied instead of failing, so a continuation
//! estimate is always produced. Every fit records [`FitDiagnostics`].

pub mod basis;
pub mod engine;
pub mod model;
pub mod regression;

pub use basis::{BasisFunctionType, BasisSystem};
pub use engine::{AmcRegressionEngine, FitPhase, FrozenRegressionModels};
pub use model::RegressionModel;
pub use regression::{FitDiagnostics, FitMethod, RegressionConfig, RegularisationPolicy};
