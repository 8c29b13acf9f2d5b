//! # exposure_cube: Trade Valuation into the NPV Cube
//!
//! Values a portfolio at every (trade, date, sample) of a scenario set, plus
//! t0, into a dense [`NpvCube`].
//!
//! ## Valuation strategies
//!
//! The trade kind selects the strategy:
//!
//! - [`PathIndependentProduct`]: closed-form pricing from the scenario at one
//!   (date, sample) and market data ([`value_path_independent`]).
//! - [`EarlyExerciseProduct`]: American Monte Carlo in two phases. The
//!   [`AmcTrainer`] runs the backward sweep on training scenarios and
//!   produces one [`AmcModelSet`] per trade; the cube build reads them
//!   immutably in a forward exercise pass.
//!
//! ```text
//!   training ScenarioSet ──► AmcTrainer ──► AmcModels (frozen)
//!                                               │
//!   cube ScenarioSet + Portfolio + market ──► CubeBuilder ──► NpvCube (sealed)
//!                                                         └─► ValuationReport
//! ```
//!
//! Valuation failures do not abort the build: the affected cells are left
//! invalid and the failure is recorded in the [`ValuationReport`].

pub mod amc;
pub mod builder;
pub mod cube;
pub mod portfolio;
pub mod pricing;
pub mod report;
pub mod trade;

pub use amc::{AmcModelSet, AmcModels, AmcTrainer, AmcTraining, ExerciseSchedule};
pub use builder::{CubeBuild, CubeBuilder};
pub use cube::{CubeRecord, NpvCube};
pub use portfolio::{Portfolio, PortfolioBuilder};
pub use pricing::{value_path_independent, ValuationContext};
pub use report::{ValuationErrorRecord, ValuationErrorRow, ValuationReport};
pub use trade::{
    BermudanOption, BermudanSwaption, EarlyExerciseProduct, EquityForward, EuropeanOption,
    FxForward, InterestRateSwap, OptionType, PathIndependentProduct, Position, Settlement,
    SwapDirection, Trade, TradeKind, ValuationStrategy,
};
