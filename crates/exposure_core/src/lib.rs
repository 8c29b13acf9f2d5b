//! # exposure_core: Foundation for the Exposure Simulation Engine
//!
//! ## Foundation Layer Role
//!
//! exposure_core is the bottom layer of the engine and is shared by every
//! simulation, aggregation and service crate. It provides:
//! - Identifier newtypes: `TradeId`, `NettingSetId`, `CounterpartyId` (`ids`)
//! - The simulation date grid: `DateGrid`, `SimulationDate`, `Period` (`time`)
//! - The error taxonomy: `ConfigurationError`, `ValuationError`,
//!   `StateError`, `SequenceError` and the umbrella `EngineError` (`error`)
//! - Market data access by (risk factor, date): `MarketDataProvider` (`market`)
//! - Deterministic discount and credit curves (`curves`)
//! - Per-sample seeded random streams: `SampleRng` (`rng`)
//! - Normal distribution helpers (`math`)
//!
//! ## Usage Examples
//!
//! ```rust
//! use chrono::NaiveDate;
//! use exposure_core::time::{DateGrid, DayCountConvention};
//!
//! let as_of = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//! let grid = DateGrid::parse(as_of, "4,3M", DayCountConvention::Act365Fixed).unwrap();
//! assert_eq!(grid.len(), 4);
//! assert!(grid.dates()[0].time > 0.0);
//! ```

pub mod cancel;
pub mod curves;
pub mod error;
pub mod ids;
pub mod market;
pub mod math;
pub mod rng;
pub mod time;

pub use cancel::CancellationToken;
pub use error::{ConfigurationError, EngineError, SequenceError, StateError, ValuationError};
pub use ids::{CounterpartyId, NettingSetId, TradeId};
pub use market::{InMemoryMarketData, MarketDataProvider, RiskFactorId, ValuationDate};
pub use time::{DateGrid, DayCountConvention, Period, SimulationDate};
