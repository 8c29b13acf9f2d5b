//! Error taxonomy for the exposure engine.
//!
//! - [`ConfigurationError`]: bad or inconsistent run setup, fatal.
//! - [`ValuationError`]: missing market input or invalid trade pricing,
//!   fatal for one (trade, date) but never for the whole cube.
//! - [`StateError`]: mutation of a sealed or frozen structure.
//! - [`SequenceError`]: a temporally ordered operation was called out of order.
//! - [`EngineError`]: umbrella type returned by run-level operations.

use thiserror::Error;

/// Bad or inconsistent run configuration.
///
/// # Examples
/// ```
/// use exposure_core::ConfigurationError;
///
/// let err = ConfigurationError::NonIncreasingDates { index: 3 };
/// assert_eq!(
///     format!("{}", err),
///     "Date grid is not strictly increasing at index 3"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// No simulation dates were supplied.
    #[error("Date grid is empty")]
    EmptyDateGrid,

    /// A date (or time) does not follow its predecessor.
    #[error("Date grid is not strictly increasing at index {index}")]
    NonIncreasingDates {
        /// Position of the offending entry
        index: usize,
    },

    /// A date (or time) is not after the as-of date.
    #[error("Date grid entry {index} is not after the as-of date")]
    NotAfterAsOf {
        /// Position of the offending entry
        index: usize,
    },

    /// Sample counts must be strictly positive.
    #[error("Sample count must be positive, got {samples}")]
    NonPositiveSampleCount {
        /// Requested sample count
        samples: usize,
    },

    /// A tenor string could not be parsed.
    #[error("Invalid tenor: '{0}'")]
    InvalidTenor(String),

    /// A model, trade or agreement parameter is out of range.
    #[error("Invalid parameter {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Why it was rejected
        reason: String,
    },

    /// The correlation matrix has no Cholesky factorisation.
    #[error("Correlation matrix is not positive definite")]
    NotPositiveDefinite,

    /// Two inputs disagree on a dimension.
    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// What was being compared
        what: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        got: usize,
    },

    /// A reference to an entity that does not exist.
    #[error("Unknown {kind}: '{id}'")]
    UnknownReference {
        /// Entity kind, e.g. "trade"
        kind: &'static str,
        /// Referenced identifier
        id: String,
    },

    /// The same identifier was registered twice.
    #[error("Duplicate {kind}: '{id}'")]
    Duplicate {
        /// Entity kind, e.g. "netting set"
        kind: &'static str,
        /// Duplicated identifier
        id: String,
    },
}

impl ConfigurationError {
    /// Shorthand for [`ConfigurationError::InvalidParameter`].
    pub fn invalid(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

/// Failure to value a trade at one date.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    /// A market or curve input has no entry at the requested date.
    #[error("Missing market data for {factor} at {date}")]
    MissingMarketData {
        /// Risk factor identifier
        factor: String,
        /// Human-readable date label
        date: String,
    },

    /// A simulated risk factor required by the trade is not in the scenario set.
    #[error("Risk factor {factor} is not simulated")]
    UnsimulatedFactor {
        /// Risk factor identifier
        factor: String,
    },

    /// The trade cannot be priced as specified.
    #[error("Invalid trade {trade_id}: {reason}")]
    InvalidTrade {
        /// Trade identifier
        trade_id: String,
        /// What is wrong with it
        reason: String,
    },

    /// An early-exercise trade has no fitted model for a date it needs one.
    #[error("No regression model for trade {trade_id} at date index {date_index}")]
    MissingRegressionModel {
        /// Trade identifier
        trade_id: String,
        /// Simulation date index
        date_index: usize,
    },

    /// Pricing produced a non-finite number.
    #[error("Non-finite value for trade {trade_id}")]
    NonFinite {
        /// Trade identifier
        trade_id: String,
    },
}

/// Attempted mutation of an immutable structure, or use before it is ready.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Writes are rejected once the cube has been sealed.
    #[error("NPV cube is sealed")]
    CubeSealed,

    /// Aggregation requires a sealed cube.
    #[error("NPV cube is not sealed")]
    CubeNotSealed,

    /// The regression model set has been frozen.
    #[error("Regression models are frozen")]
    ModelsFrozen,

    /// Freezing requires every scheduled date to be fitted.
    #[error("Regression schedule incomplete: {missing} date(s) not fitted")]
    IncompleteSchedule {
        /// Number of scheduled dates without a published model
        missing: usize,
    },

    /// Index outside the container bounds.
    #[error("{axis} index {index} out of range (len {len})")]
    OutOfRange {
        /// Axis name, e.g. "trade"
        axis: &'static str,
        /// Requested index
        index: usize,
        /// Axis length
        len: usize,
    },
}

/// A temporally ordered operation was requested out of order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// Netting set dates must be aggregated in strictly increasing order.
    #[error("Netting set {netting_set}: expected date index {expected}, requested {requested}")]
    Aggregation {
        /// Netting set identifier
        netting_set: String,
        /// Next date index the aggregator accepts
        expected: usize,
        /// Date index that was requested
        requested: usize,
    },

    /// Regression fits must run from the last scheduled date to the first.
    #[error("Regression fit requested at date index {requested}, expected date index {expected}")]
    Regression {
        /// Next date index in reverse chronological order
        expected: usize,
        /// Date index that was requested
        requested: usize,
    },

    /// The date index is not part of the regression schedule.
    #[error("Date index {requested} is not a scheduled regression date")]
    Unscheduled {
        /// Date index that was requested
        requested: usize,
    },
}

/// Umbrella error returned by run-level operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Configuration error
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Valuation error that could not be isolated to a single trade
    #[error(transparent)]
    Valuation(#[from] ValuationError),

    /// State error
    #[error(transparent)]
    State(#[from] StateError),

    /// Sequence error
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    /// The run was cancelled; any partial result is discarded.
    #[error("Run cancelled")]
    Cancelled,
}
