//! Per-trade valuation failures collected during a cube build.

use exposure_core::{TradeId, ValuationError};
use serde::Serialize;

/// One failed valuation.
///
/// `date_index` is `None` for failures that apply to the whole trade
/// (t0 included), such as a missing AMC model set.
#[derive(Clone, Debug, PartialEq)]
pub struct ValuationErrorRecord {
    /// Trade that failed
    pub trade_id: TradeId,
    /// Simulation date index, if the failure is date specific
    pub date_index: Option<usize>,
    /// What went wrong
    pub error: ValuationError,
}

/// Flat form of [`ValuationErrorRecord`] for CSV output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValuationErrorRow {
    /// Trade identifier
    pub trade_id: String,
    /// Simulation date index, empty for trade-level failures
    pub date_index: Option<usize>,
    /// Error message
    pub message: String,
}

/// Valuation failures of a run, at most one per (trade, date).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValuationReport {
    errors: Vec<ValuationErrorRecord>,
}

impl ValuationReport {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a failure unless the same (trade, date) is already recorded.
    pub fn record(&mut self, record: ValuationErrorRecord) {
        let seen = self
            .errors
            .iter()
            .any(|r| r.trade_id == record.trade_id && r.date_index == record.date_index);
        if !seen {
            self.errors.push(record);
        }
    }

    /// Appends all records of another report.
    pub fn merge(&mut self, other: ValuationReport) {
        for record in other.errors {
            self.record(record);
        }
    }

    /// All failures, in recording order.
    #[inline]
    pub fn errors(&self) -> &[ValuationErrorRecord] {
        &self.errors
    }

    /// Failures of one trade.
    pub fn for_trade<'a>(&'a self, trade_id: &'a TradeId) -> impl Iterator<Item = &'a ValuationErrorRecord> {
        self.errors.iter().filter(move |r| &r.trade_id == trade_id)
    }

    /// Number of failures.
    #[inline]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True if every valuation succeeded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Rows for the error report file.
    pub fn rows(&self) -> Vec<ValuationErrorRow> {
        self.errors
            .iter()
            .map(|r| ValuationErrorRow {
                trade_id: r.trade_id.to_string(),
                date_index: r.date_index,
                message: r.error.to_string(),
            })
            .collect()
    }
}
