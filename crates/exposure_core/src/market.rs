//! Market data access by (risk factor, date).
//!
//! Valuation strategies never read market data directly; they go through a
//! [`MarketDataProvider`], which fails with [`ValuationError`] when an entry
//! is missing so that the cube builder can isolate the affected trade.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::ValuationError;

/// Identifier of a market or simulated risk factor, e.g. `IR/EUR`, `FX/EURUSD`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskFactorId(String);

impl RiskFactorId {
    /// Creates an identifier from its full name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Short rate state of a currency.
    pub fn interest_rate(currency: &str) -> Self {
        Self(format!("IR/{}", currency))
    }

    /// FX spot quoted as units of domestic per unit of foreign.
    pub fn fx(pair: &str) -> Self {
        Self(format!("FX/{}", pair))
    }

    /// Equity spot.
    pub fn equity(name: &str) -> Self {
        Self(format!("EQ/{}", name))
    }

    /// Implied volatility quote of an underlying.
    pub fn volatility(underlying: &str) -> Self {
        Self(format!("VOL/{}", underlying))
    }

    /// Flat discount or projection rate quote of a currency.
    pub fn rate(currency: &str) -> Self {
        Self(format!("RATE/{}", currency))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RiskFactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RiskFactorId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Date at which market data is requested.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValuationDate {
    /// The as-of (t0) date
    AsOf,
    /// A simulation grid date, by index
    Simulation(usize),
}

impl fmt::Display for ValuationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuationDate::AsOf => f.write_str("as-of date"),
            ValuationDate::Simulation(i) => write!(f, "date index {}", i),
        }
    }
}

/// Source of non-simulated market inputs (volatilities, fixed rates, ...).
pub trait MarketDataProvider: Send + Sync {
    /// Returns the value of `factor` at `date`.
    ///
    /// # Errors
    /// `ValuationError::MissingMarketData` if there is no entry.
    fn value(&self, factor: &RiskFactorId, date: ValuationDate) -> Result<f64, ValuationError>;
}

/// In-memory market data with static quotes and per-date overrides.
///
/// Lookup order for a simulation date: dated entry, explicit gap, static quote.
///
/// # Examples
///
/// ```
/// use exposure_core::{InMemoryMarketData, MarketDataProvider, RiskFactorId, ValuationDate};
///
/// let vol = RiskFactorId::volatility("SPX");
/// let mut market = InMemoryMarketData::new();
/// market.insert(vol.clone(), 0.2);
/// market.mark_missing(vol.clone(), 3);
///
/// assert_eq!(market.value(&vol, ValuationDate::Simulation(2)).unwrap(), 0.2);
/// assert!(market.value(&vol, ValuationDate::Simulation(3)).is_err());
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InMemoryMarketData {
    #[serde(default)]
    quotes: HashMap<RiskFactorId, f64>,
    #[serde(skip)]
    dated: HashMap<(RiskFactorId, usize), f64>,
    #[serde(skip)]
    gaps: HashSet<(RiskFactorId, usize)>,
}

impl InMemoryMarketData {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a static quote valid at every date.
    pub fn insert(&mut self, factor: RiskFactorId, value: f64) {
        self.quotes.insert(factor, value);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_quote(mut self, factor: RiskFactorId, value: f64) -> Self {
        self.insert(factor, value);
        self
    }

    /// Overrides the quote at one simulation date.
    pub fn insert_at(&mut self, factor: RiskFactorId, date_index: usize, value: f64) {
        self.gaps.remove(&(factor.clone(), date_index));
        self.dated.insert((factor, date_index), value);
    }

    /// Removes the quote at one simulation date, leaving other dates intact.
    pub fn mark_missing(&mut self, factor: RiskFactorId, date_index: usize) {
        self.dated.remove(&(factor.clone(), date_index));
        self.gaps.insert((factor, date_index));
    }

    /// Number of static quotes.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// True if there are no static quotes.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl MarketDataProvider for InMemoryMarketData {
    fn value(&self, factor: &RiskFactorId, date: ValuationDate) -> Result<f64, ValuationError> {
        let missing = || ValuationError::MissingMarketData {
            factor: factor.to_string(),
            date: date.to_string(),
        };

        if let ValuationDate::Simulation(index) = date {
            let key = (factor.clone(), index);
            if let Some(&v) = self.dated.get(&key) {
                return Ok(v);
            }
            if self.gaps.contains(&key) {
                return Err(missing());
            }
        }
        self.quotes.get(factor).copied().ok_or_else(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_factor_names() {
        assert_eq!(RiskFactorId::interest_rate("EUR").as_str(), "IR/EUR");
        assert_eq!(RiskFactorId::fx("EURUSD").as_str(), "FX/EURUSD");
        assert_eq!(RiskFactorId::equity("SPX").to_string(), "EQ/SPX");
    }

    #[test]
    fn test_dated_override_takes_precedence() {
        let f = RiskFactorId::volatility("SPX");
        let mut m = InMemoryMarketData::new().with_quote(f.clone(), 0.2);
        m.insert_at(f.clone(), 1, 0.3);
        assert_eq!(m.value(&f, ValuationDate::AsOf).unwrap(), 0.2);
        assert_eq!(m.value(&f, ValuationDate::Simulation(1)).unwrap(), 0.3);
        assert_eq!(m.value(&f, ValuationDate::Simulation(0)).unwrap(), 0.2);
    }

    #[test]
    fn test_missing_entry() {
        let m = InMemoryMarketData::new();
        let err = m
            .value(&RiskFactorId::volatility("X"), ValuationDate::Simulation(3))
            .unwrap_err();
        assert_eq!(
            format!("{}", err),
            "Missing market data for VOL/X at date index 3"
        );
    }

    #[test]
    fn test_gap_then_refill() {
        let f = RiskFactorId::rate("USD");
        let mut m = InMemoryMarketData::new().with_quote(f.clone(), 0.03);
        m.mark_missing(f.clone(), 2);
        assert!(m.value(&f, ValuationDate::Simulation(2)).is_err());
        m.insert_at(f.clone(), 2, 0.04);
        assert_eq!(m.value(&f, ValuationDate::Simulation(2)).unwrap(), 0.04);
    }
}
