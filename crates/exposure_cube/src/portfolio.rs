//! Validated collection of trades.

use std::collections::{BTreeSet, HashMap};

use exposure_core::{ConfigurationError, NettingSetId, TradeId};

use crate::trade::{Trade, ValuationStrategy};

/// Trades of a run, in booking order.
#[derive(Clone, Debug, Default)]
pub struct Portfolio {
    trades: Vec<Trade>,
    index: HashMap<TradeId, usize>,
}

impl Portfolio {
    /// Starts a builder.
    #[inline]
    pub fn builder() -> PortfolioBuilder {
        PortfolioBuilder::new()
    }

    /// All trades.
    #[inline]
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Looks up a trade.
    pub fn get(&self, id: &TradeId) -> Option<&Trade> {
        self.index.get(id).map(|&i| &self.trades[i])
    }

    /// Number of trades.
    #[inline]
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// True if there are no trades.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Trade identifiers in booking order.
    pub fn trade_ids(&self) -> Vec<TradeId> {
        self.trades.iter().map(|t| t.id().clone()).collect()
    }

    /// Trades valued with American Monte Carlo.
    pub fn early_exercise_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades
            .iter()
            .filter(|t| t.strategy() == ValuationStrategy::AmericanMonteCarlo)
    }

    /// Netting sets referenced by at least one trade.
    pub fn netting_set_ids(&self) -> BTreeSet<&NettingSetId> {
        self.trades.iter().map(Trade::netting_set_id).collect()
    }
}

/// Builder checking ids and product terms.
#[derive(Default)]
pub struct PortfolioBuilder {
    trades: Vec<Trade>,
}

impl PortfolioBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trade(mut self, trade: Trade) -> Self {
        self.trades.push(trade);
        self
    }

    pub fn add_trades(mut self, trades: impl IntoIterator<Item = Trade>) -> Self {
        self.trades.extend(trades);
        self
    }

    /// Validates and builds the portfolio.
    ///
    /// # Errors
    /// `ConfigurationError::Duplicate` for a repeated trade id, or the first
    /// invalid product.
    pub fn build(self) -> Result<Portfolio, ConfigurationError> {
        let mut index = HashMap::with_capacity(self.trades.len());
        for (i, trade) in self.trades.iter().enumerate() {
            if index.insert(trade.id().clone(), i).is_some() {
                return Err(ConfigurationError::Duplicate {
                    kind: "trade",
                    id: trade.id().to_string(),
                });
            }
            trade.validate()?;
        }
        Ok(Portfolio {
            trades: self.trades,
            index,
        })
    }
}
