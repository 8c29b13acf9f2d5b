//! Cube construction over a portfolio.

use exposure_core::{
    CancellationToken, EngineError, MarketDataProvider, TradeId, ValuationDate, ValuationError,
};
use exposure_scenario::ScenarioSet;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::amc::AmcModels;
use crate::cube::NpvCube;
use crate::portfolio::Portfolio;
use crate::pricing::{value_path_independent, ValuationContext};
use crate::report::{ValuationErrorRecord, ValuationReport};
use crate::trade::{EarlyExerciseProduct, PathIndependentProduct, Trade, TradeKind};

/// Sealed cube plus the failures met while filling it.
#[derive(Debug)]
pub struct CubeBuild {
    /// The sealed cube
    pub cube: NpvCube,
    /// At most one record per failed (trade, date)
    pub report: ValuationReport,
}

/// Valuations of one trade, laid out `[date][sample]`.
struct TradeValues {
    t0: Option<f64>,
    values: Vec<f64>,
    valid: Vec<bool>,
    report: ValuationReport,
}

impl TradeValues {
    fn failed(trade_id: &TradeId, n_cells: usize, error: ValuationError) -> Self {
        let mut report = ValuationReport::new();
        report.record(ValuationErrorRecord {
            trade_id: trade_id.clone(),
            date_index: None,
            error,
        });
        Self {
            t0: None,
            values: vec![0.0; n_cells],
            valid: vec![false; n_cells],
            report,
        }
    }
}

/// Values every trade at every (date, sample) of a scenario set.
///
/// Trades are valued in parallel. A failed valuation invalidates the
/// affected cells and is recorded once per (trade, date); the rest of the
/// portfolio is unaffected.
pub struct CubeBuilder<'a> {
    scenarios: &'a ScenarioSet,
    portfolio: &'a Portfolio,
    market: &'a dyn MarketDataProvider,
    amc_models: Option<&'a AmcModels>,
    cancel: Option<CancellationToken>,
}

impl<'a> CubeBuilder<'a> {
    /// Builder over `scenarios` for `portfolio`.
    pub fn new(
        scenarios: &'a ScenarioSet,
        portfolio: &'a Portfolio,
        market: &'a dyn MarketDataProvider,
    ) -> Self {
        Self {
            scenarios,
            portfolio,
            market,
            amc_models: None,
            cancel: None,
        }
    }

    /// Frozen models for the early-exercise trades.
    pub fn with_amc_models(mut self, models: &'a AmcModels) -> Self {
        self.amc_models = Some(models);
        self
    }

    /// Token checked between trades.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Builds and seals the cube.
    ///
    /// # Errors
    /// - `EngineError::Cancelled` if the token fires; no partial cube is returned
    /// - `ConfigurationError` if the cube cannot be allocated
    pub fn build(&self) -> Result<CubeBuild, EngineError> {
        let scenarios = self.scenarios;
        let n_dates = scenarios.n_dates();
        let n_samples = scenarios.n_samples();
        info!(
            trades = self.portfolio.len(),
            dates = n_dates,
            samples = n_samples,
            "Building NPV cube"
        );

        let slabs: Vec<Option<TradeValues>> = self
            .portfolio
            .trades()
            .par_iter()
            .map(|trade| {
                if self.cancelled() {
                    return None;
                }
                Some(self.value_trade(trade))
            })
            .collect();
        if self.cancelled() || slabs.iter().any(Option::is_none) {
            warn!("Cube build cancelled");
            return Err(EngineError::Cancelled);
        }

        let mut cube = NpvCube::new(self.portfolio.trade_ids(), scenarios.grid().clone(), n_samples)?;
        let mut report = ValuationReport::new();
        for (t, slab) in slabs.into_iter().flatten().enumerate() {
            cube.set_t0(t, slab.t0)?;
            for d in 0..n_dates {
                let range = d * n_samples..(d + 1) * n_samples;
                cube.write_date(t, d, &slab.values[range.clone()], &slab.valid[range])?;
            }
            report.merge(slab.report);
        }
        cube.seal();
        if report.is_empty() {
            info!("NPV cube sealed");
        } else {
            warn!(
                failures = report.len(),
                invalid_cells = cube.invalid_count(),
                "NPV cube sealed with valuation failures"
            );
        }
        Ok(CubeBuild { cube, report })
    }

    fn value_trade(&self, trade: &Trade) -> TradeValues {
        let n_cells = self.scenarios.n_dates() * self.scenarios.n_samples();
        let base = self.scenarios.model().base_currency();
        if trade.kind().currency() != base {
            let error = ValuationError::InvalidTrade {
                trade_id: trade.id().to_string(),
                reason: format!(
                    "trade currency {} differs from base currency {}",
                    trade.kind().currency(),
                    base
                ),
            };
            warn!(trade = %trade.id(), error = %error, "Trade not valued");
            return TradeValues::failed(trade.id(), n_cells, error);
        }
        debug!(trade = %trade.id(), strategy = ?trade.strategy(), "Valuing trade");
        match trade.kind() {
            TradeKind::PathIndependent(p) => self.value_path_independent(trade.id(), p),
            TradeKind::EarlyExercise(p) => self.value_early_exercise(trade.id(), p),
        }
    }

    fn value_path_independent(&self, trade_id: &TradeId, product: &PathIndependentProduct) -> TradeValues {
        let scenarios = self.scenarios;
        let n_samples = scenarios.n_samples();
        let mut report = ValuationReport::new();

        let t0_ctx = ValuationContext::new(scenarios, self.market, ValuationDate::AsOf, 0);
        let t0 = match finite(trade_id, value_path_independent(product, &t0_ctx)) {
            Ok(v) => Some(v),
            Err(error) => {
                report.record(ValuationErrorRecord {
                    trade_id: trade_id.clone(),
                    date_index: None,
                    error,
                });
                None
            }
        };

        let mut values = vec![0.0; scenarios.n_dates() * n_samples];
        let mut valid = vec![false; values.len()];
        for d in 0..scenarios.n_dates() {
            let date = ValuationDate::Simulation(d);
            for s in 0..n_samples {
                let ctx = ValuationContext::new(scenarios, self.market, date, s);
                match finite(trade_id, value_path_independent(product, &ctx)) {
                    Ok(v) => {
                        values[d * n_samples + s] = v;
                        valid[d * n_samples + s] = true;
                    }
                    Err(error) => report.record(ValuationErrorRecord {
                        trade_id: trade_id.clone(),
                        date_index: Some(d),
                        error,
                    }),
                }
            }
        }
        log_failures(trade_id, &report);
        TradeValues {
            t0,
            values,
            valid,
            report,
        }
    }

    fn value_early_exercise(&self, trade_id: &TradeId, product: &EarlyExerciseProduct) -> TradeValues {
        let scenarios = self.scenarios;
        let n_dates = scenarios.n_dates();
        let n_samples = scenarios.n_samples();
        let n_cells = n_dates * n_samples;

        let Some(set) = self.amc_models.and_then(|m| m.get(trade_id)) else {
            let error = ValuationError::MissingRegressionModel {
                trade_id: trade_id.to_string(),
                date_index: 0,
            };
            warn!(trade = %trade_id, "No AMC model set; trade left invalid");
            return TradeValues::failed(trade_id, n_cells, error);
        };
        let features = match set.bind(scenarios) {
            Ok(f) => f,
            Err(e) => {
                let error = match e {
                    EngineError::Valuation(v) => v,
                    other => ValuationError::InvalidTrade {
                        trade_id: trade_id.to_string(),
                        reason: other.to_string(),
                    },
                };
                return TradeValues::failed(trade_id, n_cells, error);
            }
        };

        let mut values = vec![0.0; n_cells];
        let mut valid = vec![false; n_cells];
        let mut report = ValuationReport::new();
        for s in 0..n_samples {
            let path = set.value_path(product, &features, scenarios, self.market, s);
            for (d, result) in path.into_iter().enumerate() {
                match finite(trade_id, result) {
                    Ok(v) => {
                        values[d * n_samples + s] = v;
                        valid[d * n_samples + s] = true;
                    }
                    Err(error) => report.record(ValuationErrorRecord {
                        trade_id: trade_id.clone(),
                        date_index: Some(d),
                        error,
                    }),
                }
            }
        }
        log_failures(trade_id, &report);
        TradeValues {
            t0: Some(product.position().sign() * set.t0_value()),
            values,
            valid,
            report,
        }
    }
}

fn finite(trade_id: &TradeId, result: Result<f64, ValuationError>) -> Result<f64, ValuationError> {
    match result {
        Ok(v) if !v.is_finite() => Err(ValuationError::NonFinite {
            trade_id: trade_id.to_string(),
        }),
        other => other,
    }
}

fn log_failures(trade_id: &TradeId, report: &ValuationReport) {
    for record in report.errors() {
        warn!(
            trade = %trade_id,
            date_index = ?record.date_index,
            error = %record.error,
            "Valuation failed"
        );
    }
}
