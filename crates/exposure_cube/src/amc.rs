//! Two-phase American Monte Carlo valuation of early-exercise trades.
//!
//! [`AmcTrainer`] runs the backward sweep on a training scenario set and
//! hands an immutable [`AmcModelSet`] per trade to the forward pass, which
//! values every (date, sample) of the cube scenarios. Training and
//! valuation scenarios share the date grid but may differ in seed and
//! sample count.
//!
//! Regressions are fitted at every simulation date before the last exercise
//! date, so the forward pass has a continuation estimate (the trade value)
//! at non-exercise dates too. At the last exercise date the continuation
//! value is zero.
//!
//! With `in_the_money_only`, each exercise date before the last gets a second
//! regression on in-the-money paths. It drives the exercise decision only;
//! the value reported for paths that continue always comes from the
//! all-paths fit, which covers out-of-the-money states too.

use std::collections::HashMap;

use exposure_amc::{AmcRegressionEngine, FrozenRegressionModels, RegressionConfig};
use exposure_core::{
    CancellationToken, ConfigurationError, DateGrid, EngineError, MarketDataProvider,
    RiskFactorId, TradeId, ValuationDate, ValuationError,
};
use exposure_scenario::ScenarioSet;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::portfolio::Portfolio;
use crate::pricing::{swap_npv, ValuationContext};
use crate::report::{ValuationErrorRecord, ValuationReport};
use crate::trade::{EarlyExerciseProduct, Settlement, Trade, TradeKind};

/// Exercise times mapped onto simulation date indices.
///
/// Each exercise time is snapped to the first grid date on or after it;
/// times landing on the same grid date collapse into one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExerciseSchedule {
    exercise_dates: Vec<usize>,
}

impl ExerciseSchedule {
    /// Maps `times` onto `grid`.
    ///
    /// # Errors
    /// `ConfigurationError` if there are no exercise times or one falls after
    /// the last grid date.
    pub fn new(times: &[f64], grid: &DateGrid) -> Result<Self, ConfigurationError> {
        let mut exercise_dates: Vec<usize> = Vec::with_capacity(times.len());
        for &t in times {
            let d = grid.index_on_or_after(t).ok_or_else(|| {
                ConfigurationError::invalid(
                    "exercise_times",
                    format!("exercise at {} is after the last simulation date", t),
                )
            })?;
            if exercise_dates.last() != Some(&d) {
                exercise_dates.push(d);
            }
        }
        if exercise_dates.is_empty() {
            return Err(ConfigurationError::invalid(
                "exercise_times",
                "at least one exercise time is required",
            ));
        }
        Ok(Self { exercise_dates })
    }

    /// Exercise date indices, ascending.
    #[inline]
    pub fn exercise_dates(&self) -> &[usize] {
        &self.exercise_dates
    }

    /// Last exercise date index.
    #[inline]
    pub fn last(&self) -> usize {
        self.exercise_dates[self.exercise_dates.len() - 1]
    }

    /// True if `date_index` is an exercise date.
    #[inline]
    pub fn is_exercise(&self, date_index: usize) -> bool {
        self.exercise_dates.binary_search(&date_index).is_ok()
    }

    /// Dates needing a continuation regression: all dates before the last
    /// exercise.
    pub fn regression_dates(&self) -> Vec<usize> {
        (0..self.last()).collect()
    }

    /// Exercise dates that need an exercise decision regression: all but the
    /// last.
    pub fn early_exercise_dates(&self) -> Vec<usize> {
        self.exercise_dates[..self.exercise_dates.len() - 1].to_vec()
    }
}

/// Frozen continuation models of one trade, ready for the forward pass.
#[derive(Clone, Debug)]
pub struct AmcModelSet {
    trade_id: TradeId,
    schedule: ExerciseSchedule,
    features: Vec<RiskFactorId>,
    models: FrozenRegressionModels,
    exercise_models: Option<FrozenRegressionModels>,
    grid_times: Vec<f64>,
    training_samples: usize,
    t0_value: f64,
}

impl AmcModelSet {
    /// Trade the models belong to.
    #[inline]
    pub fn trade_id(&self) -> &TradeId {
        &self.trade_id
    }

    /// Exercise schedule on the grid.
    #[inline]
    pub fn schedule(&self) -> &ExerciseSchedule {
        &self.schedule
    }

    /// Risk factors used as regression features.
    #[inline]
    pub fn features(&self) -> &[RiskFactorId] {
        &self.features
    }

    /// Fitted models by date index.
    #[inline]
    pub fn models(&self) -> &FrozenRegressionModels {
        &self.models
    }

    /// In-the-money models used for exercise decisions, when configured.
    #[inline]
    pub fn exercise_models(&self) -> Option<&FrozenRegressionModels> {
        self.exercise_models.as_ref()
    }

    /// Number of training samples.
    #[inline]
    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    /// Holder value at the as-of date for a unit long position: the training
    /// mean of discounted cashflows under the fitted exercise policy.
    #[inline]
    pub fn t0_value(&self) -> f64 {
        self.t0_value
    }

    /// Checks that `scenarios` share the training grid and simulate every
    /// feature, returning the feature positions in its state vector.
    ///
    /// # Errors
    /// `ConfigurationError` on a grid mismatch, `ValuationError` for a
    /// missing feature factor.
    pub fn bind(&self, scenarios: &ScenarioSet) -> Result<Vec<usize>, EngineError> {
        let times = scenarios.grid().times();
        if times.len() != self.grid_times.len() {
            return Err(ConfigurationError::DimensionMismatch {
                what: "AMC model dates",
                expected: times.len(),
                got: self.grid_times.len(),
            }
            .into());
        }
        if times
            .iter()
            .zip(&self.grid_times)
            .any(|(a, b)| (a - b).abs() > 1e-10)
        {
            return Err(ConfigurationError::invalid(
                "amc grid",
                format!("trade {} was trained on a different date grid", self.trade_id),
            )
            .into());
        }
        Ok(resolve_features(&self.features, scenarios)?)
    }

    /// Values one path of the trade at every simulation date.
    ///
    /// `features` are the positions returned by [`bind`](Self::bind). Once a
    /// date fails, the rest of the path fails with the same error since the
    /// exercise state is unknown from there on.
    pub fn value_path(
        &self,
        product: &EarlyExerciseProduct,
        features: &[usize],
        scenarios: &ScenarioSet,
        market: &dyn MarketDataProvider,
        sample: usize,
    ) -> Vec<Result<f64, ValuationError>> {
        let sign = product.position().sign();
        let mut exercised = false;
        let mut failure: Option<ValuationError> = None;
        (0..scenarios.n_dates())
            .map(|d| {
                if let Some(e) = &failure {
                    return Err(e.clone());
                }
                let ctx = ValuationContext::new(scenarios, market, ValuationDate::Simulation(d), sample);
                let value = self.holder_value(product, features, scenarios, &ctx, &mut exercised);
                if let Err(e) = &value {
                    failure = Some(e.clone());
                }
                value.map(|v| sign * v)
            })
            .collect()
    }

    fn holder_value(
        &self,
        product: &EarlyExerciseProduct,
        features: &[usize],
        scenarios: &ScenarioSet,
        ctx: &ValuationContext<'_>,
        exercised: &mut bool,
    ) -> Result<f64, ValuationError> {
        if *exercised {
            return settled_value(product, ctx);
        }
        let d = match ctx.date() {
            ValuationDate::Simulation(d) => d,
            ValuationDate::AsOf => return Ok(self.t0_value),
        };
        let last = self.schedule.last();
        if d > last {
            return Ok(0.0);
        }
        let is_exercise = self.schedule.is_exercise(d);
        let (continuation, threshold) = if d == last {
            (0.0, 0.0)
        } else {
            let row = feature_row(scenarios, features, d, ctx.sample());
            let continuation = self.continuation(&self.models, d, &row)?;
            let threshold = match &self.exercise_models {
                Some(models) if is_exercise => self.continuation(models, d, &row)?,
                _ => continuation,
            };
            (continuation, threshold)
        };
        if is_exercise {
            let intrinsic = exercise_value(product, ctx)?;
            if exercises(intrinsic, threshold) {
                *exercised = true;
                return Ok(intrinsic);
            }
        }
        Ok(continuation)
    }

    fn continuation(
        &self,
        models: &FrozenRegressionModels,
        date_index: usize,
        row: &[f64],
    ) -> Result<f64, ValuationError> {
        let model = models
            .get(date_index)
            .ok_or_else(|| ValuationError::MissingRegressionModel {
                trade_id: self.trade_id.to_string(),
                date_index,
            })?;
        Ok(model.predict(row).max(0.0))
    }
}

/// Model sets by trade.
#[derive(Clone, Debug, Default)]
pub struct AmcModels {
    sets: HashMap<TradeId, AmcModelSet>,
}

impl AmcModels {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the model set of a trade, replacing any previous one.
    pub fn insert(&mut self, set: AmcModelSet) {
        self.sets.insert(set.trade_id.clone(), set);
    }

    /// Model set of a trade.
    pub fn get(&self, trade_id: &TradeId) -> Option<&AmcModelSet> {
        self.sets.get(trade_id)
    }

    /// Number of trained trades.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True if no trade was trained.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// All model sets, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &AmcModelSet> {
        self.sets.values()
    }
}

/// Output of training a whole portfolio.
#[derive(Debug, Default)]
pub struct AmcTraining {
    /// Models of the trades that trained successfully
    pub models: AmcModels,
    /// Trades that could not be trained
    pub report: ValuationReport,
}

/// Backward-sweep trainer over a training scenario set.
pub struct AmcTrainer<'a> {
    scenarios: &'a ScenarioSet,
    market: &'a dyn MarketDataProvider,
    config: RegressionConfig,
}

impl<'a> AmcTrainer<'a> {
    /// Creates a trainer on `scenarios`.
    pub fn new(
        scenarios: &'a ScenarioSet,
        market: &'a dyn MarketDataProvider,
        config: RegressionConfig,
    ) -> Self {
        Self {
            scenarios,
            market,
            config,
        }
    }

    /// Regression settings.
    #[inline]
    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Fits the continuation models of one early-exercise trade.
    ///
    /// Realised continuation values follow the policy already fitted at
    /// later dates; a path exercises where the exercise value is positive and
    /// not below the estimated continuation value.
    ///
    /// # Errors
    /// - `ValuationError` for a path-independent trade or a failed exercise
    ///   valuation
    /// - `ConfigurationError` for an exercise schedule outside the grid or an
    ///   invalid regression configuration
    pub fn train(&self, trade: &Trade) -> Result<AmcModelSet, EngineError> {
        let product = match trade.kind() {
            TradeKind::EarlyExercise(p) => p,
            TradeKind::PathIndependent(_) => {
                return Err(ValuationError::InvalidTrade {
                    trade_id: trade.id().to_string(),
                    reason: "trade has no exercise schedule".to_string(),
                }
                .into())
            }
        };
        let scenarios = self.scenarios;
        let market = self.market;
        let schedule = ExerciseSchedule::new(product.exercise_times(), scenarios.grid())?;
        let features = feature_factors(product, scenarios)?;
        let indices = resolve_features(&features, scenarios)?;
        let n = scenarios.n_samples();
        let last = schedule.last();
        let mut engine = AmcRegressionEngine::new(self.config.clone(), schedule.regression_dates())?;
        let mut decision_engine = if self.config.in_the_money_only {
            Some(AmcRegressionEngine::new(
                self.config.clone(),
                schedule.early_exercise_dates(),
            )?)
        } else {
            None
        };

        // Discounted future cashflows per path, in numeraire units.
        let mut future = vec![0.0; n];
        for d in (0..=last).rev() {
            let date = ValuationDate::Simulation(d);
            let is_exercise = schedule.is_exercise(d);
            let intrinsic: Vec<f64> = if is_exercise {
                (0..n)
                    .into_par_iter()
                    .map(|s| exercise_value(product, &ValuationContext::new(scenarios, market, date, s)))
                    .collect::<Result<_, _>>()?
            } else {
                Vec::new()
            };
            let numeraire: Vec<f64> = (0..n).map(|s| scenarios.numeraire(date, s)).collect();

            if d == last {
                for s in 0..n {
                    if exercises(intrinsic[s], 0.0) {
                        future[s] = intrinsic[s] / numeraire[s];
                    }
                }
                continue;
            }

            let rows: Vec<Vec<f64>> = (0..n)
                .into_par_iter()
                .map(|s| feature_row(scenarios, &indices, d, s))
                .collect();
            let realised: Vec<f64> = future.iter().zip(&numeraire).map(|(f, n)| f * n).collect();
            let model = engine.fit(d, &rows, &realised)?;
            debug!(
                trade = %trade.id(),
                date_index = d,
                condition_number = model.diagnostics().condition_number,
                "Continuation regression fitted"
            );
            if is_exercise {
                let decision = match decision_engine.as_mut() {
                    Some(itm_engine) => {
                        let itm: Vec<usize> = (0..n).filter(|&s| intrinsic[s] > 0.0).collect();
                        let x: Vec<Vec<f64>> = itm.iter().map(|&s| rows[s].clone()).collect();
                        let y: Vec<f64> = itm.iter().map(|&s| realised[s]).collect();
                        itm_engine.fit(d, &x, &y)?
                    }
                    None => model,
                };
                future.par_iter_mut().enumerate().for_each(|(s, f)| {
                    if exercises(intrinsic[s], decision.predict(&rows[s])) {
                        *f = intrinsic[s] / numeraire[s];
                    }
                });
            }
        }

        let models = engine.freeze()?;
        let exercise_models = match decision_engine.as_mut() {
            Some(itm_engine) => Some(itm_engine.freeze()?),
            None => None,
        };
        let regularised = models.iter().filter(|m| m.diagnostics().regularised()).count();
        if regularised > 0 {
            warn!(trade = %trade.id(), regularised, "Regularised continuation regressions");
        }
        let t0_value = future.iter().sum::<f64>() / n as f64;
        info!(
            trade = %trade.id(),
            exercise_dates = schedule.exercise_dates().len(),
            regressions = models.len(),
            t0_value,
            "AMC training complete"
        );
        Ok(AmcModelSet {
            trade_id: trade.id().clone(),
            schedule,
            features,
            models,
            exercise_models,
            grid_times: scenarios.grid().times(),
            training_samples: n,
            t0_value,
        })
    }

    /// Trains every early-exercise trade of a portfolio in parallel.
    ///
    /// Trades that fail to train are recorded in the report; the cube marks
    /// their cells invalid.
    ///
    /// # Errors
    /// `EngineError::Cancelled` if `cancel` fires; partial models are dropped.
    pub fn train_portfolio(
        &self,
        portfolio: &Portfolio,
        cancel: Option<&CancellationToken>,
    ) -> Result<AmcTraining, EngineError> {
        let trades: Vec<&Trade> = portfolio.early_exercise_trades().collect();
        info!(
            trades = trades.len(),
            samples = self.scenarios.n_samples(),
            "Training AMC models"
        );
        let results: Vec<Option<(TradeId, Result<AmcModelSet, EngineError>)>> = trades
            .par_iter()
            .map(|trade| {
                if cancel.is_some_and(CancellationToken::is_cancelled) {
                    return None;
                }
                Some((trade.id().clone(), self.train(trade)))
            })
            .collect();
        if cancel.is_some_and(CancellationToken::is_cancelled) || results.iter().any(Option::is_none) {
            return Err(EngineError::Cancelled);
        }

        let mut training = AmcTraining::default();
        for (trade_id, result) in results.into_iter().flatten() {
            match result {
                Ok(set) => training.models.insert(set),
                Err(e) => {
                    warn!(trade = %trade_id, error = %e, "AMC training failed");
                    let error = match e {
                        EngineError::Valuation(v) => v,
                        other => ValuationError::InvalidTrade {
                            trade_id: trade_id.to_string(),
                            reason: other.to_string(),
                        },
                    };
                    training.report.record(ValuationErrorRecord {
                        trade_id,
                        date_index: None,
                        error,
                    });
                }
            }
        }
        Ok(training)
    }
}

#[inline]
fn exercises(intrinsic: f64, continuation: f64) -> bool {
    intrinsic > 0.0 && intrinsic >= continuation
}

/// Exercise value for the holder of a unit long position.
fn exercise_value(product: &EarlyExerciseProduct, ctx: &ValuationContext<'_>) -> Result<f64, ValuationError> {
    match product {
        EarlyExerciseProduct::BermudanOption(p) => {
            Ok(p.quantity * p.option_type.intrinsic(ctx.spot(&p.underlying)?, p.strike))
        }
        EarlyExerciseProduct::BermudanSwaption(p) => swap_npv(&p.underlying, ctx),
    }
}

/// Holder value after exercise.
fn settled_value(product: &EarlyExerciseProduct, ctx: &ValuationContext<'_>) -> Result<f64, ValuationError> {
    match (product, product.settlement()) {
        (_, Settlement::Cash) => Ok(0.0),
        (EarlyExerciseProduct::BermudanSwaption(p), Settlement::Physical) => swap_npv(&p.underlying, ctx),
        (EarlyExerciseProduct::BermudanOption(_), Settlement::Physical) => Ok(0.0),
    }
}

fn feature_factors(
    product: &EarlyExerciseProduct,
    scenarios: &ScenarioSet,
) -> Result<Vec<RiskFactorId>, ValuationError> {
    match product {
        EarlyExerciseProduct::BermudanOption(p) => {
            if scenarios.factor_index(&p.underlying).is_none() {
                return Err(ValuationError::UnsimulatedFactor {
                    factor: p.underlying.to_string(),
                });
            }
            Ok(vec![p.underlying.clone()])
        }
        EarlyExerciseProduct::BermudanSwaption(p) => {
            let currency = &p.underlying.currency;
            Ok(scenarios
                .model()
                .hull_white(currency)
                .map(|_| vec![RiskFactorId::interest_rate(currency)])
                .unwrap_or_default())
        }
    }
}

fn resolve_features(
    features: &[RiskFactorId],
    scenarios: &ScenarioSet,
) -> Result<Vec<usize>, ValuationError> {
    features
        .iter()
        .map(|f| {
            scenarios
                .factor_index(f)
                .ok_or_else(|| ValuationError::UnsimulatedFactor {
                    factor: f.to_string(),
                })
        })
        .collect()
}

fn feature_row(scenarios: &ScenarioSet, indices: &[usize], date_index: usize, sample: usize) -> Vec<f64> {
    let state = scenarios.state_vector(date_index, sample);
    indices.iter().map(|&i| state[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::{BermudanOption, OptionType, Position};
    use chrono::NaiveDate;
    use exposure_core::{DayCountConvention, InMemoryMarketData};
    use exposure_scenario::{
        CrossAssetModel, FactorModel, GbmParams, ModelSpec, ScenarioGenerator,
        ScenarioGeneratorConfig,
    };

    fn grid(times: &[f64]) -> DateGrid {
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DateGrid::from_times(as_of, times, DayCountConvention::Act365Fixed).unwrap()
    }

    fn equity_scenarios(samples: usize, seed: u64) -> ScenarioSet {
        let model = CrossAssetModel::new(ModelSpec {
            base_currency: "EUR".to_string(),
            base_rate: 0.02,
            factors: vec![FactorModel::Equity(GbmParams {
                name: "SPX".to_string(),
                spot: 100.0,
                drift: 0.02,
                volatility: 0.25,
            })],
            correlation: None,
        })
        .unwrap();
        let config = ScenarioGeneratorConfig::builder()
            .samples(samples)
            .seed(seed)
            .build()
            .unwrap();
        ScenarioGenerator::new(model, grid(&[0.25, 0.5, 0.75, 1.0, 1.25]), config)
            .unwrap()
            .generate()
    }

    fn put(exercise_times: Vec<f64>) -> Trade {
        Trade::new(
            "BERM",
            "NS1",
            TradeKind::EarlyExercise(EarlyExerciseProduct::BermudanOption(BermudanOption {
                underlying: RiskFactorId::equity("SPX"),
                currency: "EUR".to_string(),
                option_type: OptionType::Put,
                strike: 100.0,
                exercise_times,
                quantity: 1.0,
                position: Position::Long,
            })),
        )
    }

    #[test]
    fn test_schedule_snaps_and_collapses() {
        let g = grid(&[0.5, 1.0, 1.5]);
        let s = ExerciseSchedule::new(&[0.2, 0.5, 0.9, 1.0], &g).unwrap();
        assert_eq!(s.exercise_dates(), &[0, 1]);
        assert_eq!(s.last(), 1);
        assert_eq!(s.regression_dates(), vec![0]);
        assert!(ExerciseSchedule::new(&[2.0], &g).is_err());
        // 0.6 is nearer 0.5 but snaps forward
        let s = ExerciseSchedule::new(&[0.6], &g).unwrap();
        assert_eq!(s.exercise_dates(), &[1]);
    }

    #[test]
    fn test_training_fits_every_date_before_last_exercise() {
        let scenarios = equity_scenarios(2000, 1);
        let market = InMemoryMarketData::new();
        let trainer = AmcTrainer::new(&scenarios, &market, RegressionConfig::default());
        let set = trainer.train(&put(vec![0.5, 1.0])).unwrap();
        assert_eq!(set.models().dates().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(set.schedule().last(), 3);
        assert!(set.t0_value() > 0.0);
        assert_eq!(set.training_samples(), 2000);
    }

    #[test]
    fn test_cash_settled_path_is_zero_after_exercise() {
        let scenarios = equity_scenarios(500, 2);
        let market = InMemoryMarketData::new();
        let trainer = AmcTrainer::new(&scenarios, &market, RegressionConfig::default());
        let trade = put(vec![0.5, 1.0]);
        let set = trainer.train(&trade).unwrap();
        let product = match trade.kind() {
            TradeKind::EarlyExercise(p) => p,
            TradeKind::PathIndependent(_) => unreachable!(),
        };
        let features = set.bind(&scenarios).unwrap();
        for s in 0..scenarios.n_samples() {
            let path: Vec<f64> = set
                .value_path(product, &features, &scenarios, &market, s)
                .into_iter()
                .map(Result::unwrap)
                .collect();
            assert!(path.iter().all(|v| *v >= 0.0));
            // Nothing is left after the last exercise date.
            assert_eq!(path[4], 0.0);
        }
    }

    #[test]
    fn test_in_the_money_fit_only_drives_exercise() {
        let training = equity_scenarios(20_000, 11);
        let valuation = equity_scenarios(5_000, 12);
        let market = InMemoryMarketData::new();
        let config = RegressionConfig {
            in_the_money_only: true,
            ..RegressionConfig::default()
        };
        let trade = put(vec![0.5, 1.0]);
        let set = AmcTrainer::new(&training, &market, config).train(&trade).unwrap();
        let decisions = set.exercise_models().unwrap();
        assert_eq!(decisions.dates().collect::<Vec<_>>(), vec![1]);
        assert_eq!(set.models().dates().collect::<Vec<_>>(), vec![0, 1, 2]);

        let product = match trade.kind() {
            TradeKind::EarlyExercise(p) => p,
            TradeKind::PathIndependent(_) => unreachable!(),
        };
        let features = set.bind(&valuation).unwrap();
        let spot_index = valuation.factor_index(&RiskFactorId::equity("SPX")).unwrap();

        // Out of the money at t = 0.5 nobody exercises, and what remains is a
        // European put expiring at t = 1.0.
        let (rate, vol, tau): (f64, f64, f64) = (0.02, 0.25, 0.5);
        let mut errors = Vec::new();
        for s in 0..valuation.n_samples() {
            let spot = valuation.state_vector(1, s)[spot_index];
            if spot <= 100.0 {
                continue;
            }
            let value = set
                .value_path(product, &features, &valuation, &market, s)[1]
                .clone()
                .unwrap();
            let exact = exposure_core::math::black_price(
                false,
                spot * (rate * tau).exp(),
                100.0,
                vol * tau.sqrt(),
                (-rate * tau).exp(),
            );
            errors.push(value - exact);
        }
        assert!(errors.len() > 1000);
        let n = errors.len() as f64;
        let bias = errors.iter().sum::<f64>() / n;
        let rms = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
        assert!(bias.abs() < 0.1, "bias {}", bias);
        assert!(rms < 1.0, "rms {}", rms);
    }

    #[test]
    fn test_bind_rejects_other_grid() {
        let training = equity_scenarios(200, 3);
        let market = InMemoryMarketData::new();
        let set = AmcTrainer::new(&training, &market, RegressionConfig::default())
            .train(&put(vec![1.0]))
            .unwrap();

        let model = training.model().clone();
        let config = ScenarioGeneratorConfig::builder().samples(10).build().unwrap();
        let other = ScenarioGenerator::new(model, grid(&[0.5, 1.0]), config)
            .unwrap()
            .generate();
        assert!(matches!(
            set.bind(&other),
            Err(EngineError::Configuration(ConfigurationError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_path_independent_trade_is_not_trainable() {
        let scenarios = equity_scenarios(10, 4);
        let market = InMemoryMarketData::new();
        let trainer = AmcTrainer::new(&scenarios, &market, RegressionConfig::default());
        let forward = Trade::new(
            "F",
            "NS1",
            TradeKind::PathIndependent(crate::trade::PathIndependentProduct::EquityForward(
                crate::trade::EquityForward {
                    underlying: RiskFactorId::equity("SPX"),
                    currency: "EUR".to_string(),
                    quantity: 1.0,
                    strike: 100.0,
                    maturity: 1.0,
                    position: Position::Long,
                },
            )),
        );
        assert!(matches!(
            trainer.train(&forward),
            Err(EngineError::Valuation(ValuationError::InvalidTrade { .. }))
        ));
    }

    #[test]
    fn test_cancelled_training_returns_no_models() {
        let scenarios = equity_scenarios(10, 5);
        let market = InMemoryMarketData::new();
        let portfolio = Portfolio::builder().add_trade(put(vec![1.0])).build().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let trainer = AmcTrainer::new(&scenarios, &market, RegressionConfig::default());
        assert_eq!(
            trainer.train_portfolio(&portfolio, Some(&token)).unwrap_err(),
            EngineError::Cancelled
        );
    }
}
