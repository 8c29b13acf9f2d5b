//! Backward-sweep state machine and the frozen model hand-off.

use std::collections::BTreeMap;

use exposure_core::{ConfigurationError, EngineError, SequenceError, StateError};
use tracing::{debug, info};

use crate::model::RegressionModel;
use crate::regression::{fit_regression, RegressionConfig};

/// Phase of the date currently being processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitPhase {
    /// Waiting for path features of the next date
    Collecting,
    /// Solving the least squares problem
    Fitting,
    /// Model of the last processed date is available
    Published,
    /// All dates fitted and models handed off
    Frozen,
}

/// Fits one regression per scheduled date, strictly from the last date to
/// the first.
///
/// # Examples
///
/// ```
/// use exposure_amc::{AmcRegressionEngine, RegressionConfig};
///
/// let mut engine = AmcRegressionEngine::new(RegressionConfig::default(), vec![2, 5]).unwrap();
/// let xs: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
/// let ys: Vec<f64> = (0..20).map(|i| 2.0 * i as f64).collect();
///
/// assert!(engine.fit(2, &xs, &ys).is_err()); // date 5 must come first
/// engine.fit(5, &xs, &ys).unwrap();
/// engine.fit(2, &xs, &ys).unwrap();
///
/// let models = engine.freeze().unwrap();
/// assert!((models.get(5).unwrap().predict(&[3.0]) - 6.0).abs() < 1e-8);
/// ```
#[derive(Debug)]
pub struct AmcRegressionEngine {
    config: RegressionConfig,
    schedule: Vec<usize>,
    models: BTreeMap<usize, RegressionModel>,
    phase: FitPhase,
}

impl AmcRegressionEngine {
    /// Creates an engine for the given date schedule.
    ///
    /// # Errors
    /// `ConfigurationError` if the configuration is invalid or the schedule
    /// is not strictly increasing.
    pub fn new(config: RegressionConfig, schedule: Vec<usize>) -> Result<Self, ConfigurationError> {
        config.validate()?;
        if let Some(i) = (1..schedule.len()).find(|&i| schedule[i] <= schedule[i - 1]) {
            return Err(ConfigurationError::NonIncreasingDates { index: i });
        }
        Ok(Self {
            config,
            schedule,
            models: BTreeMap::new(),
            phase: FitPhase::Collecting,
        })
    }

    /// Regression settings.
    #[inline]
    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Scheduled date indices, ascending.
    #[inline]
    pub fn schedule(&self) -> &[usize] {
        &self.schedule
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> FitPhase {
        self.phase
    }

    /// Next date the engine accepts, or `None` once every date is fitted.
    pub fn next_date(&self) -> Option<usize> {
        let remaining = self.schedule.len() - self.models.len();
        remaining.checked_sub(1).map(|i| self.schedule[i])
    }

    /// Model published for `date_index`, if already fitted.
    pub fn model(&self, date_index: usize) -> Option<&RegressionModel> {
        self.models.get(&date_index)
    }

    /// Fits and publishes the model of `date_index`.
    ///
    /// `realised_values` are the continuation values realised by the forward
    /// simulation under the policy of the models already fitted at later dates.
    ///
    /// # Errors
    /// - `StateError::ModelsFrozen` after [`freeze`](Self::freeze)
    /// - `SequenceError` if the date is not scheduled or out of order
    /// - `ConfigurationError` on mismatched inputs
    pub fn fit(
        &mut self,
        date_index: usize,
        features: &[Vec<f64>],
        realised_values: &[f64],
    ) -> Result<&RegressionModel, EngineError> {
        if self.phase == FitPhase::Frozen {
            return Err(StateError::ModelsFrozen.into());
        }
        if !self.schedule.contains(&date_index) {
            return Err(SequenceError::Unscheduled {
                requested: date_index,
            }
            .into());
        }
        match self.next_date() {
            Some(expected) if expected == date_index => {}
            Some(expected) => {
                return Err(SequenceError::Regression {
                    expected,
                    requested: date_index,
                }
                .into())
            }
            None => {
                return Err(SequenceError::Regression {
                    expected: self.schedule.first().copied().unwrap_or(0),
                    requested: date_index,
                }
                .into())
            }
        }

        self.phase = FitPhase::Fitting;
        debug!(date_index, samples = features.len(), "Fitting continuation regression");
        let model = match fit_regression(&self.config, date_index, features, realised_values) {
            Ok(model) => model,
            Err(e) => {
                self.phase = FitPhase::Collecting;
                return Err(e.into());
            }
        };
        self.phase = FitPhase::Published;
        Ok(self.models.entry(date_index).or_insert(model))
    }

    /// Freezes the fitted models for the forward valuation pass.
    ///
    /// # Errors
    /// `StateError::IncompleteSchedule` if a scheduled date has no model, and
    /// `StateError::ModelsFrozen` if already frozen.
    pub fn freeze(&mut self) -> Result<FrozenRegressionModels, StateError> {
        if self.phase == FitPhase::Frozen {
            return Err(StateError::ModelsFrozen);
        }
        let missing = self.schedule.len() - self.models.len();
        if missing > 0 {
            return Err(StateError::IncompleteSchedule { missing });
        }
        self.phase = FitPhase::Frozen;
        let regularised = self
            .models
            .values()
            .filter(|m| m.diagnostics().regularised())
            .count();
        info!(
            dates = self.models.len(),
            regularised, "Regression models frozen"
        );
        Ok(FrozenRegressionModels {
            models: std::mem::take(&mut self.models),
        })
    }
}

/// Immutable set of fitted models, shared read-only by the forward pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrozenRegressionModels {
    models: BTreeMap<usize, RegressionModel>,
}

impl FrozenRegressionModels {
    /// Model at `date_index`.
    #[inline]
    pub fn get(&self, date_index: usize) -> Option<&RegressionModel> {
        self.models.get(&date_index)
    }

    /// Fitted date indices, ascending.
    pub fn dates(&self) -> impl Iterator<Item = usize> + '_ {
        self.models.keys().copied()
    }

    /// Models in date order.
    pub fn iter(&self) -> impl Iterator<Item = &RegressionModel> {
        self.models.values()
    }

    /// Number of models.
    #[inline]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// True if no date was scheduled.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let xs: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64 * 0.1]).collect();
        let ys = xs.iter().map(|x| x[0] * x[0]).collect();
        (xs, ys)
    }

    #[test]
    fn test_reverse_order_enforced() {
        let (xs, ys) = data();
        let mut engine = AmcRegressionEngine::new(RegressionConfig::default(), vec![1, 3, 6]).unwrap();
        assert_eq!(engine.next_date(), Some(6));
        assert_eq!(engine.phase(), FitPhase::Collecting);

        let err = engine.fit(3, &xs, &ys).unwrap_err();
        assert_eq!(
            err,
            EngineError::Sequence(SequenceError::Regression {
                expected: 6,
                requested: 3
            })
        );

        engine.fit(6, &xs, &ys).unwrap();
        assert_eq!(engine.phase(), FitPhase::Published);
        let err = engine.fit(6, &xs, &ys).unwrap_err();
        assert!(matches!(err, EngineError::Sequence(SequenceError::Regression { .. })));

        engine.fit(3, &xs, &ys).unwrap();
        engine.fit(1, &xs, &ys).unwrap();
        assert_eq!(engine.next_date(), None);
    }

    #[test]
    fn test_unscheduled_date() {
        let (xs, ys) = data();
        let mut engine = AmcRegressionEngine::new(RegressionConfig::default(), vec![2]).unwrap();
        assert_eq!(
            engine.fit(4, &xs, &ys).unwrap_err(),
            EngineError::Sequence(SequenceError::Unscheduled { requested: 4 })
        );
    }

    #[test]
    fn test_freeze_requires_complete_schedule() {
        let (xs, ys) = data();
        let mut engine = AmcRegressionEngine::new(RegressionConfig::default(), vec![0, 1]).unwrap();
        engine.fit(1, &xs, &ys).unwrap();
        assert_eq!(
            engine.freeze().unwrap_err(),
            StateError::IncompleteSchedule { missing: 1 }
        );
        engine.fit(0, &xs, &ys).unwrap();
        let frozen = engine.freeze().unwrap();
        assert_eq!(frozen.len(), 2);
        assert_eq!(frozen.dates().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_fit_after_freeze_fails() {
        let (xs, ys) = data();
        let mut engine = AmcRegressionEngine::new(RegressionConfig::default(), vec![0]).unwrap();
        engine.fit(0, &xs, &ys).unwrap();
        engine.freeze().unwrap();
        assert_eq!(engine.phase(), FitPhase::Frozen);
        assert_eq!(
            engine.fit(0, &xs, &ys).unwrap_err(),
            EngineError::State(StateError::ModelsFrozen)
        );
        assert_eq!(engine.freeze().unwrap_err(), StateError::ModelsFrozen);
    }

    #[test]
    fn test_mismatched_inputs_do_not_publish() {
        let (xs, _) = data();
        let mut engine = AmcRegressionEngine::new(RegressionConfig::default(), vec![0]).unwrap();
        assert!(matches!(
            engine.fit(0, &xs, &[1.0]).unwrap_err(),
            EngineError::Configuration(_)
        ));
        assert_eq!(engine.next_date(), Some(0));
        assert!(engine.model(0).is_none());
    }

    #[test]
    fn test_invalid_schedule() {
        assert!(AmcRegressionEngine::new(RegressionConfig::default(), vec![3, 3]).is_err());
    }

    #[test]
    fn test_empty_schedule_freezes() {
        let mut engine = AmcRegressionEngine::new(RegressionConfig::default(), vec![]).unwrap();
        assert!(engine.freeze().unwrap().is_empty());
    }
}
