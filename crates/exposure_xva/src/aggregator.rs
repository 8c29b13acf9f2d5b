//! Netting-set aggregation with collateral.
//!
//! For every netting set the aggregator sums the constituent trade NPVs of
//! a sealed cube per (date, sample) and rolls the collateral balance forward
//! date by date:
//!
//! ```text
//!   V(t)      = sum of trade NPVs                (invalid if any trade is)
//!   V(t - m)  = V interpolated at t minus MPoR   (t0 value, aggregated dates)
//!   C(t)      = C(t-1) + settled margin call
//!   E(t)      = V(t) - C(t)
//! ```
//!
//! The lagged value only looks back at dates already aggregated, so each
//! netting set must be processed in strictly increasing date order.
//! Netting sets are independent and run in parallel.

use exposure_core::{
    ConfigurationError, CounterpartyId, DateGrid, EngineError, NettingSetId, SequenceError,
    StateError,
};
use exposure_cube::NpvCube;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::netting::{settled_margin, CollateralAgreement, CollateralCalculationType, NettingSet};

const TIME_EPS: f64 = 1e-10;

/// Aggregated values, collateral and exposure of one netting set, laid out
/// `[date][sample]`.
#[derive(Clone, Debug)]
pub struct NettingSetExposure {
    netting_set_id: NettingSetId,
    counterparty_id: CounterpartyId,
    grid: DateGrid,
    n_samples: usize,
    t0_value: Option<f64>,
    t0_collateral: f64,
    agreement: Option<CollateralAgreement>,
    values: Vec<Vec<f64>>,
    collateral: Vec<Vec<f64>>,
    exposure: Vec<Vec<f64>>,
    valid: Vec<Vec<bool>>,
}

impl NettingSetExposure {
    /// Netting set identifier.
    #[inline]
    pub fn netting_set_id(&self) -> &NettingSetId {
        &self.netting_set_id
    }

    /// Counterparty facing the netting set.
    #[inline]
    pub fn counterparty_id(&self) -> &CounterpartyId {
        &self.counterparty_id
    }

    /// Simulation dates shared with the cube.
    #[inline]
    pub fn grid(&self) -> &DateGrid {
        &self.grid
    }

    /// Number of simulation dates.
    #[inline]
    pub fn n_dates(&self) -> usize {
        self.values.len()
    }

    /// Number of Monte Carlo samples.
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Netting-set value at t0, `None` if any trade has no t0 value.
    #[inline]
    pub fn t0_value(&self) -> Option<f64> {
        self.t0_value
    }

    /// Collateral balance after the t0 margin call.
    #[inline]
    pub fn t0_collateral(&self) -> f64 {
        self.t0_collateral
    }

    /// Collateralised exposure at t0.
    pub fn t0_exposure(&self) -> Option<f64> {
        self.t0_value.map(|v| v - self.t0_collateral)
    }

    /// Uncollateralised values at a date.
    pub fn values(&self, date: usize) -> &[f64] {
        &self.values[date]
    }

    /// Collateral balances at a date.
    pub fn collateral(&self, date: usize) -> &[f64] {
        &self.collateral[date]
    }

    /// Exposure `V - C` at a date.
    pub fn exposure(&self, date: usize) -> &[f64] {
        &self.exposure[date]
    }

    /// Validity mask at a date.
    pub fn validity(&self, date: usize) -> &[bool] {
        &self.valid[date]
    }

    /// Mean COLVA accrued over each period `(t_{j-1}, t_j]`, undiscounted,
    /// with `t_{-1} = 0`. Zero without a CSA.
    ///
    /// Each valid sample accrues `-C s(C) dt` on its balance at `t_j`.
    pub fn colva_increments(&self) -> Vec<f64> {
        let Some(csa) = &self.agreement else {
            return vec![0.0; self.n_dates()];
        };
        let times = self.grid.times();
        (0..self.n_dates())
            .map(|d| {
                let accrual = times[d] - if d == 0 { 0.0 } else { times[d - 1] };
                let (sum, n) = self.collateral[d]
                    .iter()
                    .zip(&self.valid[d])
                    .filter(|(_, ok)| **ok)
                    .fold((0.0, 0usize), |(sum, n), (c, _)| {
                        (sum + csa.colva_accrual(*c, accrual), n + 1)
                    });
                if n == 0 {
                    0.0
                } else {
                    sum / n as f64
                }
            })
            .collect()
    }

    /// Exposure of one cell, `None` if invalid or out of range.
    pub fn exposure_at(&self, date: usize, sample: usize) -> Option<f64> {
        let valid = *self.valid.get(date)?.get(sample)?;
        valid.then(|| self.exposure[date][sample])
    }
}

/// Aggregates netting sets over a sealed cube.
pub struct NettingAggregator<'a> {
    cube: &'a NpvCube,
    calculation_type: CollateralCalculationType,
}

impl<'a> NettingAggregator<'a> {
    /// # Errors
    /// `StateError::CubeNotSealed` if the cube is still being built.
    pub fn new(
        cube: &'a NpvCube,
        calculation_type: CollateralCalculationType,
    ) -> Result<Self, StateError> {
        if !cube.is_sealed() {
            return Err(StateError::CubeNotSealed);
        }
        Ok(Self {
            cube,
            calculation_type,
        })
    }

    /// Starts the date-by-date aggregation of one netting set.
    ///
    /// # Errors
    /// `ConfigurationError` if the CSA is invalid or a trade is not in the
    /// cube.
    pub fn netting_set<'b>(
        &self,
        netting_set: &'b NettingSet,
    ) -> Result<NettingSetAggregation<'b>, ConfigurationError>
    where
        'a: 'b,
    {
        NettingSetAggregation::new(self.cube, netting_set, self.calculation_type)
    }

    /// Aggregates every date of every netting set, netting sets in parallel.
    pub fn aggregate_all(
        &self,
        netting_sets: &[NettingSet],
    ) -> Result<Vec<NettingSetExposure>, EngineError> {
        let exposures = netting_sets
            .par_iter()
            .map(|ns| -> Result<NettingSetExposure, EngineError> {
                let mut aggregation = self.netting_set(ns)?;
                for date in 0..self.cube.n_dates() {
                    aggregation.aggregate_date(date)?;
                }
                Ok(aggregation.finish()?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            netting_sets = exposures.len(),
            calculation_type = ?self.calculation_type,
            "Netting sets aggregated"
        );
        Ok(exposures)
    }
}

/// In-progress aggregation of one netting set.
///
/// Dates must be fed in order `0, 1, ..., n-1`; the collateral at each date
/// depends on the balance carried from the previous one.
pub struct NettingSetAggregation<'a> {
    cube: &'a NpvCube,
    netting_set: &'a NettingSet,
    calculation_type: CollateralCalculationType,
    trades: Vec<usize>,
    times: Vec<f64>,
    t0_value: Option<f64>,
    t0_collateral: f64,
    balance: Vec<f64>,
    values: Vec<Vec<f64>>,
    collateral: Vec<Vec<f64>>,
    valid: Vec<Vec<bool>>,
}

impl<'a> NettingSetAggregation<'a> {
    fn new(
        cube: &'a NpvCube,
        netting_set: &'a NettingSet,
        calculation_type: CollateralCalculationType,
    ) -> Result<Self, ConfigurationError> {
        netting_set.validate()?;
        let mut trades = netting_set
            .trade_ids()
            .iter()
            .map(|id| {
                cube.trade_index(id)
                    .ok_or_else(|| ConfigurationError::UnknownReference {
                        kind: "trade",
                        id: id.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        // Sum in cube order regardless of booking order.
        trades.sort_unstable();
        trades.dedup();

        let t0_value = trades
            .iter()
            .try_fold(0.0, |acc, &t| cube.t0(t).map(|v| acc + v));
        let t0_collateral = match (netting_set.collateral(), t0_value) {
            (Some(csa), Some(v)) => csa.t0_balance(v),
            (Some(csa), None) => csa.initial_balance,
            (None, _) => 0.0,
        };
        let n_dates = cube.n_dates();
        debug!(
            netting_set = %netting_set.id(),
            trades = trades.len(),
            collateralised = netting_set.collateral().is_some(),
            "Starting netting set aggregation"
        );
        Ok(Self {
            cube,
            netting_set,
            calculation_type,
            trades,
            times: cube.grid().times(),
            t0_value,
            t0_collateral,
            balance: vec![t0_collateral; cube.n_samples()],
            values: Vec::with_capacity(n_dates),
            collateral: Vec::with_capacity(n_dates),
            valid: Vec::with_capacity(n_dates),
        })
    }

    /// The next date index this aggregation accepts.
    #[inline]
    pub fn next_date(&self) -> usize {
        self.values.len()
    }

    /// True once every grid date has been aggregated.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.values.len() == self.cube.n_dates()
    }

    /// Aggregates the netting set at `date_index`.
    ///
    /// # Errors
    /// `SequenceError::Aggregation` unless `date_index` is the next date.
    pub fn aggregate_date(&mut self, date_index: usize) -> Result<(), SequenceError> {
        let expected = self.next_date();
        if date_index != expected || date_index >= self.cube.n_dates() {
            return Err(SequenceError::Aggregation {
                netting_set: self.netting_set.id().to_string(),
                expected,
                requested: date_index,
            });
        }
        let n = self.cube.n_samples();
        let mut values = vec![0.0; n];
        let mut valid = vec![true; n];
        for &t in &self.trades {
            let trade_values = self.cube.values(t, date_index);
            let trade_valid = self.cube.validity(t, date_index);
            for s in 0..n {
                valid[s] &= trade_valid[s];
                values[s] += trade_values[s];
            }
        }
        for s in 0..n {
            if !valid[s] {
                values[s] = 0.0;
            }
        }

        let netting_set = self.netting_set;
        let collateral = match netting_set.collateral() {
            Some(csa) => self.roll_collateral(csa, date_index, &values, &valid),
            None => vec![0.0; n],
        };
        self.values.push(values);
        self.collateral.push(collateral);
        self.valid.push(valid);
        Ok(())
    }

    /// Completes the aggregation.
    ///
    /// # Errors
    /// `StateError::IncompleteSchedule` if dates are missing.
    pub fn finish(self) -> Result<NettingSetExposure, StateError> {
        if !self.is_complete() {
            return Err(StateError::IncompleteSchedule {
                missing: self.cube.n_dates() - self.values.len(),
            });
        }
        let exposure = self
            .values
            .iter()
            .zip(&self.collateral)
            .zip(&self.valid)
            .map(|((v, c), ok)| {
                v.iter()
                    .zip(c)
                    .zip(ok)
                    .map(|((v, c), ok)| if *ok { v - c } else { 0.0 })
                    .collect()
            })
            .collect();
        Ok(NettingSetExposure {
            netting_set_id: self.netting_set.id().clone(),
            counterparty_id: self.netting_set.counterparty_id().clone(),
            grid: self.cube.grid().clone(),
            n_samples: self.cube.n_samples(),
            t0_value: self.t0_value,
            t0_collateral: self.t0_collateral,
            agreement: self.netting_set.collateral().cloned(),
            values: self.values,
            collateral: self.collateral,
            exposure,
            valid: self.valid,
        })
    }

    fn roll_collateral(
        &mut self,
        csa: &CollateralAgreement,
        date: usize,
        values: &[f64],
        valid: &[bool],
    ) -> Vec<f64> {
        let lag_time = self.times[date] - csa.mpor();
        let mut collateral = vec![0.0; values.len()];
        for s in 0..values.len() {
            let balance = self.balance[s];
            if valid[s] {
                let current_call = csa.margin_call(values[s], balance);
                let lagged_call = self
                    .value_at(lag_time, date, s, values[s])
                    .map(|v| csa.margin_call(v, balance));
                self.balance[s] += settled_margin(self.calculation_type, current_call, lagged_call);
            }
            collateral[s] = self.balance[s];
        }
        collateral
    }

    /// Netting-set value of sample `s` at `time <= times[date]`, linear between
    /// the t0 value and aggregated dates and flat before the first point.
    fn value_at(&self, time: f64, date: usize, s: usize, current: f64) -> Option<f64> {
        let value = |j: usize| -> Option<f64> {
            if j == date {
                Some(current)
            } else {
                self.valid[j][s].then(|| self.values[j][s])
            }
        };
        let times = &self.times[..=date];
        let j = times.partition_point(|&t| t < time - TIME_EPS).min(date);
        if (times[j] - time).abs() <= TIME_EPS {
            return value(j);
        }
        let (t_lo, v_lo) = if j == 0 {
            match self.t0_value {
                Some(v0) => (0.0, v0),
                None => return value(0),
            }
        } else {
            (times[j - 1], value(j - 1)?)
        };
        if time <= t_lo {
            return Some(v_lo);
        }
        let v_hi = value(j)?;
        let w = (time - t_lo) / (times[j] - t_lo);
        Some(v_lo + w * (v_hi - v_lo))
    }
}
