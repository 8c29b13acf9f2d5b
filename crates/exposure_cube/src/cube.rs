//! Dense NPV cube over (trade, date, sample) with a validity mask.

use std::collections::HashMap;

use chrono::NaiveDate;
use exposure_core::{ConfigurationError, DateGrid, StateError, TradeId};
use serde::Serialize;

/// Trade NPVs for every simulation date and sample, plus t0.
///
/// Cells start out invalid and become valid when written. Invalid cells read
/// as `None`, never as zero. Once [`seal`](Self::seal)ed the cube rejects all
/// writes; sealing again is a no-op.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use exposure_core::{DateGrid, DayCountConvention, StateError, TradeId};
/// use exposure_cube::NpvCube;
///
/// let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let grid = DateGrid::from_times(as_of, &[1.0, 2.0], DayCountConvention::Act365Fixed).unwrap();
/// let mut cube = NpvCube::new(vec![TradeId::new("T1")], grid, 4).unwrap();
///
/// cube.set(0, 1, 2, 42.0).unwrap();
/// assert_eq!(cube.get(0, 1, 2), Some(42.0));
/// assert_eq!(cube.get(0, 1, 3), None);
///
/// cube.seal();
/// assert_eq!(cube.set(0, 0, 0, 1.0), Err(StateError::CubeSealed));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct NpvCube {
    trade_ids: Vec<TradeId>,
    index: HashMap<TradeId, usize>,
    grid: DateGrid,
    n_samples: usize,
    t0: Vec<Option<f64>>,
    values: Vec<f64>,
    valid: Vec<bool>,
    sealed: bool,
}

impl NpvCube {
    /// Allocates an all-invalid cube.
    ///
    /// # Errors
    /// `ConfigurationError` for a zero sample count or duplicate trade ids.
    pub fn new(
        trade_ids: Vec<TradeId>,
        grid: DateGrid,
        n_samples: usize,
    ) -> Result<Self, ConfigurationError> {
        if n_samples == 0 {
            return Err(ConfigurationError::NonPositiveSampleCount { samples: 0 });
        }
        let mut index = HashMap::with_capacity(trade_ids.len());
        for (i, id) in trade_ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(ConfigurationError::Duplicate {
                    kind: "trade",
                    id: id.to_string(),
                });
            }
        }
        let cells = trade_ids.len() * grid.len() * n_samples;
        Ok(Self {
            t0: vec![None; trade_ids.len()],
            trade_ids,
            index,
            grid,
            n_samples,
            values: vec![0.0; cells],
            valid: vec![false; cells],
            sealed: false,
        })
    }

    /// Trade identifiers in cube order.
    #[inline]
    pub fn trade_ids(&self) -> &[TradeId] {
        &self.trade_ids
    }

    /// Position of a trade.
    #[inline]
    pub fn trade_index(&self, id: &TradeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Simulation date grid.
    #[inline]
    pub fn grid(&self) -> &DateGrid {
        &self.grid
    }

    /// Number of trades.
    #[inline]
    pub fn n_trades(&self) -> usize {
        self.trade_ids.len()
    }

    /// Number of simulation dates.
    #[inline]
    pub fn n_dates(&self) -> usize {
        self.grid.len()
    }

    /// Number of samples.
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// True once sealed.
    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Makes the cube read-only. Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    fn check_writable(&self) -> Result<(), StateError> {
        if self.sealed {
            Err(StateError::CubeSealed)
        } else {
            Ok(())
        }
    }

    fn check_trade(&self, trade: usize) -> Result<(), StateError> {
        if trade < self.n_trades() {
            Ok(())
        } else {
            Err(StateError::OutOfRange {
                axis: "trade",
                index: trade,
                len: self.n_trades(),
            })
        }
    }

    fn offset(&self, trade: usize, date: usize, sample: usize) -> Result<usize, StateError> {
        self.check_trade(trade)?;
        if date >= self.n_dates() {
            return Err(StateError::OutOfRange {
                axis: "date",
                index: date,
                len: self.n_dates(),
            });
        }
        if sample >= self.n_samples {
            return Err(StateError::OutOfRange {
                axis: "sample",
                index: sample,
                len: self.n_samples,
            });
        }
        Ok((trade * self.n_dates() + date) * self.n_samples + sample)
    }

    /// Writes one cell and marks it valid.
    ///
    /// # Errors
    /// `StateError::CubeSealed` after sealing, `StateError::OutOfRange` for a
    /// bad index.
    pub fn set(&mut self, trade: usize, date: usize, sample: usize, value: f64) -> Result<(), StateError> {
        self.check_writable()?;
        let i = self.offset(trade, date, sample)?;
        self.values[i] = value;
        self.valid[i] = true;
        Ok(())
    }

    /// Marks one cell invalid.
    pub fn invalidate(&mut self, trade: usize, date: usize, sample: usize) -> Result<(), StateError> {
        self.check_writable()?;
        let i = self.offset(trade, date, sample)?;
        self.values[i] = 0.0;
        self.valid[i] = false;
        Ok(())
    }

    /// Writes all samples of one (trade, date); cells with `valid[s] == false`
    /// are left invalid.
    pub fn write_date(
        &mut self,
        trade: usize,
        date: usize,
        values: &[f64],
        valid: &[bool],
    ) -> Result<(), StateError> {
        self.check_writable()?;
        let start = self.offset(trade, date, 0)?;
        let n = self.n_samples;
        if values.len() != n || valid.len() != n {
            return Err(StateError::OutOfRange {
                axis: "sample",
                index: values.len().max(valid.len()),
                len: n,
            });
        }
        for s in 0..n {
            self.values[start + s] = if valid[s] { values[s] } else { 0.0 };
            self.valid[start + s] = valid[s];
        }
        Ok(())
    }

    /// Writes the t0 NPV of a trade; `None` marks it invalid.
    pub fn set_t0(&mut self, trade: usize, value: Option<f64>) -> Result<(), StateError> {
        self.check_writable()?;
        self.check_trade(trade)?;
        self.t0[trade] = value;
        Ok(())
    }

    /// NPV of a cell, `None` if invalid or out of range.
    pub fn get(&self, trade: usize, date: usize, sample: usize) -> Option<f64> {
        let i = self.offset(trade, date, sample).ok()?;
        self.valid[i].then_some(self.values[i])
    }

    /// t0 NPV of a trade, `None` if invalid.
    pub fn t0(&self, trade: usize) -> Option<f64> {
        self.t0.get(trade).copied().flatten()
    }

    /// Raw values of one (trade, date) across samples; pair with
    /// [`validity`](Self::validity).
    pub fn values(&self, trade: usize, date: usize) -> &[f64] {
        let start = (trade * self.n_dates() + date) * self.n_samples;
        &self.values[start..start + self.n_samples]
    }

    /// Validity mask of one (trade, date) across samples.
    pub fn validity(&self, trade: usize, date: usize) -> &[bool] {
        let start = (trade * self.n_dates() + date) * self.n_samples;
        &self.valid[start..start + self.n_samples]
    }

    /// Number of invalid cells over all trades and dates.
    pub fn invalid_count(&self) -> usize {
        self.valid.iter().filter(|v| !**v).count()
    }

    /// Flat records, t0 first for each trade, for report output.
    pub fn records(&self) -> impl Iterator<Item = CubeRecord> + '_ {
        let as_of = self.grid.as_of();
        self.trade_ids.iter().enumerate().flat_map(move |(t, id)| {
            let t0 = std::iter::once(CubeRecord {
                trade_id: id.to_string(),
                date_index: None,
                date: as_of,
                sample: 0,
                value: self.t0(t),
            });
            let cells = self.grid.dates().iter().flat_map(move |d| {
                (0..self.n_samples).map(move |s| CubeRecord {
                    trade_id: id.to_string(),
                    date_index: Some(d.index),
                    date: d.date,
                    sample: s,
                    value: self.get(t, d.index, s),
                })
            });
            t0.chain(cells)
        })
    }
}

/// One cube cell in flat form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CubeRecord {
    /// Trade identifier
    pub trade_id: String,
    /// Simulation date index; `None` for the t0 value
    pub date_index: Option<usize>,
    /// Calendar date
    pub date: NaiveDate,
    /// Sample index
    pub sample: usize,
    /// NPV; `None` for invalid cells
    pub value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use exposure_core::DayCountConvention;
    use proptest::prelude::*;

    fn cube(trades: usize, samples: usize) -> NpvCube {
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let grid =
            DateGrid::from_times(as_of, &[0.5, 1.0, 1.5], DayCountConvention::Act365Fixed).unwrap();
        let ids = (0..trades).map(|i| TradeId::new(format!("T{}", i))).collect();
        NpvCube::new(ids, grid, samples).unwrap()
    }

    #[test]
    fn test_cells_start_invalid() {
        let c = cube(2, 3);
        assert_eq!(c.get(1, 2, 2), None);
        assert_eq!(c.t0(0), None);
        assert_eq!(c.invalid_count(), 2 * 3 * 3);
    }

    #[test]
    fn test_write_date_respects_mask() {
        let mut c = cube(1, 3);
        c.write_date(0, 1, &[1.0, 2.0, 3.0], &[true, false, true]).unwrap();
        assert_eq!(c.get(0, 1, 0), Some(1.0));
        assert_eq!(c.get(0, 1, 1), None);
        assert_eq!(c.values(0, 1), &[1.0, 0.0, 3.0]);
        assert!(c.write_date(0, 1, &[1.0], &[true]).is_err());
    }

    #[test]
    fn test_out_of_range() {
        let mut c = cube(1, 2);
        assert_eq!(
            c.set(0, 3, 0, 1.0),
            Err(StateError::OutOfRange {
                axis: "date",
                index: 3,
                len: 3
            })
        );
        assert_eq!(c.get(5, 0, 0), None);
    }

    #[test]
    fn test_duplicate_trade_rejected() {
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let grid = DateGrid::from_times(as_of, &[1.0], DayCountConvention::Act365Fixed).unwrap();
        let ids = vec![TradeId::new("A"), TradeId::new("A")];
        assert!(matches!(
            NpvCube::new(ids, grid, 1),
            Err(ConfigurationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_records_cover_t0_and_cells() {
        let mut c = cube(1, 2);
        c.set_t0(0, Some(5.0)).unwrap();
        c.set(0, 0, 1, 7.0).unwrap();
        let records: Vec<_> = c.records().collect();
        assert_eq!(records.len(), 1 + 3 * 2);
        assert_eq!(records[0].date_index, None);
        assert_eq!(records[0].value, Some(5.0));
        assert_eq!(records[2].value, Some(7.0));
        assert_eq!(records[1].value, None);
    }

    proptest! {
        #[test]
        fn prop_seal_is_idempotent_and_blocks_writes(
            seals in 1usize..4,
            trade in 0usize..2,
            date in 0usize..3,
            sample in 0usize..4,
            value in -1e6f64..1e6,
        ) {
            let mut c = cube(2, 4);
            c.set(trade, date, sample, value).unwrap();
            for _ in 0..seals {
                c.seal();
            }
            prop_assert!(c.is_sealed());
            prop_assert_eq!(c.set(trade, date, sample, 0.0), Err(StateError::CubeSealed));
            prop_assert_eq!(c.invalidate(trade, date, sample), Err(StateError::CubeSealed));
            prop_assert_eq!(c.set_t0(trade, Some(1.0)), Err(StateError::CubeSealed));
            prop_assert_eq!(c.get(trade, date, sample), Some(value));
        }
    }
}
