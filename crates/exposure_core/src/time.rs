//! Simulation date grid and day count conventions.
//!
//! This module provides:
//! - `DayCountConvention`: ACT/365F, ACT/360 and 30/360 year fractions
//! - `Period`: tenor strings such as `"3M"`, `"1Y"`, `"2W"`, `"10D"`
//! - `SimulationDate`: one (index, date, time) point of the grid
//! - `DateGrid`: the ordered, validated set of simulation dates of a run
//!
//! # Examples
//!
//! ```
//! use chrono::NaiveDate;
//! use exposure_core::time::{DateGrid, DayCountConvention};
//!
//! let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let grid = DateGrid::parse(as_of, "6M,1Y,2Y", DayCountConvention::Act365Fixed).unwrap();
//! assert_eq!(grid.len(), 3);
//! assert_eq!(grid.dates()[1].date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
//! ```

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Day count convention used to map calendar dates to year fractions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayCountConvention {
    /// Actual/365 Fixed
    #[default]
    #[serde(rename = "ACT/365", alias = "A365")]
    Act365Fixed,
    /// Actual/360
    #[serde(rename = "ACT/360", alias = "A360")]
    Act360,
    /// 30/360 (bond basis)
    #[serde(rename = "30/360")]
    Thirty360,
}

impl DayCountConvention {
    /// Year fraction between two dates; negative if `end` precedes `start`.
    pub fn year_fraction(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        match self {
            DayCountConvention::Act365Fixed => (end - start).num_days() as f64 / 365.0,
            DayCountConvention::Act360 => (end - start).num_days() as f64 / 360.0,
            DayCountConvention::Thirty360 => {
                let d1 = start.day().min(30) as i64;
                let d2 = if d1 == 30 {
                    end.day().min(30) as i64
                } else {
                    end.day() as i64
                };
                let days = 360 * (end.year() - start.year()) as i64
                    + 30 * (end.month() as i64 - start.month() as i64)
                    + (d2 - d1);
                days as f64 / 360.0
            }
        }
    }

    /// Standard market name.
    pub fn name(&self) -> &'static str {
        match self {
            DayCountConvention::Act365Fixed => "ACT/365",
            DayCountConvention::Act360 => "ACT/360",
            DayCountConvention::Thirty360 => "30/360",
        }
    }
}

impl fmt::Display for DayCountConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DayCountConvention {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACT/365" | "A365" | "ACT/365F" => Ok(DayCountConvention::Act365Fixed),
            "ACT/360" | "A360" => Ok(DayCountConvention::Act360),
            "30/360" => Ok(DayCountConvention::Thirty360),
            other => Err(ConfigurationError::invalid(
                "day_count",
                format!("unknown convention '{}'", other),
            )),
        }
    }
}

/// Unit of a [`Period`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TenorUnit {
    /// Calendar days
    Days,
    /// Weeks of seven days
    Weeks,
    /// Calendar months
    Months,
    /// Calendar years
    Years,
}

/// A tenor such as `3M`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Period {
    length: u32,
    unit: TenorUnit,
}

impl Period {
    /// Creates a period; a zero length is rejected.
    pub fn new(length: u32, unit: TenorUnit) -> Result<Self, ConfigurationError> {
        if length == 0 {
            return Err(ConfigurationError::InvalidTenor(format!("0{:?}", unit)));
        }
        Ok(Self { length, unit })
    }

    /// Tenor length in units.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Tenor unit.
    #[inline]
    pub fn unit(&self) -> TenorUnit {
        self.unit
    }

    /// The period repeated `n` times, e.g. `3M * 4 = 12M`.
    pub fn times(&self, n: u32) -> Period {
        Period {
            length: self.length.saturating_mul(n),
            unit: self.unit,
        }
    }

    /// Advances `date` by this period; `None` on calendar overflow.
    pub fn advance(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self.unit {
            TenorUnit::Days => date.checked_add_days(Days::new(self.length as u64)),
            TenorUnit::Weeks => date.checked_add_days(Days::new(7 * self.length as u64)),
            TenorUnit::Months => date.checked_add_months(Months::new(self.length)),
            TenorUnit::Years => date.checked_add_months(Months::new(12 * self.length)),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TenorUnit::Days => 'D',
            TenorUnit::Weeks => 'W',
            TenorUnit::Months => 'M',
            TenorUnit::Years => 'Y',
        };
        write!(f, "{}{}", self.length, unit)
    }
}

impl FromStr for Period {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ConfigurationError::InvalidTenor(trimmed.to_string());

        let unit_char = trimmed.chars().last().ok_or_else(invalid)?;
        let unit = match unit_char.to_ascii_uppercase() {
            'D' => TenorUnit::Days,
            'W' => TenorUnit::Weeks,
            'M' => TenorUnit::Months,
            'Y' => TenorUnit::Years,
            _ => return Err(invalid()),
        };
        let length: u32 = trimmed[..trimmed.len() - unit_char.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;
        Period::new(length, unit).map_err(|_| invalid())
    }
}

/// One point of the simulation date grid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationDate {
    /// Position in the grid, starting at 0 for the first future date
    pub index: usize,
    /// Calendar date
    pub date: NaiveDate,
    /// Year fraction from the as-of date
    pub time: f64,
}

/// Ordered, distinct simulation dates strictly after the as-of date.
///
/// The grid is validated on construction and immutable afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct DateGrid {
    as_of: NaiveDate,
    day_count: DayCountConvention,
    dates: Vec<SimulationDate>,
}

impl DateGrid {
    /// Builds a grid from calendar dates.
    ///
    /// # Errors
    /// - `EmptyDateGrid` if `dates` is empty
    /// - `NotAfterAsOf` if a date is on or before `as_of`
    /// - `NonIncreasingDates` if dates are not strictly increasing
    pub fn from_dates(
        as_of: NaiveDate,
        dates: &[NaiveDate],
        day_count: DayCountConvention,
    ) -> Result<Self, ConfigurationError> {
        if dates.is_empty() {
            return Err(ConfigurationError::EmptyDateGrid);
        }
        let mut grid = Vec::with_capacity(dates.len());
        for (index, &date) in dates.iter().enumerate() {
            if date <= as_of {
                return Err(ConfigurationError::NotAfterAsOf { index });
            }
            if index > 0 && date <= dates[index - 1] {
                return Err(ConfigurationError::NonIncreasingDates { index });
            }
            grid.push(SimulationDate {
                index,
                date,
                time: day_count.year_fraction(as_of, date),
            });
        }
        Ok(Self {
            as_of,
            day_count,
            dates: grid,
        })
    }

    /// Builds a grid by advancing `as_of` by each tenor.
    pub fn from_tenors(
        as_of: NaiveDate,
        tenors: &[Period],
        day_count: DayCountConvention,
    ) -> Result<Self, ConfigurationError> {
        let dates = tenors
            .iter()
            .map(|p| {
                p.advance(as_of)
                    .ok_or_else(|| ConfigurationError::InvalidTenor(p.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_dates(as_of, &dates, day_count)
    }

    /// Builds a grid from year fractions.
    ///
    /// Calendar dates are derived as `as_of + round(365 t)` days and are
    /// informational only; the supplied times are kept exactly.
    pub fn from_times(
        as_of: NaiveDate,
        times: &[f64],
        day_count: DayCountConvention,
    ) -> Result<Self, ConfigurationError> {
        if times.is_empty() {
            return Err(ConfigurationError::EmptyDateGrid);
        }
        let mut grid = Vec::with_capacity(times.len());
        for (index, &time) in times.iter().enumerate() {
            if !time.is_finite() || time <= 0.0 {
                return Err(ConfigurationError::NotAfterAsOf { index });
            }
            if index > 0 && time <= times[index - 1] {
                return Err(ConfigurationError::NonIncreasingDates { index });
            }
            let date = as_of
                .checked_add_days(Days::new((time * 365.0).round() as u64))
                .ok_or(ConfigurationError::NotAfterAsOf { index })?;
            grid.push(SimulationDate { index, date, time });
        }
        Ok(Self {
            as_of,
            day_count,
            dates: grid,
        })
    }

    /// Parses a grid specification.
    ///
    /// Two forms are accepted:
    /// - a comma separated tenor list, `"3M,6M,1Y,2Y"`
    /// - a count and tenor, `"40,3M"`, meaning 40 dates spaced 3M apart
    pub fn parse(
        as_of: NaiveDate,
        spec: &str,
        day_count: DayCountConvention,
    ) -> Result<Self, ConfigurationError> {
        let parts: Vec<&str> = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.len() == 2 {
            if let Ok(count) = parts[0].parse::<u32>() {
                let step: Period = parts[1].parse()?;
                let tenors: Vec<Period> = (1..=count).map(|k| step.times(k)).collect();
                return Self::from_tenors(as_of, &tenors, day_count);
            }
        }

        let tenors = parts
            .iter()
            .map(|p| p.parse::<Period>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_tenors(as_of, &tenors, day_count)
    }

    /// Valuation (as-of) date; not part of the grid.
    #[inline]
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Day count used to compute grid times.
    #[inline]
    pub fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    /// Number of simulation dates.
    #[inline]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Always false for a validated grid.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// All simulation dates in increasing order.
    #[inline]
    pub fn dates(&self) -> &[SimulationDate] {
        &self.dates
    }

    /// Simulation date at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&SimulationDate> {
        self.dates.get(index)
    }

    /// Year fractions of all dates.
    pub fn times(&self) -> Vec<f64> {
        self.dates.iter().map(|d| d.time).collect()
    }

    /// Year fraction from the as-of date to an arbitrary date.
    pub fn time_of(&self, date: NaiveDate) -> f64 {
        self.day_count.year_fraction(self.as_of, date)
    }

    /// Index of the first grid date at or after `time`, if any.
    pub fn index_on_or_after(&self, time: f64) -> Option<usize> {
        const EPS: f64 = 1e-10;
        self.dates.iter().position(|d| d.time >= time - EPS)
    }
}
