//! Exposure profiles.
//!
//! Reduces per-sample exposures at each simulation date to:
//!
//! - EPE(t) = mean of max(E, 0) over valid samples
//! - ENE(t) = mean of min(E, 0) over valid samples
//! - PFE(t, q) = q-quantile of max(E, 0)
//! - EE_B(t) = EPE(t), EEE_B(t) = running maximum of EE_B
//! - EPE_B, EEPE_B = time-weighted averages of EE_B, EEE_B over the first year
//!
//! Quantiles interpolate linearly between order statistics at position
//! `h = (n - 1) q` (Hyndman-Fan type 7).

use chrono::NaiveDate;
use exposure_core::{ConfigurationError, CounterpartyId, DateGrid, NettingSetId, StateError, TradeId};
use exposure_cube::NpvCube;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregator::NettingSetExposure;

/// Default PFE confidence level.
pub const DEFAULT_PFE_QUANTILE: f64 = 0.95;

/// Horizon of the Basel time averages, in years.
const BASEL_HORIZON: f64 = 1.0;

const TIME_EPS: f64 = 1e-10;

/// Post-processing settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExposureConfig {
    /// PFE confidence level in `[0, 1]`.
    #[serde(default = "default_pfe_quantile")]
    pub pfe_quantile: f64,
}

fn default_pfe_quantile() -> f64 {
    DEFAULT_PFE_QUANTILE
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            pfe_quantile: DEFAULT_PFE_QUANTILE,
        }
    }
}

impl ExposureConfig {
    /// Checks the PFE quantile lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..=1.0).contains(&self.pfe_quantile) {
            return Err(ConfigurationError::invalid(
                "pfe_quantile",
                format!("must be in [0, 1], got {}", self.pfe_quantile),
            ));
        }
        Ok(())
    }
}

/// What a profile measures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExposureSubject {
    /// A single trade, uncollateralised and unnetted.
    Trade(TradeId),
    /// A netting set after collateral.
    NettingSet {
        netting_set_id: NettingSetId,
        counterparty_id: CounterpartyId,
    },
}

impl ExposureSubject {
    /// Identifier of the trade or netting set.
    pub fn id(&self) -> &str {
        match self {
            ExposureSubject::Trade(id) => id.as_str(),
            ExposureSubject::NettingSet { netting_set_id, .. } => netting_set_id.as_str(),
        }
    }

    /// Counterparty of a netting-set profile.
    pub fn counterparty_id(&self) -> Option<&CounterpartyId> {
        match self {
            ExposureSubject::Trade(_) => None,
            ExposureSubject::NettingSet {
                counterparty_id, ..
            } => Some(counterparty_id),
        }
    }
}

/// Exposure statistics at one date.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ExposurePoint {
    /// Grid index, `None` for t0
    pub date_index: Option<usize>,
    /// Calendar date
    pub date: NaiveDate,
    /// Year fraction from the as-of date
    pub time: f64,
    /// Expected positive exposure
    pub epe: f64,
    /// Expected negative exposure, never positive
    pub ene: f64,
    /// Potential future exposure at the configured quantile
    pub pfe: f64,
    /// Basel expected exposure
    pub ee_b: f64,
    /// Basel effective expected exposure, non-decreasing in time
    pub eee_b: f64,
    /// Mean collateral balance held
    pub expected_collateral: f64,
    /// Undiscounted COLVA accrued since the previous point, zero without a CSA
    pub colva_increment: f64,
    /// Samples that entered the statistics
    pub valid_samples: usize,
}

/// Sample statistics of one date before the Basel measures are attached.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExposureStatistics {
    /// Mean of `max(E, 0)`
    pub epe: f64,
    /// Mean of `min(E, 0)`
    pub ene: f64,
    /// Quantile of `max(E, 0)`
    pub pfe: f64,
    /// Mean collateral balance
    pub expected_collateral: f64,
    /// Samples that entered the statistics
    pub valid_samples: usize,
}

/// Linear-interpolation quantile of sorted data, `None` if empty.
///
/// # Examples
///
/// ```
/// use exposure_xva::quantile;
///
/// let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(quantile(&sorted, 0.5), Some(3.0));
/// assert_eq!(quantile(&sorted, 0.9), Some(4.6));
/// assert_eq!(quantile(&[], 0.9), None);
/// ```
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let w = h - lo as f64;
    Some(sorted[lo] + w * (sorted[hi] - sorted[lo]))
}

/// Reduces one date of exposures; invalid samples are skipped.
pub fn exposure_statistics(
    exposure: &[f64],
    valid: &[bool],
    collateral: Option<&[f64]>,
    pfe_quantile: f64,
) -> ExposureStatistics {
    let mut positive = Vec::with_capacity(exposure.len());
    let mut ene = 0.0;
    let mut expected_collateral = 0.0;
    for (s, (&e, &ok)) in exposure.iter().zip(valid).enumerate() {
        if !ok {
            continue;
        }
        positive.push(e.max(0.0));
        ene += e.min(0.0);
        if let Some(c) = collateral {
            expected_collateral += c[s];
        }
    }
    let n = positive.len();
    if n == 0 {
        return ExposureStatistics::default();
    }
    let epe = positive.iter().sum::<f64>() / n as f64;
    positive.sort_by(f64::total_cmp);
    ExposureStatistics {
        epe,
        ene: ene / n as f64,
        pfe: quantile(&positive, pfe_quantile).unwrap_or(0.0),
        expected_collateral: expected_collateral / n as f64,
        valid_samples: n,
    }
}

/// Exposure profile of a trade or netting set: a t0 point plus one point per
/// simulation date.
#[derive(Clone, Debug, PartialEq)]
pub struct ExposureProfile {
    subject: ExposureSubject,
    t0: ExposurePoint,
    points: Vec<ExposurePoint>,
    epe_b: f64,
    eepe_b: f64,
}

impl ExposureProfile {
    /// Profile of one trade straight from the cube.
    ///
    /// # Errors
    /// `StateError::OutOfRange` for an unknown trade index.
    pub fn trade(
        cube: &NpvCube,
        trade: usize,
        config: &ExposureConfig,
    ) -> Result<Self, StateError> {
        if trade >= cube.n_trades() {
            return Err(StateError::OutOfRange {
                axis: "trade",
                index: trade,
                len: cube.n_trades(),
            });
        }
        let stats = (0..cube.n_dates())
            .into_par_iter()
            .map(|d| {
                exposure_statistics(
                    cube.values(trade, d),
                    cube.validity(trade, d),
                    None,
                    config.pfe_quantile,
                )
            })
            .collect();
        let subject = ExposureSubject::Trade(cube.trade_ids()[trade].clone());
        Ok(Self::from_statistics(
            subject,
            cube.grid(),
            cube.t0(trade),
            0.0,
            &[],
            stats,
        ))
    }

    /// Profiles of every trade in the cube, in cube order.
    pub fn trades(cube: &NpvCube, config: &ExposureConfig) -> Vec<Self> {
        (0..cube.n_trades())
            .into_par_iter()
            .filter_map(|t| Self::trade(cube, t, config).ok())
            .collect()
    }

    /// Profile of an aggregated netting set, after collateral.
    pub fn netting_set(exposure: &NettingSetExposure, config: &ExposureConfig) -> Self {
        let stats = (0..exposure.n_dates())
            .into_par_iter()
            .map(|d| {
                exposure_statistics(
                    exposure.exposure(d),
                    exposure.validity(d),
                    Some(exposure.collateral(d)),
                    config.pfe_quantile,
                )
            })
            .collect();
        let subject = ExposureSubject::NettingSet {
            netting_set_id: exposure.netting_set_id().clone(),
            counterparty_id: exposure.counterparty_id().clone(),
        };
        Self::from_statistics(
            subject,
            exposure.grid(),
            exposure.t0_exposure(),
            exposure.t0_collateral(),
            &exposure.colva_increments(),
            stats,
        )
    }

    fn from_statistics(
        subject: ExposureSubject,
        grid: &DateGrid,
        t0_exposure: Option<f64>,
        t0_collateral: f64,
        colva: &[f64],
        stats: Vec<ExposureStatistics>,
    ) -> Self {
        let t0_epe = t0_exposure.map_or(0.0, |e| e.max(0.0));
        let t0 = ExposurePoint {
            date_index: None,
            date: grid.as_of(),
            time: 0.0,
            epe: t0_epe,
            ene: t0_exposure.map_or(0.0, |e| e.min(0.0)),
            pfe: t0_epe,
            ee_b: t0_epe,
            eee_b: t0_epe,
            expected_collateral: t0_collateral,
            colva_increment: 0.0,
            valid_samples: usize::from(t0_exposure.is_some()),
        };

        let mut eee_b = t0.eee_b;
        let mut points = Vec::with_capacity(stats.len());
        for (i, (date, st)) in grid.dates().iter().zip(stats).enumerate() {
            if st.valid_samples == 0 {
                warn!(id = subject.id(), date_index = date.index, "No valid samples");
            }
            eee_b = eee_b.max(st.epe);
            points.push(ExposurePoint {
                date_index: Some(date.index),
                date: date.date,
                time: date.time,
                epe: st.epe,
                ene: st.ene,
                pfe: st.pfe,
                ee_b: st.epe,
                eee_b,
                expected_collateral: st.expected_collateral,
                colva_increment: colva.get(i).copied().unwrap_or(0.0),
                valid_samples: st.valid_samples,
            });
        }
        let (epe_b, eepe_b) = basel_averages(&points);
        Self {
            subject,
            t0,
            points,
            epe_b,
            eepe_b,
        }
    }

    /// Trade or netting set the profile belongs to.
    #[inline]
    pub fn subject(&self) -> &ExposureSubject {
        &self.subject
    }

    /// Trade or netting set identifier.
    #[inline]
    pub fn id(&self) -> &str {
        self.subject.id()
    }

    /// Point at the as-of date.
    #[inline]
    pub fn t0(&self) -> &ExposurePoint {
        &self.t0
    }

    /// Points at the simulation dates, in date order.
    #[inline]
    pub fn points(&self) -> &[ExposurePoint] {
        &self.points
    }

    /// Time-weighted average EE_B over the first year.
    #[inline]
    pub fn epe_b(&self) -> f64 {
        self.epe_b
    }

    /// Time-weighted average EEE_B over the first year.
    #[inline]
    pub fn eepe_b(&self) -> f64 {
        self.eepe_b
    }

    /// Times `[0, t1, ..., tn]`.
    pub fn times(&self) -> Vec<f64> {
        self.all_points().map(|p| p.time).collect()
    }

    /// EPE at `[0, t1, ..., tn]`.
    pub fn epe(&self) -> Vec<f64> {
        self.all_points().map(|p| p.epe).collect()
    }

    /// ENE at `[0, t1, ..., tn]`.
    pub fn ene(&self) -> Vec<f64> {
        self.all_points().map(|p| p.ene).collect()
    }

    /// Undiscounted COLVA increments at `[0, t1, ..., tn]`.
    pub fn colva_increments(&self) -> Vec<f64> {
        self.all_points().map(|p| p.colva_increment).collect()
    }

    /// Largest PFE over the simulation dates.
    pub fn peak_pfe(&self) -> f64 {
        self.points.iter().map(|p| p.pfe).fold(0.0, f64::max)
    }

    /// t0 followed by the simulation dates.
    pub fn all_points(&self) -> impl Iterator<Item = &ExposurePoint> + '_ {
        std::iter::once(&self.t0).chain(&self.points)
    }
}

fn basel_averages(points: &[ExposurePoint]) -> (f64, f64) {
    let mut prev = 0.0;
    let mut weight = 0.0;
    let (mut epe_b, mut eepe_b) = (0.0, 0.0);
    for p in points.iter().take_while(|p| p.time <= BASEL_HORIZON + TIME_EPS) {
        let dt = p.time - prev;
        epe_b += p.ee_b * dt;
        eepe_b += p.eee_b * dt;
        weight += dt;
        prev = p.time;
    }
    if weight > 0.0 {
        (epe_b / weight, eepe_b / weight)
    } else {
        // first date beyond the horizon
        points.first().map_or((0.0, 0.0), |p| (p.ee_b, p.eee_b))
    }
}
