//! Allocation of netting-set exposure to the trades netted in it.
//!
//! Each method splits the netted EPE and ENE of a netting set into one
//! profile per trade so that, date by date, the trade profiles add up to the
//! netted one:
//!
//! - `Marginal`: per sample. Without collateral a trade takes its own value.
//!   Otherwise it takes `E V_i / V`, or `E / n` when `|V|` is within the
//!   marginal limit. The share counts towards EPE when `E > 0` and towards
//!   ENE otherwise.
//! - `RelativeFairValueGross`: weight `V0_i / V0`.
//! - `RelativeFairValueNet`: EPE weight from the positive t0 values, ENE
//!   weight from the negative ones.
//! - `RelativeXva`: EPE weight from stand-alone trade CVA, ENE weight from
//!   stand-alone trade DVA.
//! - `None`: zero profiles.
//!
//! Allocated CVA and DVA are integrated from the allocated profiles without
//! flooring, so they sum to the netting-set charges.

use std::collections::HashMap;

use chrono::NaiveDate;
use exposure_core::{ConfigurationError, CounterpartyId, NettingSetId, TradeId};
use exposure_cube::NpvCube;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregator::NettingSetExposure;
use crate::exposure::{ExposureConfig, ExposureProfile};
use crate::netting::NettingSet;
use crate::xva::XvaCalculator;

/// Default `|V|` below which marginal allocation splits the exposure evenly.
pub const DEFAULT_MARGINAL_LIMIT: f64 = 1.0;

/// How netting-set exposure is split between trades.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    /// No allocation; trade profiles are zero.
    #[default]
    None,
    /// Pathwise marginal contributions.
    Marginal,
    /// Proportional to signed t0 values.
    RelativeFairValueGross,
    /// Proportional to positive (EPE) and negative (ENE) t0 values.
    RelativeFairValueNet,
    /// Proportional to stand-alone CVA (EPE) and DVA (ENE).
    RelativeXva,
}

/// Allocation settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllocationConfig {
    /// Allocation rule
    #[serde(default)]
    pub method: AllocationMethod,
    /// Netting-set values with `|V|` at or below this are split evenly
    /// under `Marginal`.
    #[serde(default = "default_marginal_limit")]
    pub marginal_limit: f64,
}

fn default_marginal_limit() -> f64 {
    DEFAULT_MARGINAL_LIMIT
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            method: AllocationMethod::None,
            marginal_limit: DEFAULT_MARGINAL_LIMIT,
        }
    }
}

impl AllocationConfig {
    /// Checks the marginal limit is positive and finite.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.marginal_limit.is_finite() && self.marginal_limit > 0.0) {
            return Err(ConfigurationError::invalid(
                "marginal_limit",
                format!("must be positive, got {}", self.marginal_limit),
            ));
        }
        Ok(())
    }
}

/// Allocated exposure of one trade at one point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AllocatedPoint {
    /// Grid index, `None` for t0
    pub date_index: Option<usize>,
    /// Calendar date
    pub date: NaiveDate,
    /// Year fraction from the as-of date
    pub time: f64,
    /// Share of the netted EPE
    pub epe: f64,
    /// Share of the netted ENE
    pub ene: f64,
}

/// Allocated profile and credit charges of one trade.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeAllocation {
    /// Allocated trade
    pub trade_id: TradeId,
    /// Netting set the exposure comes from
    pub netting_set_id: NettingSetId,
    /// Counterparty of the netting set
    pub counterparty_id: CounterpartyId,
    /// t0 followed by the simulation dates
    pub points: Vec<AllocatedPoint>,
    /// CVA of the allocated EPE, may be negative
    pub cva: f64,
    /// DVA of the allocated ENE, may be negative
    pub dva: f64,
}

impl TradeAllocation {
    /// Times `[0, t1, ..., tn]`.
    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.time).collect()
    }

    /// Allocated EPE at `[0, t1, ..., tn]`.
    pub fn epe(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.epe).collect()
    }

    /// Allocated ENE at `[0, t1, ..., tn]`.
    pub fn ene(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.ene).collect()
    }
}

/// Splits netting-set exposure between trades.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use exposure_core::curves::FlatCurve;
/// use exposure_core::{DateGrid, DayCountConvention, TradeId};
/// use exposure_cube::NpvCube;
/// use exposure_xva::{
///     AllocationConfig, AllocationMethod, CollateralCalculationType, Counterparty, CreditParams,
///     ExposureAllocator, ExposureConfig, ExposureProfile, NettingAggregator, NettingSet,
///     XvaCalculator, XvaConfig,
/// };
///
/// let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let grid = DateGrid::from_times(as_of, &[1.0], DayCountConvention::Act365Fixed).unwrap();
/// let mut cube = NpvCube::new(vec![TradeId::new("A"), TradeId::new("B")], grid, 1).unwrap();
/// cube.set_t0(0, Some(3.0)).unwrap();
/// cube.set_t0(1, Some(1.0)).unwrap();
/// cube.set(0, 0, 0, 30.0).unwrap();
/// cube.set(1, 0, 0, 10.0).unwrap();
/// cube.seal();
///
/// let sets = vec![NettingSet::new("NS", "CP").with_trade("A").with_trade("B")];
/// let exposures = NettingAggregator::new(&cube, CollateralCalculationType::NoLag)
///     .unwrap()
///     .aggregate_all(&sets)
///     .unwrap();
/// let profile = ExposureProfile::netting_set(&exposures[0], &ExposureConfig::default());
/// let calculator = XvaCalculator::new(XvaConfig::new(FlatCurve::new(0.0)))
///     .with_counterparty(Counterparty::new("CP", CreditParams::flat(0.02, 0.6).unwrap()))
///     .unwrap();
///
/// let config = AllocationConfig {
///     method: AllocationMethod::RelativeFairValueGross,
///     ..AllocationConfig::default()
/// };
/// let allocator = ExposureAllocator::new(&cube, &calculator, config).unwrap();
/// let trades = allocator.allocate(&sets[0], &exposures[0], &profile).unwrap();
/// assert_eq!(trades[0].points[1].epe, 30.0);
/// assert_eq!(trades[1].points[1].epe, 10.0);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ExposureAllocator<'a> {
    cube: &'a NpvCube,
    calculator: &'a XvaCalculator,
    config: AllocationConfig,
}

impl<'a> ExposureAllocator<'a> {
    /// # Errors
    /// `ConfigurationError` for an invalid marginal limit.
    pub fn new(
        cube: &'a NpvCube,
        calculator: &'a XvaCalculator,
        config: AllocationConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            cube,
            calculator,
            config,
        })
    }

    /// Allocation settings.
    #[inline]
    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    /// Allocates one netting set to its trades, in netting-set trade order.
    ///
    /// `exposure` and `profile` must come from `netting_set`.
    ///
    /// # Errors
    /// - `InvalidParameter` if the three inputs name different netting sets
    /// - `UnknownReference` for a trade missing from the cube or an unknown
    ///   counterparty
    pub fn allocate(
        &self,
        netting_set: &NettingSet,
        exposure: &NettingSetExposure,
        profile: &ExposureProfile,
    ) -> Result<Vec<TradeAllocation>, ConfigurationError> {
        let id = netting_set.id();
        if exposure.netting_set_id() != id || profile.id() != id.as_str() {
            return Err(ConfigurationError::invalid(
                format!("netting set {}", id),
                format!(
                    "exposure of {} and profile of {} do not match",
                    exposure.netting_set_id(),
                    profile.id()
                ),
            ));
        }
        let trades = netting_set
            .trade_ids()
            .iter()
            .map(|t| {
                self.cube
                    .trade_index(t)
                    .ok_or_else(|| ConfigurationError::UnknownReference {
                        kind: "trade",
                        id: t.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n_points = exposure.n_dates() + 1;
        let shares = match self.config.method {
            AllocationMethod::None => {
                vec![(vec![0.0; n_points], vec![0.0; n_points]); trades.len()]
            }
            AllocationMethod::Marginal => self.marginal(&trades, exposure),
            method => {
                let (epe_weights, ene_weights) = self.weights(method, netting_set, &trades)?;
                let (epe, ene) = (profile.epe(), profile.ene());
                epe_weights
                    .iter()
                    .zip(&ene_weights)
                    .map(|(wp, wn)| {
                        (
                            epe.iter().map(|e| wp * e).collect(),
                            ene.iter().map(|e| wn * e).collect(),
                        )
                    })
                    .collect()
            }
        };

        let times = profile.times();
        let allocations = trades
            .iter()
            .zip(shares)
            .map(|(&t, (epe, ene))| {
                let (cva, dva) = self.calculator.trade_credit_charges(
                    netting_set.counterparty_id(),
                    &times,
                    &epe,
                    &ene,
                )?;
                let points = profile
                    .all_points()
                    .zip(epe.iter().zip(&ene))
                    .map(|(p, (&epe, &ene))| AllocatedPoint {
                        date_index: p.date_index,
                        date: p.date,
                        time: p.time,
                        epe,
                        ene,
                    })
                    .collect();
                Ok(TradeAllocation {
                    trade_id: self.cube.trade_ids()[t].clone(),
                    netting_set_id: id.clone(),
                    counterparty_id: netting_set.counterparty_id().clone(),
                    points,
                    cva,
                    dva,
                })
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;
        debug!(
            netting_set = %id,
            trades = allocations.len(),
            method = ?self.config.method,
            "Netting set allocated"
        );
        Ok(allocations)
    }

    /// Allocates every netting set in parallel, matching exposures and
    /// profiles to netting sets by id. Output follows `exposures`.
    ///
    /// # Errors
    /// `UnknownReference` if an exposure has no netting set or profile, plus
    /// the errors of [`allocate`](Self::allocate).
    pub fn allocate_all(
        &self,
        netting_sets: &[NettingSet],
        exposures: &[NettingSetExposure],
        profiles: &[ExposureProfile],
    ) -> Result<Vec<TradeAllocation>, ConfigurationError> {
        let sets: HashMap<&str, &NettingSet> =
            netting_sets.iter().map(|ns| (ns.id().as_str(), ns)).collect();
        let by_id: HashMap<&str, &ExposureProfile> =
            profiles.iter().map(|p| (p.id(), p)).collect();
        let unknown = |id: &NettingSetId| ConfigurationError::UnknownReference {
            kind: "netting set",
            id: id.to_string(),
        };
        let allocations = exposures
            .par_iter()
            .map(|e| {
                let id = e.netting_set_id();
                let ns = sets.get(id.as_str()).ok_or_else(|| unknown(id))?;
                let profile = by_id.get(id.as_str()).ok_or_else(|| unknown(id))?;
                self.allocate(ns, e, profile)
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        info!(
            netting_sets = exposures.len(),
            trades = allocations.len(),
            method = ?self.config.method,
            "Exposure allocated"
        );
        Ok(allocations)
    }

    /// Pathwise marginal shares, averaged over valid samples.
    fn marginal(&self, trades: &[usize], exposure: &NettingSetExposure) -> Vec<(Vec<f64>, Vec<f64>)> {
        let n_trades = trades.len();
        let limit = self.config.marginal_limit;
        let n_points = exposure.n_dates() + 1;
        let mut shares = vec![(vec![0.0; n_points], vec![0.0; n_points]); n_trades];

        if let (Some(v), Some(e)) = (exposure.t0_value(), exposure.t0_exposure()) {
            let balance = exposure.t0_collateral();
            for (i, &t) in trades.iter().enumerate() {
                let share = marginal_share(
                    self.cube.t0(t).unwrap_or(0.0),
                    v,
                    balance,
                    e,
                    n_trades,
                    limit,
                );
                let (epe, ene) = &mut shares[i];
                if e > 0.0 {
                    epe[0] = share;
                } else {
                    ene[0] = share;
                }
            }
        }

        for d in 0..exposure.n_dates() {
            let values = exposure.values(d);
            let collateral = exposure.collateral(d);
            let exposures = exposure.exposure(d);
            let valid = exposure.validity(d);
            let n_valid = valid.iter().filter(|ok| **ok).count();
            if n_valid == 0 {
                continue;
            }
            for (i, &t) in trades.iter().enumerate() {
                let trade_values = self.cube.values(t, d);
                let (mut positive, mut negative) = (0.0, 0.0);
                for s in (0..valid.len()).filter(|&s| valid[s]) {
                    let share = marginal_share(
                        trade_values[s],
                        values[s],
                        collateral[s],
                        exposures[s],
                        n_trades,
                        limit,
                    );
                    if exposures[s] > 0.0 {
                        positive += share;
                    } else {
                        negative += share;
                    }
                }
                let (epe, ene) = &mut shares[i];
                epe[d + 1] = positive / n_valid as f64;
                ene[d + 1] = negative / n_valid as f64;
            }
        }
        shares
    }

    /// EPE and ENE weights of the relative methods.
    fn weights(
        &self,
        method: AllocationMethod,
        netting_set: &NettingSet,
        trades: &[usize],
    ) -> Result<(Vec<f64>, Vec<f64>), ConfigurationError> {
        let t0: Vec<f64> = trades
            .iter()
            .map(|&t| self.cube.t0(t).unwrap_or(0.0))
            .collect();
        let id = netting_set.id().as_str();
        let weights = match method {
            AllocationMethod::RelativeFairValueGross => {
                let w = normalise(t0, id, "t0 value");
                (w.clone(), w)
            }
            AllocationMethod::RelativeFairValueNet => (
                normalise(t0.iter().map(|v| v.max(0.0)).collect(), id, "positive t0 value"),
                normalise(t0.iter().map(|v| (-v).max(0.0)).collect(), id, "negative t0 value"),
            ),
            AllocationMethod::RelativeXva => {
                let config = ExposureConfig::default();
                let mut cva = Vec::with_capacity(trades.len());
                let mut dva = Vec::with_capacity(trades.len());
                for &t in trades {
                    let profile = ExposureProfile::trade(self.cube, t, &config).map_err(|e| {
                        ConfigurationError::invalid(format!("netting set {}", id), e.to_string())
                    })?;
                    let (c, d) = self.calculator.trade_credit_charges(
                        netting_set.counterparty_id(),
                        &profile.times(),
                        &profile.epe(),
                        &profile.ene(),
                    )?;
                    cva.push(c);
                    dva.push(d);
                }
                (
                    normalise(cva, id, "stand-alone CVA"),
                    normalise(dva, id, "stand-alone DVA"),
                )
            }
            AllocationMethod::None | AllocationMethod::Marginal => {
                (vec![0.0; trades.len()], vec![0.0; trades.len()])
            }
        };
        Ok(weights)
    }
}

/// Share of one trade in one sample of netting-set exposure `exposure`.
fn marginal_share(
    trade_value: f64,
    value: f64,
    balance: f64,
    exposure: f64,
    n_trades: usize,
    limit: f64,
) -> f64 {
    if balance == 0.0 {
        trade_value
    } else if value.abs() <= limit {
        exposure / n_trades as f64
    } else {
        exposure * trade_value / value
    }
}

/// Scales `raw` to sum to one; an even split when the total is zero.
fn normalise(raw: Vec<f64>, netting_set: &str, basis: &str) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    if total == 0.0 || !total.is_finite() {
        if !raw.is_empty() {
            warn!(netting_set, basis, "Zero allocation basis, splitting evenly");
        }
        let n = raw.len().max(1) as f64;
        return vec![1.0 / n; raw.len()];
    }
    raw.into_iter().map(|w| w / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::NettingAggregator;
    use crate::netting::{CollateralAgreement, CollateralCalculationType};
    use crate::xva::{Counterparty, CreditParams, XvaConfig};
    use approx::assert_relative_eq;
    use exposure_core::curves::FlatCurve;
    use exposure_core::{DateGrid, DayCountConvention};

    fn cube(t0: &[f64], paths: &[Vec<Vec<f64>>]) -> NpvCube {
        let grid = DateGrid::from_times(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &[0.5, 1.0],
            DayCountConvention::Act365Fixed,
        )
        .unwrap();
        let ids = (0..t0.len()).map(|t| TradeId::new(format!("T{}", t))).collect();
        let n_samples = paths[0][0].len();
        let mut cube = NpvCube::new(ids, grid, n_samples).unwrap();
        for (t, dates) in paths.iter().enumerate() {
            cube.set_t0(t, Some(t0[t])).unwrap();
            for (d, samples) in dates.iter().enumerate() {
                for (s, v) in samples.iter().enumerate() {
                    cube.set(t, d, s, *v).unwrap();
                }
            }
        }
        cube.seal();
        cube
    }

    /// Three trades, four samples, values of both signs.
    fn mixed_cube() -> NpvCube {
        cube(
            &[4.0, -1.0, 2.0],
            &[
                vec![vec![10.0, -5.0, 3.0, 0.2], vec![12.0, -8.0, 1.0, 4.0]],
                vec![vec![-4.0, 6.0, -3.0, 0.1], vec![-2.0, 1.0, -6.0, -4.0]],
                vec![vec![1.0, -2.0, 5.0, -0.5], vec![3.0, 2.0, -1.0, 0.5]],
            ],
        )
    }

    fn calculator() -> XvaCalculator {
        XvaCalculator::new(
            XvaConfig::new(FlatCurve::new(0.01)).with_own_credit(CreditParams::flat(0.01, 0.6).unwrap()),
        )
        .with_counterparty(Counterparty::new("CP", CreditParams::flat(0.03, 0.6).unwrap()))
        .unwrap()
    }

    fn netting_set(csa: Option<CollateralAgreement>) -> NettingSet {
        let ns = NettingSet::new("NS", "CP")
            .with_trade("T0")
            .with_trade("T1")
            .with_trade("T2");
        match csa {
            Some(csa) => ns.with_collateral(csa),
            None => ns,
        }
    }

    fn allocate(
        cube: &NpvCube,
        ns: &NettingSet,
        method: AllocationMethod,
    ) -> (ExposureProfile, Vec<TradeAllocation>) {
        let exposure = NettingAggregator::new(cube, CollateralCalculationType::Symmetric)
            .unwrap()
            .aggregate_all(std::slice::from_ref(ns))
            .unwrap()
            .remove(0);
        let profile = ExposureProfile::netting_set(&exposure, &ExposureConfig::default());
        let calculator = calculator();
        let config = AllocationConfig {
            method,
            ..AllocationConfig::default()
        };
        let allocator = ExposureAllocator::new(cube, &calculator, config).unwrap();
        let trades = allocator.allocate(ns, &exposure, &profile).unwrap();
        (profile, trades)
    }

    fn assert_sums_to_netted(profile: &ExposureProfile, trades: &[TradeAllocation]) {
        for (j, p) in profile.all_points().enumerate() {
            let epe: f64 = trades.iter().map(|t| t.points[j].epe).sum();
            let ene: f64 = trades.iter().map(|t| t.points[j].ene).sum();
            assert_relative_eq!(epe, p.epe, epsilon = 1e-9);
            assert_relative_eq!(ene, p.ene, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_allocated_epe_sums_to_netted_epe() {
        let cube = mixed_cube();
        let csa = CollateralAgreement {
            threshold_receive: 2.0,
            threshold_pay: 1.0,
            mpor_days: 30,
            ..CollateralAgreement::default()
        };
        for ns in [netting_set(None), netting_set(Some(csa))] {
            for method in [
                AllocationMethod::Marginal,
                AllocationMethod::RelativeFairValueGross,
                AllocationMethod::RelativeFairValueNet,
                AllocationMethod::RelativeXva,
            ] {
                let (profile, trades) = allocate(&cube, &ns, method);
                assert_eq!(trades.len(), 3);
                assert_sums_to_netted(&profile, &trades);
            }
        }
    }

    #[test]
    fn test_allocated_charges_sum_to_netting_set_charges() {
        let cube = mixed_cube();
        let ns = netting_set(None);
        let (profile, trades) = allocate(&cube, &ns, AllocationMethod::Marginal);
        let netted = calculator().netting_set_xva(&profile).unwrap();
        assert_relative_eq!(
            trades.iter().map(|t| t.cva).sum::<f64>(),
            netted.charges.cva,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            trades.iter().map(|t| t.dva).sum::<f64>(),
            netted.charges.dva,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_marginal_uncollateralised_takes_trade_value() {
        // one sample, one date pair: without a CSA each trade keeps its value
        let cube = cube(&[1.0, 2.0], &[vec![vec![5.0], vec![-3.0]], vec![vec![-2.0], vec![1.0]]]);
        let ns = NettingSet::new("NS", "CP").with_trade("T0").with_trade("T1");
        let (_, trades) = allocate(&cube, &ns, AllocationMethod::Marginal);
        // netted V = 3 > 0 at date 0, all of it EPE
        assert_eq!(trades[0].points[1].epe, 5.0);
        assert_eq!(trades[1].points[1].epe, -2.0);
        // netted V = -2 at date 1, all of it ENE
        assert_eq!(trades[0].points[2].ene, -3.0);
        assert_eq!(trades[1].points[2].ene, 1.0);
        assert_eq!(trades[0].points[2].epe, 0.0);
        // t0 follows the same rule
        assert_eq!(trades[1].points[0].epe, 2.0);
    }

    #[test]
    fn test_marginal_small_netted_value_splits_evenly() {
        // V = 0.5 is within the limit, E = 0.5 - C
        assert_relative_eq!(marginal_share(10.0, 0.5, 0.2, 0.3, 3, 1.0), 0.1, epsilon = 1e-15);
        // outside the limit the share is proportional
        assert_eq!(marginal_share(10.0, 20.0, 5.0, 15.0, 3, 1.0), 7.5);
        // no collateral held: the trade keeps its value
        assert_eq!(marginal_share(-4.0, 20.0, 0.0, 20.0, 3, 1.0), -4.0);
    }

    #[test]
    fn test_relative_fair_value_net_weights() {
        let cube = mixed_cube();
        let ns = netting_set(None);
        let (profile, trades) = allocate(&cube, &ns, AllocationMethod::RelativeFairValueNet);
        for (j, p) in profile.all_points().enumerate() {
            // positive t0 values 4 and 2, the only negative one is T1
            assert_relative_eq!(trades[0].points[j].epe, p.epe * 4.0 / 6.0, epsilon = 1e-12);
            assert_eq!(trades[1].points[j].epe, 0.0);
            assert_relative_eq!(trades[1].points[j].ene, p.ene, epsilon = 1e-12);
            assert_eq!(trades[2].points[j].ene, 0.0);
        }
    }

    #[test]
    fn test_zero_basis_splits_evenly() {
        let weights = normalise(vec![1.0, -1.0], "NS", "t0 value");
        assert_eq!(weights, vec![0.5, 0.5]);
        assert_eq!(normalise(vec![3.0, 1.0], "NS", "t0 value"), vec![0.75, 0.25]);
    }

    #[test]
    fn test_none_allocates_nothing() {
        let cube = mixed_cube();
        let (_, trades) = allocate(&cube, &netting_set(None), AllocationMethod::None);
        assert!(trades
            .iter()
            .all(|t| t.points.iter().all(|p| p.epe == 0.0 && p.ene == 0.0)));
        assert!(trades.iter().all(|t| t.cva == 0.0 && t.dva == 0.0));
        assert_eq!(trades[0].points.len(), 3);
    }

    #[test]
    fn test_mismatched_inputs_rejected() {
        let cube = mixed_cube();
        let ns = netting_set(None);
        let other = NettingSet::new("OTHER", "CP").with_trade("T0");
        let aggregator = NettingAggregator::new(&cube, CollateralCalculationType::NoLag).unwrap();
        let exposure = aggregator.aggregate_all(std::slice::from_ref(&other)).unwrap().remove(0);
        let profile = ExposureProfile::netting_set(&exposure, &ExposureConfig::default());
        let calculator = calculator();
        let allocator = ExposureAllocator::new(&cube, &calculator, AllocationConfig::default()).unwrap();
        assert!(allocator.allocate(&ns, &exposure, &profile).is_err());

        let bad = AllocationConfig {
            marginal_limit: 0.0,
            ..AllocationConfig::default()
        };
        assert!(ExposureAllocator::new(&cube, &calculator, bad).is_err());
    }

    #[test]
    fn test_allocate_all_matches_by_id() {
        let cube = mixed_cube();
        let sets = vec![
            NettingSet::new("A", "CP").with_trade("T0"),
            NettingSet::new("B", "CP").with_trade("T1").with_trade("T2"),
        ];
        let exposures = NettingAggregator::new(&cube, CollateralCalculationType::NoLag)
            .unwrap()
            .aggregate_all(&sets)
            .unwrap();
        let mut profiles: Vec<_> = exposures
            .iter()
            .map(|e| ExposureProfile::netting_set(e, &ExposureConfig::default()))
            .collect();
        profiles.reverse();
        let calculator = calculator();
        let config = AllocationConfig {
            method: AllocationMethod::Marginal,
            ..AllocationConfig::default()
        };
        let allocator = ExposureAllocator::new(&cube, &calculator, config).unwrap();
        let trades = allocator.allocate_all(&sets, &exposures, &profiles).unwrap();
        let ids: Vec<_> = trades.iter().map(|t| t.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["T0", "T1", "T2"]);
        assert_eq!(trades[0].netting_set_id.as_str(), "A");
        // a single trade takes the whole profile
        assert_relative_eq!(trades[0].points[1].epe, profiles[1].points()[0].epe, epsilon = 1e-12);
    }
}
