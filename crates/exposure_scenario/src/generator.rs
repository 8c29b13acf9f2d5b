//! Scenario generation across samples.

use exposure_core::rng::SampleRng;
use exposure_core::{ConfigurationError, DateGrid};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{ScenarioGeneratorConfig, SequenceType};
use crate::model::{CrossAssetModel, FactorModel};
use crate::scenario::ScenarioSet;

/// Simulated path of one sample: factor states `[date][factor]` and numeraire `[date]`.
struct SamplePath {
    values: Vec<f64>,
    numeraire: Vec<f64>,
}

/// Generates [`ScenarioSet`]s for a model, date grid and configuration.
///
/// The generator holds no state between calls; [`generate`](Self::generate)
/// returns a fresh container every time.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use exposure_core::{DateGrid, DayCountConvention};
/// use exposure_scenario::{
///     CrossAssetModel, FactorModel, HullWhiteParams, ModelSpec, ScenarioGenerator,
///     ScenarioGeneratorConfig,
/// };
///
/// let model = CrossAssetModel::new(ModelSpec {
///     base_currency: "EUR".to_string(),
///     base_rate: 0.0,
///     factors: vec![FactorModel::HullWhite(HullWhiteParams {
///         currency: "EUR".to_string(),
///         mean_reversion: 0.03,
///         volatility: 0.01,
///         initial_rate: 0.02,
///     })],
///     correlation: None,
/// })
/// .unwrap();
/// let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let grid = DateGrid::parse(as_of, "4,6M", DayCountConvention::Act365Fixed).unwrap();
/// let config = ScenarioGeneratorConfig::builder().samples(100).seed(7).build().unwrap();
///
/// let generator = ScenarioGenerator::new(model, grid, config).unwrap();
/// let scenarios = generator.generate();
/// assert_eq!(scenarios.n_samples(), 100);
/// assert_eq!(scenarios.n_dates(), 4);
/// ```
#[derive(Clone, Debug)]
pub struct ScenarioGenerator {
    model: CrossAssetModel,
    grid: DateGrid,
    config: ScenarioGeneratorConfig,
}

impl ScenarioGenerator {
    /// Creates a generator, validating the configuration and grid.
    ///
    /// # Errors
    /// `ConfigurationError` on a non-positive sample count or an empty grid.
    pub fn new(
        model: CrossAssetModel,
        grid: DateGrid,
        config: ScenarioGeneratorConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        if grid.is_empty() {
            return Err(ConfigurationError::EmptyDateGrid);
        }
        Ok(Self {
            model,
            grid,
            config,
        })
    }

    /// Model being simulated.
    #[inline]
    pub fn model(&self) -> &CrossAssetModel {
        &self.model
    }

    /// Simulation grid.
    #[inline]
    pub fn grid(&self) -> &DateGrid {
        &self.grid
    }

    /// Generator configuration.
    #[inline]
    pub fn config(&self) -> &ScenarioGeneratorConfig {
        &self.config
    }

    /// Simulates all samples in parallel.
    pub fn generate(&self) -> ScenarioSet {
        let n_samples = self.config.samples();
        let n_dates = self.grid.len();
        let dim = self.model.dim();
        info!(
            samples = n_samples,
            dates = n_dates,
            factors = dim,
            seed = self.config.seed(),
            "Generating scenarios"
        );

        let paths: Vec<SamplePath> = (0..n_samples)
            .into_par_iter()
            .map(|sample| self.simulate_sample(sample))
            .collect();

        let mut values = vec![0.0; n_dates * n_samples * dim];
        let mut numeraire = vec![0.0; n_dates * n_samples];
        for (sample, path) in paths.iter().enumerate() {
            for d in 0..n_dates {
                let cell = d * n_samples + sample;
                values[cell * dim..(cell + 1) * dim]
                    .copy_from_slice(&path.values[d * dim..(d + 1) * dim]);
                numeraire[cell] = path.numeraire[d];
            }
        }

        debug!(cells = values.len(), "Scenario generation complete");
        ScenarioSet::new(
            self.model.clone(),
            self.grid.clone(),
            n_samples,
            values,
            numeraire,
        )
    }

    fn simulate_sample(&self, sample: usize) -> SamplePath {
        let (stream, sign) = match self.config.sequence_type() {
            SequenceType::PseudoRandom => (sample, 1.0),
            SequenceType::Antithetic => (sample & !1, if sample % 2 == 1 { -1.0 } else { 1.0 }),
        };
        let mut rng = SampleRng::for_sample(self.config.seed(), stream);

        let dim = self.model.dim();
        let n_dates = self.grid.len();
        let base_hw = self.model.hull_white(self.model.base_currency());

        let mut state: Vec<f64> = self.model.factors().iter().map(|f| f.initial_value()).collect();
        let mut z = vec![0.0; dim];
        let mut w = vec![0.0; dim];
        let mut values = Vec::with_capacity(n_dates * dim);
        let mut numeraire = Vec::with_capacity(n_dates);

        let mut t_prev = 0.0;
        let mut rate_prev = base_hw.map_or(0.0, |(_, p)| p.short_rate(0.0, 0.0));
        let mut integrated_rate = 0.0;

        for date in self.grid.dates() {
            let dt = date.time - t_prev;
            rng.fill_normal(&mut z);
            if sign < 0.0 {
                z.iter_mut().for_each(|v| *v = -*v);
            }
            self.model.cholesky().transform_into(&z, &mut w);

            for (j, factor) in self.model.factors().iter().enumerate() {
                match factor {
                    FactorModel::HullWhite(p) => {
                        let (decay, std_dev) = p.transition(dt);
                        state[j] = decay * state[j] + std_dev * w[j];
                    }
                    FactorModel::Equity(p) | FactorModel::Fx(p) => {
                        state[j] *= p.step(dt, w[j]);
                    }
                }
            }

            // Bank account by trapezoidal integration of the short rate
            let n = match base_hw {
                Some((i, p)) => {
                    let rate = p.short_rate(date.time, state[i]);
                    integrated_rate += 0.5 * (rate_prev + rate) * dt;
                    rate_prev = rate;
                    integrated_rate.exp()
                }
                None => (self.model.base_rate() * date.time).exp(),
            };

            values.extend_from_slice(&state);
            numeraire.push(n);
            t_prev = date.time;
        }

        SamplePath { values, numeraire }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GbmParams, HullWhiteParams, ModelSpec};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use exposure_core::{DayCountConvention, RiskFactorId, ValuationDate};

    fn grid() -> DateGrid {
        DateGrid::from_times(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &[0.5, 1.0, 2.0],
            DayCountConvention::Act365Fixed,
        )
        .unwrap()
    }

    fn equity_model(vol: f64) -> CrossAssetModel {
        CrossAssetModel::new(ModelSpec {
            base_currency: "USD".to_string(),
            base_rate: 0.03,
            factors: vec![FactorModel::Equity(GbmParams {
                name: "SPX".to_string(),
                spot: 100.0,
                drift: 0.03,
                volatility: vol,
            })],
            correlation: None,
        })
        .unwrap()
    }

    fn config(samples: usize, sequence_type: SequenceType) -> ScenarioGeneratorConfig {
        ScenarioGeneratorConfig::builder()
            .samples(samples)
            .seed(11)
            .sequence_type(sequence_type)
            .build()
            .unwrap()
    }

    #[test]
    fn test_zero_vol_equity_is_forward() {
        let g = ScenarioGenerator::new(equity_model(0.0), grid(), config(8, SequenceType::PseudoRandom))
            .unwrap();
        let s = g.generate();
        let spx = RiskFactorId::equity("SPX");
        for sample in 0..8 {
            let v = s.value(&spx, ValuationDate::Simulation(2), sample).unwrap();
            assert_relative_eq!(v, 100.0 * (0.06_f64).exp(), epsilon = 1e-10);
            assert_relative_eq!(
                s.numeraire(ValuationDate::Simulation(2), sample),
                (0.06_f64).exp(),
                epsilon = 1e-12
            );
        }
        assert_eq!(s.value(&spx, ValuationDate::AsOf, 0).unwrap(), 100.0);
    }

    #[test]
    fn test_antithetic_pairs_mirror() {
        let g = ScenarioGenerator::new(equity_model(0.2), grid(), config(4, SequenceType::Antithetic))
            .unwrap();
        let s = g.generate();
        let spx = RiskFactorId::equity("SPX");
        let date = ValuationDate::Simulation(0);
        let up = s.value(&spx, date, 0).unwrap();
        let down = s.value(&spx, date, 1).unwrap();
        // log returns are symmetric around the drift term
        let drift = (0.03 - 0.5 * 0.04) * 0.5;
        assert_relative_eq!(
            (up / 100.0).ln() - drift,
            -((down / 100.0).ln() - drift),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_martingale_under_numeraire() {
        let g = ScenarioGenerator::new(equity_model(0.25), grid(), config(20_000, SequenceType::Antithetic))
            .unwrap();
        let s = g.generate();
        let date = ValuationDate::Simulation(2);
        let mean: f64 = (0..s.n_samples())
            .map(|i| s.state(date, i, 0) / s.numeraire(date, i))
            .sum::<f64>()
            / s.n_samples() as f64;
        assert_relative_eq!(mean, 100.0, max_relative = 0.01);
    }

    #[test]
    fn test_hull_white_bank_account() {
        let model = CrossAssetModel::new(ModelSpec {
            base_currency: "EUR".to_string(),
            base_rate: 0.0,
            factors: vec![FactorModel::HullWhite(HullWhiteParams {
                currency: "EUR".to_string(),
                mean_reversion: 0.1,
                volatility: 0.0,
                initial_rate: 0.02,
            })],
            correlation: None,
        })
        .unwrap();
        let s = ScenarioGenerator::new(model, grid(), config(3, SequenceType::PseudoRandom))
            .unwrap()
            .generate();
        assert_relative_eq!(
            s.numeraire(ValuationDate::Simulation(1), 2),
            (0.02_f64).exp(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            s.discount_bond("EUR", ValuationDate::Simulation(0), 1, 3.0).unwrap(),
            (-0.02_f64 * 2.5).exp(),
            epsilon = 1e-12
        );
        assert!(s.discount_bond("GBP", ValuationDate::AsOf, 0, 1.0).is_err());
    }

    #[test]
    fn test_rejects_zero_samples_config() {
        let bad = ScenarioGeneratorConfig::builder().samples(0).build();
        assert!(bad.is_err());
    }
}
