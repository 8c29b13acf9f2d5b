//! Run configuration management
//!
//! A run is described by one TOML file: the valuation date and simulation
//! grid, the cross-asset model, market quotes, trades, netting sets with
//! their CSAs, counterparty credit and the XVA settings. Everything is
//! validated here, at the boundary, before any scenario is generated.
//!
//! ```toml
//! as_of = "2024-01-02"
//! grid = "20,3M"
//!
//! [simulation]
//! samples = 2000
//! seed = 42
//!
//! [model]
//! base_currency = "EUR"
//!
//! [[model.factors]]
//! model = "HullWhite"
//! currency = "EUR"
//! mean_reversion = 0.03
//! volatility = 0.01
//! initial_rate = 0.02
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use exposure_amc::RegressionConfig;
use exposure_core::curves::{FlatCurve, HazardRateCurve};
use exposure_core::{
    ConfigurationError, CounterpartyId, DateGrid, DayCountConvention, InMemoryMarketData,
    NettingSetId, RiskFactorId,
};
use exposure_cube::{Portfolio, Trade};
use exposure_scenario::{CrossAssetModel, ModelSpec, ScenarioGeneratorConfig, SequenceType};
use exposure_xva::{
    AllocationConfig, CollateralAgreement, CollateralCalculationType, Counterparty, CreditParams, ExposureConfig,
    FundingParams, NettingSet, XvaConfig,
};
use serde::Deserialize;
use tracing::debug;

use crate::{CliError, Result};

/// Offset applied to the valuation seed when no training seed is given, so
/// that regressions are never fitted on the paths they value.
pub const TRAINING_SEED_OFFSET: u64 = 0x9E37_79B9;

/// Default loss given default for counterparties without one.
pub const DEFAULT_LGD: f64 = 0.6;

fn default_seed() -> u64 {
    42
}

fn default_lgd() -> f64 {
    DEFAULT_LGD
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_true() -> bool {
    true
}

/// Complete description of one exposure run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Valuation date, `YYYY-MM-DD`
    pub as_of: NaiveDate,
    /// Simulation grid, either `"3M,6M,1Y"` or `"<count>,<tenor>"`
    pub grid: String,
    #[serde(default)]
    pub day_count: DayCountConvention,
    pub simulation: SimulationConfig,
    pub model: ModelSpec,
    #[serde(default)]
    pub regression: RegressionConfig,
    #[serde(default)]
    pub market: Vec<MarketQuote>,
    #[serde(default)]
    pub trades: Vec<Trade>,
    #[serde(default)]
    pub netting_sets: Vec<NettingSetConfig>,
    #[serde(default)]
    pub counterparties: Vec<CounterpartyConfig>,
    #[serde(default)]
    pub collateral_calculation: CollateralCalculationType,
    #[serde(default)]
    pub exposure: ExposureConfig,
    #[serde(default)]
    pub xva: XvaSettings,
    /// Split of netting-set exposure back to trades
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Sample counts and seeds of the valuation and training runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub samples: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub sequence_type: SequenceType,
    /// AMC training samples; the valuation count if omitted
    #[serde(default)]
    pub training_samples: Option<usize>,
    /// AMC training seed; derived from `seed` if omitted
    #[serde(default)]
    pub training_seed: Option<u64>,
}

impl SimulationConfig {
    pub fn training_samples(&self) -> usize {
        self.training_samples.unwrap_or(self.samples)
    }

    pub fn training_seed(&self) -> u64 {
        self.training_seed
            .unwrap_or_else(|| self.seed.wrapping_add(TRAINING_SEED_OFFSET))
    }
}

/// One market data entry.
///
/// `value` without `date_index` is a static quote, with `date_index` an
/// override at that simulation date. A `date_index` without `value` marks
/// the quote as missing at that date.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketQuote {
    pub factor: RiskFactorId,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub date_index: Option<usize>,
}

/// A netting set and its optional CSA.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NettingSetConfig {
    pub id: NettingSetId,
    pub counterparty: CounterpartyId,
    #[serde(default)]
    pub csa: Option<CollateralAgreement>,
}

impl NettingSetConfig {
    fn to_netting_set(&self) -> NettingSet {
        let ns = NettingSet::new(self.id.clone(), self.counterparty.clone());
        match &self.csa {
            Some(csa) => ns.with_collateral(csa.clone()),
            None => ns,
        }
    }
}

/// Default term structure of one party.
///
/// Exactly one of `tenors`/`hazard_rates`, `hazard_rate` or `cds_spread`
/// is used, in that order of precedence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreditConfig {
    #[serde(default = "default_lgd")]
    pub lgd: f64,
    #[serde(default)]
    pub hazard_rate: Option<f64>,
    #[serde(default)]
    pub cds_spread: Option<f64>,
    #[serde(default)]
    pub tenors: Vec<f64>,
    #[serde(default)]
    pub hazard_rates: Vec<f64>,
}

impl CreditConfig {
    /// Builds the credit parameters of `party`.
    pub fn to_params(&self, party: &str) -> std::result::Result<CreditParams, ConfigurationError> {
        let curve = if !self.tenors.is_empty() || !self.hazard_rates.is_empty() {
            HazardRateCurve::new(&self.tenors, &self.hazard_rates)?
        } else if let Some(h) = self.hazard_rate {
            HazardRateCurve::flat(h)?
        } else if let Some(spread) = self.cds_spread {
            HazardRateCurve::from_spread(spread, self.lgd)?
        } else {
            return Err(ConfigurationError::invalid(
                format!("credit of {}", party),
                "needs tenors/hazard_rates, hazard_rate or cds_spread",
            ));
        };
        CreditParams::new(curve, self.lgd)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CounterpartyConfig {
    pub id: CounterpartyId,
    #[serde(flatten)]
    pub credit: CreditConfig,
}

/// Adjustments beyond unilateral CVA.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XvaSettings {
    /// Own credit; DVA is zero without it
    #[serde(default)]
    pub own_credit: Option<CreditConfig>,
    #[serde(default)]
    pub funding: FundingParams,
    #[serde(default)]
    pub bilateral: bool,
}

/// Report output settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Write every cube cell to `npv_cube.csv`
    #[serde(default = "default_true")]
    pub write_cube: bool,
    /// Write one profile file per trade
    #[serde(default = "default_true")]
    pub write_trade_profiles: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            write_cube: true,
            write_trade_profiles: true,
        }
    }
}

impl RunConfig {
    /// Loads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CliError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content).map_err(|source| CliError::ConfigParse {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Replaces the configured sample count.
    ///
    /// Must be applied before the scenario generators are built; training
    /// follows the new count unless it has its own.
    pub fn with_sample_override(mut self, samples: Option<usize>) -> Self {
        if let Some(samples) = samples {
            self.simulation.samples = samples;
        }
        self
    }

    /// Replaces the report directory.
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.output.dir = dir;
        }
        self
    }

    /// Checks every section without generating scenarios.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        self.date_grid()?;
        self.cross_asset_model()?;
        self.scenario_config()?;
        self.training_config()?;
        self.regression.validate()?;
        self.market_data()?;
        self.portfolio()?;
        self.counterparties()?;
        self.xva_config()?;
        self.exposure.validate()?;
        self.allocation.validate()?;
        let counterparties: HashSet<&CounterpartyId> =
            self.counterparties.iter().map(|cp| &cp.id).collect();
        for ns in &self.netting_sets {
            ns.to_netting_set().validate()?;
            if !counterparties.contains(&ns.counterparty) {
                return Err(ConfigurationError::invalid(
                    format!("netting set {}", ns.id),
                    format!("unknown counterparty {}", ns.counterparty),
                ));
            }
        }
        Ok(())
    }

    pub fn date_grid(&self) -> std::result::Result<DateGrid, ConfigurationError> {
        DateGrid::parse(self.as_of, &self.grid, self.day_count)
    }

    pub fn cross_asset_model(&self) -> std::result::Result<CrossAssetModel, ConfigurationError> {
        CrossAssetModel::new(self.model.clone())
    }

    /// Valuation scenario settings.
    pub fn scenario_config(
        &self,
    ) -> std::result::Result<ScenarioGeneratorConfig, ConfigurationError> {
        ScenarioGeneratorConfig::builder()
            .samples(self.simulation.samples)
            .seed(self.simulation.seed)
            .sequence_type(self.simulation.sequence_type)
            .build()
    }

    /// AMC training scenario settings.
    pub fn training_config(
        &self,
    ) -> std::result::Result<ScenarioGeneratorConfig, ConfigurationError> {
        ScenarioGeneratorConfig::builder()
            .samples(self.simulation.training_samples())
            .seed(self.simulation.training_seed())
            .sequence_type(self.simulation.sequence_type)
            .build()
    }

    pub fn market_data(&self) -> std::result::Result<InMemoryMarketData, ConfigurationError> {
        let mut market = InMemoryMarketData::new();
        for quote in &self.market {
            match (quote.value, quote.date_index) {
                (Some(v), None) => market.insert(quote.factor.clone(), v),
                (Some(v), Some(d)) => market.insert_at(quote.factor.clone(), d, v),
                (None, Some(d)) => market.mark_missing(quote.factor.clone(), d),
                (None, None) => {
                    return Err(ConfigurationError::invalid(
                        format!("market quote {}", quote.factor),
                        "needs a value or a date_index",
                    ))
                }
            }
        }
        Ok(market)
    }

    pub fn portfolio(&self) -> std::result::Result<Portfolio, ConfigurationError> {
        Portfolio::builder().add_trades(self.trades.clone()).build()
    }

    /// Netting sets without trades; trades are assigned from the portfolio.
    pub fn netting_sets(&self) -> Vec<NettingSet> {
        self.netting_sets
            .iter()
            .map(NettingSetConfig::to_netting_set)
            .collect()
    }

    pub fn counterparties(&self) -> std::result::Result<Vec<Counterparty>, ConfigurationError> {
        self.counterparties
            .iter()
            .map(|c| Ok(Counterparty::new(c.id.clone(), c.credit.to_params(c.id.as_str())?)))
            .collect()
    }

    /// Discounting follows the initial short rate of the base currency when
    /// it is simulated, and the model's flat base rate otherwise.
    pub fn xva_config(&self) -> std::result::Result<XvaConfig, ConfigurationError> {
        self.xva.funding.validate()?;
        let rate = self
            .model
            .factors
            .iter()
            .find_map(|f| match f {
                exposure_scenario::FactorModel::HullWhite(p)
                    if p.currency == self.model.base_currency =>
                {
                    Some(p.initial_rate)
                }
                _ => None,
            })
            .unwrap_or(self.model.base_rate);
        let mut config = XvaConfig::new(FlatCurve::new(rate)).with_funding(self.xva.funding);
        if let Some(own) = &self.xva.own_credit {
            config = config.with_own_credit(own.to_params("own")?);
        }
        if self.xva.bilateral {
            config = config.bilateral();
        }
        Ok(config)
    }
}
