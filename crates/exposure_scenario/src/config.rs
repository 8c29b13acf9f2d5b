//! Scenario generator configuration.

use exposure_core::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Upper bound on the sample count of one run.
pub const MAX_SAMPLES: usize = 10_000_000;

/// How random draws are assigned to samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceType {
    /// Independent stream per sample
    #[default]
    PseudoRandom,
    /// Samples `2k` and `2k + 1` share a stream with opposite signs
    Antithetic,
}

/// Sample count, seed and sequence type of a scenario generation run.
///
/// The sample count is taken from this value when the generator is
/// constructed; nothing is cached earlier, so an override applied to the
/// configuration before construction is always honoured.
///
/// # Examples
///
/// ```
/// use exposure_scenario::{ScenarioGeneratorConfig, SequenceType};
///
/// let config = ScenarioGeneratorConfig::builder()
///     .samples(2000)
///     .seed(42)
///     .sequence_type(SequenceType::Antithetic)
///     .build()
///     .unwrap();
/// assert_eq!(config.samples(), 2000);
///
/// assert!(ScenarioGeneratorConfig::builder().samples(0).build().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioGeneratorConfig {
    samples: usize,
    seed: u64,
    sequence_type: SequenceType,
}

impl ScenarioGeneratorConfig {
    /// Creates a builder.
    #[inline]
    pub fn builder() -> ScenarioGeneratorConfigBuilder {
        ScenarioGeneratorConfigBuilder::default()
    }

    /// Number of Monte Carlo samples.
    #[inline]
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Run seed.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw assignment scheme.
    #[inline]
    pub fn sequence_type(&self) -> SequenceType {
        self.sequence_type
    }

    /// Checks the sample count.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.samples == 0 {
            return Err(ConfigurationError::NonPositiveSampleCount {
                samples: self.samples,
            });
        }
        if self.samples > MAX_SAMPLES {
            return Err(ConfigurationError::invalid(
                "samples",
                format!("must not exceed {}, got {}", MAX_SAMPLES, self.samples),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ScenarioGeneratorConfig`].
#[derive(Clone, Debug, Default)]
pub struct ScenarioGeneratorConfigBuilder {
    samples: Option<usize>,
    seed: u64,
    sequence_type: SequenceType,
}

impl ScenarioGeneratorConfigBuilder {
    /// Sets the sample count (required).
    #[inline]
    pub fn samples(mut self, samples: usize) -> Self {
        self.samples = Some(samples);
        self
    }

    /// Sets the seed (default 0).
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the sequence type.
    #[inline]
    pub fn sequence_type(mut self, sequence_type: SequenceType) -> Self {
        self.sequence_type = sequence_type;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<ScenarioGeneratorConfig, ConfigurationError> {
        let samples = self
            .samples
            .ok_or_else(|| ConfigurationError::invalid("samples", "must be specified"))?;
        let config = ScenarioGeneratorConfig {
            samples,
            seed: self.seed,
            sequence_type: self.sequence_type,
        };
        config.validate()?;
        Ok(config)
    }
}
