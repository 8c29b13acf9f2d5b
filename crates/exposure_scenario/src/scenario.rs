//! Generated risk factor scenarios.

use exposure_core::{DateGrid, RiskFactorId, ValuationDate, ValuationError};

use crate::model::CrossAssetModel;

/// Risk factor values for every (date, sample), plus the t0 state and the
/// numeraire.
///
/// Values are stored densely with layout `[date][sample][factor]`. For a
/// Hull-White factor the stored value is the state variable `x(t)`; use
/// [`short_rate`](Self::short_rate) or [`discount_bond`](Self::discount_bond)
/// to read rates and bond prices from it.
///
/// A scenario set is read-only once generated.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioSet {
    model: CrossAssetModel,
    grid: DateGrid,
    n_samples: usize,
    initial: Vec<f64>,
    values: Vec<f64>,
    numeraire: Vec<f64>,
}

impl ScenarioSet {
    pub(crate) fn new(
        model: CrossAssetModel,
        grid: DateGrid,
        n_samples: usize,
        values: Vec<f64>,
        numeraire: Vec<f64>,
    ) -> Self {
        let initial = model.factors().iter().map(|f| f.initial_value()).collect();
        debug_assert_eq!(values.len(), grid.len() * n_samples * model.dim());
        debug_assert_eq!(numeraire.len(), grid.len() * n_samples);
        Self {
            model,
            grid,
            n_samples,
            initial,
            values,
            numeraire,
        }
    }

    /// Model the scenarios were generated under.
    #[inline]
    pub fn model(&self) -> &CrossAssetModel {
        &self.model
    }

    /// Simulation date grid.
    #[inline]
    pub fn grid(&self) -> &DateGrid {
        &self.grid
    }

    /// Number of samples.
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of simulation dates.
    #[inline]
    pub fn n_dates(&self) -> usize {
        self.grid.len()
    }

    /// Simulated factor identifiers.
    #[inline]
    pub fn factors(&self) -> &[RiskFactorId] {
        self.model.factor_ids()
    }

    /// Position of `factor` in the state vector.
    pub fn factor_index(&self, factor: &RiskFactorId) -> Option<usize> {
        self.model.factor_ids().iter().position(|f| f == factor)
    }

    /// Year fraction of a valuation date.
    #[inline]
    pub fn time(&self, date: ValuationDate) -> f64 {
        match date {
            ValuationDate::AsOf => 0.0,
            ValuationDate::Simulation(d) => self.grid.dates()[d].time,
        }
    }

    #[inline]
    fn offset(&self, date_index: usize, sample: usize) -> usize {
        date_index * self.n_samples + sample
    }

    /// Full state vector at (date, sample).
    pub fn state_vector(&self, date_index: usize, sample: usize) -> &[f64] {
        let dim = self.model.dim();
        let start = self.offset(date_index, sample) * dim;
        &self.values[start..start + dim]
    }

    /// Raw state of factor `factor_index` at (date, sample).
    #[inline]
    pub fn state(&self, date: ValuationDate, sample: usize, factor_index: usize) -> f64 {
        match date {
            ValuationDate::AsOf => self.initial[factor_index],
            ValuationDate::Simulation(d) => {
                self.values[self.offset(d, sample) * self.model.dim() + factor_index]
            }
        }
    }

    /// Value of a simulated factor at (date, sample).
    ///
    /// # Errors
    /// `ValuationError::UnsimulatedFactor` if the factor is not part of the model.
    pub fn value(
        &self,
        factor: &RiskFactorId,
        date: ValuationDate,
        sample: usize,
    ) -> Result<f64, ValuationError> {
        let index = self
            .factor_index(factor)
            .ok_or_else(|| ValuationError::UnsimulatedFactor {
                factor: factor.to_string(),
            })?;
        Ok(self.state(date, sample, index))
    }

    /// Numeraire at (date, sample); 1 at the as-of date.
    #[inline]
    pub fn numeraire(&self, date: ValuationDate, sample: usize) -> f64 {
        match date {
            ValuationDate::AsOf => 1.0,
            ValuationDate::Simulation(d) => self.numeraire[self.offset(d, sample)],
        }
    }

    /// Short rate of `currency` at (date, sample).
    pub fn short_rate(
        &self,
        currency: &str,
        date: ValuationDate,
        sample: usize,
    ) -> Result<f64, ValuationError> {
        let t = self.time(date);
        if let Some((i, hw)) = self.model.hull_white(currency) {
            return Ok(hw.short_rate(t, self.state(date, sample, i)));
        }
        if currency == self.model.base_currency() {
            return Ok(self.model.base_rate());
        }
        Err(ValuationError::UnsimulatedFactor {
            factor: RiskFactorId::interest_rate(currency).to_string(),
        })
    }

    /// Discount bond `P(t, maturity)` of `currency` observed at (date, sample).
    ///
    /// Simulated currencies use the Hull-White closed form; the base currency
    /// without a Hull-White factor discounts at the flat base rate.
    ///
    /// # Errors
    /// `ValuationError::UnsimulatedFactor` for any other currency.
    pub fn discount_bond(
        &self,
        currency: &str,
        date: ValuationDate,
        sample: usize,
        maturity: f64,
    ) -> Result<f64, ValuationError> {
        let t = self.time(date);
        if let Some((i, hw)) = self.model.hull_white(currency) {
            return Ok(hw.discount_bond(t, maturity, self.state(date, sample, i)));
        }
        if currency == self.model.base_currency() {
            return Ok((-self.model.base_rate() * (maturity - t).max(0.0)).exp());
        }
        Err(ValuationError::UnsimulatedFactor {
            factor: RiskFactorId::interest_rate(currency).to_string(),
        })
    }
}
