//! Fitted continuation value model for one exercise date.

use crate::basis::BasisSystem;
use crate::regression::FitDiagnostics;

/// Basis coefficients mapping a path state to an estimated continuation value.
#[derive(Clone, Debug, PartialEq)]
pub struct RegressionModel {
    date_index: usize,
    basis: BasisSystem,
    means: Vec<f64>,
    scales: Vec<f64>,
    coefficients: Vec<f64>,
    diagnostics: FitDiagnostics,
}

impl RegressionModel {
    pub(crate) fn new(
        date_index: usize,
        basis: BasisSystem,
        means: Vec<f64>,
        scales: Vec<f64>,
        coefficients: Vec<f64>,
        diagnostics: FitDiagnostics,
    ) -> Self {
        Self {
            date_index,
            basis,
            means,
            scales,
            coefficients,
            diagnostics,
        }
    }

    /// Simulation date index the model was fitted at.
    #[inline]
    pub fn date_index(&self) -> usize {
        self.date_index
    }

    /// Basis functions.
    #[inline]
    pub fn basis(&self) -> &BasisSystem {
        &self.basis
    }

    /// Fitted coefficients, one per basis function.
    #[inline]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Fit diagnostics.
    #[inline]
    pub fn diagnostics(&self) -> &FitDiagnostics {
        &self.diagnostics
    }

    /// Estimated continuation value for a path state.
    ///
    /// Features beyond the fitted dimension are ignored; missing features
    /// are taken at their fitted mean.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let scaled: Vec<f64> = self
            .means
            .iter()
            .zip(&self.scales)
            .enumerate()
            .map(|(j, (m, s))| (features.get(j).copied().unwrap_or(*m) - m) / s)
            .collect();
        let mut row = vec![0.0; self.basis.size()];
        self.basis.evaluate(&scaled, &mut row);
        row.iter().zip(&self.coefficients).map(|(b, c)| b * c).sum()
    }
}
