//! Debit Valuation Adjustment.
//!
//! DVA = LGD_own × Σᵢ ½ (NEEᵢ DFᵢ + NEEᵢ₊₁ DFᵢ₊₁) × (S_own(tᵢ) − S_own(tᵢ₊₁)),
//! with NEE = −ENE ≥ 0.

use exposure_core::curves::CreditCurve;

use super::cva::default_leg;
use super::params::CreditParams;

/// Unilateral DVA from a signed ENE profile.
pub fn compute_dva(
    ene: &[f64],
    discount_factors: &[f64],
    time_grid: &[f64],
    own: &CreditParams,
) -> f64 {
    let nee: Vec<f64> = ene.iter().map(|e| -e).collect();
    default_leg(&nee, discount_factors, time_grid, own, None).max(0.0)
}

/// DVA weighted by counterparty survival.
pub fn compute_dva_with_survival(
    ene: &[f64],
    discount_factors: &[f64],
    time_grid: &[f64],
    own: &CreditParams,
    counterparty: &CreditParams,
) -> f64 {
    let nee: Vec<f64> = ene.iter().map(|e| -e).collect();
    default_leg(
        &nee,
        discount_factors,
        time_grid,
        own,
        Some(counterparty.curve() as &dyn CreditCurve),
    )
    .max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xva::compute_cva;
    use approx::assert_relative_eq;

    #[test]
    fn test_dva_mirrors_cva() {
        let times = [0.0, 0.5, 1.0];
        let df = [1.0, 0.99, 0.98];
        let own = CreditParams::flat(0.03, 0.6).unwrap();
        let dva = compute_dva(&[0.0, -50.0, -80.0], &df, &times, &own);
        let cva = compute_cva(&[0.0, 50.0, 80.0], &df, &times, &own);
        assert!(dva > 0.0);
        assert_relative_eq!(dva, cva, epsilon = 1e-12);
    }

    #[test]
    fn test_positive_ene_gives_no_dva() {
        let own = CreditParams::flat(0.03, 0.6).unwrap();
        assert_eq!(compute_dva(&[1.0, 1.0], &[1.0, 1.0], &[0.0, 1.0], &own), 0.0);
    }
}
