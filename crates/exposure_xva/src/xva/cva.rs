//! Credit Valuation Adjustment.
//!
//! # Formula
//!
//! CVA = LGD × Σᵢ ½ (EPEᵢ DFᵢ + EPEᵢ₊₁ DFᵢ₊₁) × (S(tᵢ) − S(tᵢ₊₁))
//!
//! over the grid `[0, t1, ..., tn]`, where S is the counterparty survival
//! probability. The bilateral variant also weights each interval by our own
//! average survival probability, so only losses before our own default count.

use exposure_core::curves::CreditCurve;

use super::params::CreditParams;

/// Loss-weighted trapezoidal integral of a discounted exposure profile.
///
/// Not floored, so allocated legs add up to the netted one. Returns zero for
/// mismatched or too short inputs.
pub(crate) fn default_leg(
    exposure: &[f64],
    discount_factors: &[f64],
    time_grid: &[f64],
    defaulter: &CreditParams,
    survivor: Option<&dyn CreditCurve>,
) -> f64 {
    let n = time_grid.len();
    if n < 2 || exposure.len() != n || discount_factors.len() != n {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..n - 1 {
        let (t1, t2) = (time_grid[i], time_grid[i + 1]);
        let discounted =
            0.5 * (exposure[i] * discount_factors[i] + exposure[i + 1] * discount_factors[i + 1]);
        let pd = defaulter.marginal_default_probability(t1, t2);
        let weight = survivor.map_or(1.0, |c| {
            0.5 * (c.survival_probability(t1) + c.survival_probability(t2))
        });
        total += discounted * pd * weight;
    }
    defaulter.lgd() * total
}

/// Unilateral CVA from an EPE profile.
///
/// # Examples
///
/// ```
/// use exposure_xva::{compute_cva, CreditParams};
///
/// let epe = vec![0.0, 100.0, 150.0, 100.0, 50.0];
/// let df = vec![1.0, 0.99, 0.98, 0.97, 0.96];
/// let times = vec![0.0, 0.25, 0.5, 0.75, 1.0];
/// let credit = CreditParams::flat(0.02, 0.6).unwrap();
///
/// let cva = compute_cva(&epe, &df, &times, &credit);
/// assert!(cva > 0.0);
/// ```
pub fn compute_cva(
    epe: &[f64],
    discount_factors: &[f64],
    time_grid: &[f64],
    counterparty: &CreditParams,
) -> f64 {
    default_leg(epe, discount_factors, time_grid, counterparty, None).max(0.0)
}

/// CVA weighted by our own survival (first-to-default).
pub fn compute_cva_with_survival(
    epe: &[f64],
    discount_factors: &[f64],
    time_grid: &[f64],
    counterparty: &CreditParams,
    own: &CreditParams,
) -> f64 {
    default_leg(
        epe,
        discount_factors,
        time_grid,
        counterparty,
        Some(own.curve() as &dyn CreditCurve),
    )
    .max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TIMES: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

    #[test]
    fn test_constant_exposure_closed_form() {
        let epe = [100.0; 5];
        let df = [1.0; 5];
        let credit = CreditParams::flat(0.02, 0.6).unwrap();
        let cva = compute_cva(&epe, &df, &TIMES, &credit);
        assert_relative_eq!(cva, 0.6 * 100.0 * (1.0 - (-0.02_f64).exp()), epsilon = 1e-12);
    }

    #[test]
    fn test_cva_proportional_to_lgd() {
        let epe = [0.0, 100.0, 100.0, 100.0, 100.0];
        let df = [1.0; 5];
        let low = CreditParams::flat(0.02, 0.3).unwrap();
        let high = CreditParams::flat(0.02, 0.6).unwrap();
        assert_relative_eq!(
            compute_cva(&epe, &df, &TIMES, &high) / compute_cva(&epe, &df, &TIMES, &low),
            2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_survival_weighting_reduces_cva() {
        let epe = [0.0, 100.0, 100.0, 100.0, 100.0];
        let df = [1.0; 5];
        let cp = CreditParams::flat(0.02, 0.6).unwrap();
        let own = CreditParams::flat(0.05, 0.6).unwrap();
        let unilateral = compute_cva(&epe, &df, &TIMES, &cp);
        let bilateral = compute_cva_with_survival(&epe, &df, &TIMES, &cp, &own);
        assert!(bilateral < unilateral);
        assert!(bilateral > 0.0);
    }

    #[test]
    fn test_mismatched_inputs() {
        let credit = CreditParams::flat(0.02, 0.6).unwrap();
        assert_eq!(compute_cva(&[], &[], &[], &credit), 0.0);
        assert_eq!(compute_cva(&[1.0, 1.0], &[1.0], &[0.0, 1.0], &credit), 0.0);
    }
}
