//! Funding Valuation Adjustment.
//!
//! FCA = s_borrow × Σᵢ ½ (EPEᵢ DFᵢ + EPEᵢ₊₁ DFᵢ₊₁) × (tᵢ₊₁ − tᵢ)
//! FBA = s_lend   × Σᵢ ½ (NEEᵢ DFᵢ + NEEᵢ₊₁ DFᵢ₊₁) × (tᵢ₊₁ − tᵢ)
//! FVA = FCA − FBA

fn funding_leg(exposure: &[f64], discount_factors: &[f64], time_grid: &[f64], spread: f64) -> f64 {
    let n = time_grid.len();
    if n < 2 || exposure.len() != n || discount_factors.len() != n {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..n - 1 {
        let dt = time_grid[i + 1] - time_grid[i];
        let discounted =
            0.5 * (exposure[i] * discount_factors[i] + exposure[i + 1] * discount_factors[i + 1]);
        total += discounted * dt;
    }
    (spread * total).max(0.0)
}

/// Funding cost of positive exposure.
///
/// # Examples
///
/// ```
/// use exposure_xva::compute_fca;
///
/// let epe = vec![0.0, 100.0, 150.0, 100.0, 50.0];
/// let df = vec![1.0, 0.99, 0.98, 0.97, 0.96];
/// let times = vec![0.0, 0.25, 0.5, 0.75, 1.0];
///
/// let fca = compute_fca(&epe, &df, &times, 0.005);
/// assert!(fca > 0.0);
/// ```
pub fn compute_fca(epe: &[f64], discount_factors: &[f64], time_grid: &[f64], spread_borrow: f64) -> f64 {
    funding_leg(epe, discount_factors, time_grid, spread_borrow)
}

/// Funding benefit of negative exposure, from a signed ENE profile.
pub fn compute_fba(ene: &[f64], discount_factors: &[f64], time_grid: &[f64], spread_lend: f64) -> f64 {
    let nee: Vec<f64> = ene.iter().map(|e| -e).collect();
    funding_leg(&nee, discount_factors, time_grid, spread_lend)
}

/// `(FCA, FBA, FVA)`.
pub fn compute_fva(
    epe: &[f64],
    ene: &[f64],
    discount_factors: &[f64],
    time_grid: &[f64],
    spread_borrow: f64,
    spread_lend: f64,
) -> (f64, f64, f64) {
    let fca = compute_fca(epe, discount_factors, time_grid, spread_borrow);
    let fba = compute_fba(ene, discount_factors, time_grid, spread_lend);
    (fca, fba, fca - fba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_profile() {
        let times = [0.0, 0.5, 1.0];
        let df = [1.0; 3];
        let fca = compute_fca(&[100.0; 3], &df, &times, 0.01);
        assert_relative_eq!(fca, 1.0, epsilon = 1e-12);
        let fba = compute_fba(&[-50.0; 3], &df, &times, 0.01);
        assert_relative_eq!(fba, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_fva_is_net() {
        let times = [0.0, 1.0];
        let df = [1.0, 0.95];
        let (fca, fba, fva) = compute_fva(&[10.0, 10.0], &[-5.0, -5.0], &df, &times, 0.01, 0.02);
        assert_relative_eq!(fva, fca - fba);
        assert_relative_eq!(fca, fba, epsilon = 1e-12);
    }
}
