//! Standard normal distribution functions.
//!
//! `norm_cdf` uses the Abramowitz and Stegun 7.1.26 complementary error
//! function approximation (absolute error below 1.5e-7).

const FRAC_1_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

#[inline]
fn erfc_approx(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + P * abs_x);
    let poly = A1 + t * (A2 + t * (A3 + t * (A4 + t * A5)));
    let erfc_abs = t * poly * (-abs_x * abs_x).exp();

    if x < 0.0 {
        2.0 - erfc_abs
    } else {
        erfc_abs
    }
}

/// Standard normal cumulative distribution function.
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc_approx(-x / std::f64::consts::SQRT_2)
}

/// Standard normal probability density function.
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    FRAC_1_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Black-Scholes forward price of a call or put on a lognormal underlying.
///
/// `forward` and `strike` in price units, `total_vol` is `sigma * sqrt(T)`,
/// `discount` the discount factor to expiry. Zero volatility returns the
/// discounted intrinsic value.
pub fn black_price(is_call: bool, forward: f64, strike: f64, total_vol: f64, discount: f64) -> f64 {
    let intrinsic = if is_call {
        (forward - strike).max(0.0)
    } else {
        (strike - forward).max(0.0)
    };
    if total_vol <= 0.0 || forward <= 0.0 || strike <= 0.0 {
        return discount * intrinsic;
    }
    let d1 = ((forward / strike).ln() + 0.5 * total_vol * total_vol) / total_vol;
    let d2 = d1 - total_vol;
    if is_call {
        discount * (forward * norm_cdf(d1) - strike * norm_cdf(d2))
    } else {
        discount * (strike * norm_cdf(-d2) - forward * norm_cdf(-d1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_norm_cdf_values() {
        assert_relative_eq!(norm_cdf(0.0), 0.5, epsilon = 1e-7);
        assert_relative_eq!(norm_cdf(1.96), 0.975_002_1, epsilon = 1e-6);
        assert_relative_eq!(norm_cdf(-1.0), 0.158_655_3, epsilon = 1e-6);
    }

    #[test]
    fn test_norm_pdf_at_zero() {
        assert_relative_eq!(norm_pdf(0.0), FRAC_1_SQRT_2PI, epsilon = 1e-15);
    }

    #[test]
    fn test_black_put_call_parity() {
        let (f, k, v, df) = (105.0, 100.0, 0.2, 0.95);
        let c = black_price(true, f, k, v, df);
        let p = black_price(false, f, k, v, df);
        assert_relative_eq!(c - p, df * (f - k), epsilon = 1e-6);
    }

    #[test]
    fn test_black_zero_vol_is_intrinsic() {
        assert_relative_eq!(black_price(true, 110.0, 100.0, 0.0, 0.9), 9.0, epsilon = 1e-12);
        assert_relative_eq!(black_price(false, 110.0, 100.0, 0.0, 0.9), 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_norm_cdf_symmetric(x in -8.0f64..8.0) {
            prop_assert!((norm_cdf(x) + norm_cdf(-x) - 1.0).abs() < 1e-7);
        }

        #[test]
        fn prop_norm_cdf_in_unit_interval(x in -40.0f64..40.0) {
            let p = norm_cdf(x);
            prop_assert!((0.0..=1.0).contains(&p));
        }
    }
}
