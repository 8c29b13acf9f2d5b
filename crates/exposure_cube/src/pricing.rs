//! Closed-form valuation of path-independent trades on a scenario.

use exposure_core::math::black_price;
use exposure_core::{MarketDataProvider, RiskFactorId, ValuationDate, ValuationError};
use exposure_scenario::{FactorModel, ScenarioSet};

use crate::trade::{
    EquityForward, EuropeanOption, FxForward, InterestRateSwap, PathIndependentProduct,
    SwapDirection, TIME_EPS,
};

/// Everything a pricer may read at one (date, sample).
#[derive(Clone, Copy)]
pub struct ValuationContext<'a> {
    scenarios: &'a ScenarioSet,
    market: &'a dyn MarketDataProvider,
    date: ValuationDate,
    sample: usize,
}

impl<'a> ValuationContext<'a> {
    /// Context at `date` on path `sample`.
    pub fn new(
        scenarios: &'a ScenarioSet,
        market: &'a dyn MarketDataProvider,
        date: ValuationDate,
        sample: usize,
    ) -> Self {
        Self {
            scenarios,
            market,
            date,
            sample,
        }
    }

    /// Valuation date.
    #[inline]
    pub fn date(&self) -> ValuationDate {
        self.date
    }

    /// Sample index.
    #[inline]
    pub fn sample(&self) -> usize {
        self.sample
    }

    /// Year fraction of the valuation date.
    #[inline]
    pub fn time(&self) -> f64 {
        self.scenarios.time(self.date)
    }

    /// Non-simulated market input at the valuation date.
    pub fn market(&self, factor: &RiskFactorId) -> Result<f64, ValuationError> {
        self.market.value(factor, self.date)
    }

    /// Spot level of a factor; simulated if part of the model, otherwise
    /// read from market data.
    pub fn spot(&self, factor: &RiskFactorId) -> Result<f64, ValuationError> {
        match self.scenarios.value(factor, self.date, self.sample) {
            Err(ValuationError::UnsimulatedFactor { .. }) => self.market(factor),
            other => other,
        }
    }

    /// Risk-neutral drift of a simulated spot, zero otherwise.
    pub fn drift(&self, factor: &RiskFactorId) -> f64 {
        self.scenarios
            .model()
            .factors()
            .iter()
            .find_map(|f| match f {
                FactorModel::Equity(p) | FactorModel::Fx(p) if &f.factor_id() == factor => {
                    Some(p.drift)
                }
                _ => None,
            })
            .unwrap_or(0.0)
    }

    /// Discount factor from the valuation date to `maturity` in `currency`.
    ///
    /// Currencies without a simulated curve fall back to a flat `RATE/<ccy>`
    /// market quote.
    pub fn discount(&self, currency: &str, maturity: f64) -> Result<f64, ValuationError> {
        let t = self.time();
        if maturity <= t {
            return Ok(1.0);
        }
        match self
            .scenarios
            .discount_bond(currency, self.date, self.sample, maturity)
        {
            Err(ValuationError::UnsimulatedFactor { .. }) => {
                let rate = self.market(&RiskFactorId::rate(currency))?;
                Ok((-rate * (maturity - t)).exp())
            }
            other => other,
        }
    }
}

/// NPV of a path-independent product in its currency.
///
/// Trades past their final payment are worth zero. The single payment of a
/// forward or option falling on the valuation date is still included; swap
/// coupons paid on the valuation date count as settled, since the floating
/// leg is valued at par from that date.
///
/// # Errors
/// `ValuationError` if a market input or simulated factor is missing.
pub fn value_path_independent(
    product: &PathIndependentProduct,
    ctx: &ValuationContext<'_>,
) -> Result<f64, ValuationError> {
    match product {
        PathIndependentProduct::InterestRateSwap(p) => swap_npv(p, ctx),
        PathIndependentProduct::FxForward(p) => fx_forward_npv(p, ctx),
        PathIndependentProduct::EquityForward(p) => equity_forward_npv(p, ctx),
        PathIndependentProduct::EuropeanOption(p) => european_npv(p, ctx),
    }
}

/// Swap NPV with the floating leg at par from the later of start and the
/// valuation date.
pub(crate) fn swap_npv(swap: &InterestRateSwap, ctx: &ValuationContext<'_>) -> Result<f64, ValuationError> {
    let t = ctx.time();
    if t >= swap.maturity - TIME_EPS {
        return Ok(0.0);
    }
    let mut annuity = 0.0;
    for (accrual, pay) in swap.fixed_schedule() {
        if pay > t + TIME_EPS {
            annuity += accrual * ctx.discount(&swap.currency, pay)?;
        }
    }
    let fixed = swap.notional * swap.fixed_rate * annuity;
    let floating = swap.notional
        * (ctx.discount(&swap.currency, swap.start.max(t))?
            - ctx.discount(&swap.currency, swap.maturity)?);
    Ok(match swap.direction {
        SwapDirection::Payer => floating - fixed,
        SwapDirection::Receiver => fixed - floating,
    })
}

fn fx_forward_npv(fwd: &FxForward, ctx: &ValuationContext<'_>) -> Result<f64, ValuationError> {
    if ctx.time() > fwd.maturity + TIME_EPS {
        return Ok(0.0);
    }
    let spot = ctx.spot(&fwd.spot_factor())?;
    let foreign = ctx.discount(&fwd.foreign_currency, fwd.maturity)?;
    let domestic = ctx.discount(&fwd.domestic_currency, fwd.maturity)?;
    Ok(fwd.position.sign() * fwd.notional * (spot * foreign - fwd.strike * domestic))
}

fn equity_forward_npv(fwd: &EquityForward, ctx: &ValuationContext<'_>) -> Result<f64, ValuationError> {
    let tau = fwd.maturity - ctx.time();
    if tau < -TIME_EPS {
        return Ok(0.0);
    }
    let spot = ctx.spot(&fwd.underlying)?;
    let forward = spot * (ctx.drift(&fwd.underlying) * tau.max(0.0)).exp();
    let df = ctx.discount(&fwd.currency, fwd.maturity)?;
    Ok(fwd.position.sign() * fwd.quantity * df * (forward - fwd.strike))
}

fn european_npv(opt: &EuropeanOption, ctx: &ValuationContext<'_>) -> Result<f64, ValuationError> {
    let tau = opt.expiry - ctx.time();
    if tau < -TIME_EPS {
        return Ok(0.0);
    }
    let spot = ctx.spot(&opt.underlying)?;
    let scale = opt.position.sign() * opt.quantity;
    if tau <= TIME_EPS {
        return Ok(scale * opt.option_type.intrinsic(spot, opt.strike).max(0.0));
    }
    let vol = ctx.market(&opt.volatility_factor())?;
    let forward = spot * (ctx.drift(&opt.underlying) * tau).exp();
    let df = ctx.discount(&opt.currency, opt.expiry)?;
    Ok(scale
        * black_price(
            opt.option_type.is_call(),
            forward,
            opt.strike,
            vol * tau.sqrt(),
            df,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::{OptionType, Position};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use exposure_core::{DateGrid, DayCountConvention, InMemoryMarketData};
    use exposure_scenario::{
        CrossAssetModel, GbmParams, ModelSpec, ScenarioGenerator, ScenarioGeneratorConfig,
    };

    fn deterministic_scenarios() -> ScenarioSet {
        let model = CrossAssetModel::new(ModelSpec {
            base_currency: "EUR".to_string(),
            base_rate: 0.03,
            factors: vec![FactorModel::Equity(GbmParams {
                name: "SPX".to_string(),
                spot: 100.0,
                drift: 0.03,
                volatility: 0.0,
            })],
            correlation: None,
        })
        .unwrap();
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let grid = DateGrid::from_times(as_of, &[0.5, 1.0, 2.0], DayCountConvention::Act365Fixed)
            .unwrap();
        let config = ScenarioGeneratorConfig::builder().samples(2).build().unwrap();
        ScenarioGenerator::new(model, grid, config).unwrap().generate()
    }

    #[test]
    fn test_swap_at_par_rate_is_worth_zero() {
        let scenarios = deterministic_scenarios();
        let market = InMemoryMarketData::new();
        let ctx = ValuationContext::new(&scenarios, &market, ValuationDate::AsOf, 0);
        let df1 = (-0.03f64).exp();
        let df2 = (-0.06f64).exp();
        let par = (1.0 - df2) / (df1 + df2);
        let swap = InterestRateSwap {
            currency: "EUR".to_string(),
            notional: 1e6,
            fixed_rate: par,
            direction: SwapDirection::Payer,
            start: 0.0,
            maturity: 2.0,
            fixed_interval: 1.0,
        };
        assert_relative_eq!(swap_npv(&swap, &ctx).unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_swap_after_maturity_is_zero() {
        let scenarios = deterministic_scenarios();
        let market = InMemoryMarketData::new();
        let ctx = ValuationContext::new(&scenarios, &market, ValuationDate::Simulation(2), 0);
        let swap = InterestRateSwap {
            currency: "EUR".to_string(),
            notional: 1e6,
            fixed_rate: 0.05,
            direction: SwapDirection::Receiver,
            start: 0.0,
            maturity: 2.0,
            fixed_interval: 0.5,
        };
        assert_eq!(swap_npv(&swap, &ctx).unwrap(), 0.0);
    }

    #[test]
    fn test_swap_coupon_on_valuation_date_is_settled() {
        let scenarios = deterministic_scenarios();
        let market = InMemoryMarketData::new();
        let ctx = ValuationContext::new(&scenarios, &market, ValuationDate::Simulation(1), 0);
        let swap = InterestRateSwap {
            currency: "EUR".to_string(),
            notional: 1e6,
            fixed_rate: 0.05,
            direction: SwapDirection::Payer,
            start: 0.0,
            maturity: 2.0,
            fixed_interval: 1.0,
        };
        // Only the coupon at 2Y is left at t = 1.
        let df = (-0.03f64).exp();
        let expected = 1e6 * ((1.0 - df) - 0.05 * df);
        assert_relative_eq!(swap_npv(&swap, &ctx).unwrap(), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_equity_forward_at_model_forward_is_zero() {
        let scenarios = deterministic_scenarios();
        let market = InMemoryMarketData::new();
        let ctx = ValuationContext::new(&scenarios, &market, ValuationDate::AsOf, 0);
        let fwd = EquityForward {
            underlying: RiskFactorId::equity("SPX"),
            currency: "EUR".to_string(),
            quantity: 10.0,
            strike: 100.0 * (0.03f64).exp(),
            maturity: 1.0,
            position: Position::Long,
        };
        assert_relative_eq!(equity_forward_npv(&fwd, &ctx).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_european_needs_volatility() {
        let scenarios = deterministic_scenarios();
        let opt = EuropeanOption {
            underlying: RiskFactorId::equity("SPX"),
            currency: "EUR".to_string(),
            option_type: OptionType::Call,
            strike: 100.0 * (0.03f64).exp(),
            expiry: 1.0,
            quantity: 1.0,
            position: Position::Long,
        };
        let empty = InMemoryMarketData::new();
        let ctx = ValuationContext::new(&scenarios, &empty, ValuationDate::Simulation(0), 0);
        assert!(matches!(
            european_npv(&opt, &ctx),
            Err(ValuationError::MissingMarketData { .. })
        ));

        let market = InMemoryMarketData::new().with_quote(RiskFactorId::volatility("SPX"), 0.2);
        let ctx = ValuationContext::new(&scenarios, &market, ValuationDate::AsOf, 0);
        // ATM-forward call: S * (2 N(sigma / 2) - 1)
        let expected = 100.0 * (2.0 * exposure_core::math::norm_cdf(0.1) - 1.0);
        assert_relative_eq!(european_npv(&opt, &ctx).unwrap(), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_european_at_expiry_pays_intrinsic() {
        let scenarios = deterministic_scenarios();
        let market = InMemoryMarketData::new();
        let opt = EuropeanOption {
            underlying: RiskFactorId::equity("SPX"),
            currency: "EUR".to_string(),
            option_type: OptionType::Put,
            strike: 110.0,
            expiry: 1.0,
            quantity: 2.0,
            position: Position::Short,
        };
        let ctx = ValuationContext::new(&scenarios, &market, ValuationDate::Simulation(1), 0);
        let spot = 100.0 * (0.03f64).exp();
        assert_relative_eq!(
            european_npv(&opt, &ctx).unwrap(),
            -2.0 * (110.0 - spot),
            epsilon = 1e-9
        );
        let after = ValuationContext::new(&scenarios, &market, ValuationDate::Simulation(2), 0);
        assert_eq!(european_npv(&opt, &after).unwrap(), 0.0);
    }

    #[test]
    fn test_unsimulated_currency_falls_back_to_rate_quote() {
        let scenarios = deterministic_scenarios();
        let market = InMemoryMarketData::new().with_quote(RiskFactorId::rate("USD"), 0.05);
        let ctx = ValuationContext::new(&scenarios, &market, ValuationDate::AsOf, 0);
        assert_relative_eq!(ctx.discount("USD", 2.0).unwrap(), (-0.1f64).exp());
        assert!(ctx.discount("GBP", 2.0).is_err());
        assert_eq!(ctx.discount("GBP", 0.0).unwrap(), 1.0);
    }
}
