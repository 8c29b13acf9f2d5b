//! Trade representation.
//!
//! Trades are a closed set of tagged variants. The top-level split between
//! [`PathIndependentProduct`] and [`EarlyExerciseProduct`] selects the
//! [`ValuationStrategy`]; no runtime type inspection is involved.
//!
//! All times are year fractions from the as-of date of the run.

use exposure_core::{ConfigurationError, NettingSetId, RiskFactorId, TradeId};
use serde::{Deserialize, Serialize};

/// Tolerance when comparing year fractions.
pub(crate) const TIME_EPS: f64 = 1e-10;

/// Shortest fixed leg accrual period accepted: one day.
pub const MIN_FIXED_INTERVAL: f64 = 1.0 / 365.0;

/// Direction of a fixed-float swap, seen from the fixed leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Pay fixed, receive floating
    Payer,
    /// Receive fixed, pay floating
    Receiver,
}

/// Call or put.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    /// Right to buy
    Call,
    /// Right to sell
    Put,
}

impl OptionType {
    /// Exercise value per unit at spot `spot`.
    #[inline]
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionType::Call => spot - strike,
            OptionType::Put => strike - spot,
        }
    }

    /// True for calls.
    #[inline]
    pub fn is_call(&self) -> bool {
        matches!(self, OptionType::Call)
    }
}

/// Long or short holding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// Bought
    #[default]
    Long,
    /// Sold
    Short,
}

impl Position {
    /// `+1` for long, `-1` for short.
    #[inline]
    pub fn sign(&self) -> f64 {
        match self {
            Position::Long => 1.0,
            Position::Short => -1.0,
        }
    }
}

/// What exercising an option delivers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Settlement {
    /// Exercise value paid in cash on the exercise date
    Cash,
    /// The underlying is entered on the exercise date
    #[default]
    Physical,
}

fn default_fixed_interval() -> f64 {
    1.0
}

/// Fixed versus floating interest rate swap.
///
/// The floating leg is valued at par on the valuation date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterestRateSwap {
    /// Currency of both legs
    pub currency: String,
    /// Notional
    pub notional: f64,
    /// Fixed coupon rate
    pub fixed_rate: f64,
    /// Payer or receiver of the fixed leg
    pub direction: SwapDirection,
    /// Accrual start
    #[serde(default)]
    pub start: f64,
    /// Final payment
    pub maturity: f64,
    /// Fixed leg accrual period
    #[serde(default = "default_fixed_interval")]
    pub fixed_interval: f64,
}

impl InterestRateSwap {
    /// Fixed leg `(accrual, payment time)` pairs, with a short final stub if
    /// the interval does not divide the swap length.
    pub fn fixed_schedule(&self) -> Vec<(f64, f64)> {
        let mut schedule = Vec::new();
        let mut previous = self.start;
        let mut k = 1;
        loop {
            let t = (self.start + k as f64 * self.fixed_interval).min(self.maturity);
            let last = t >= self.maturity - TIME_EPS;
            let t = if last { self.maturity } else { t };
            schedule.push((t - previous, t));
            if last {
                break;
            }
            previous = t;
            k += 1;
        }
        schedule
    }

    fn validate(&self) -> Result<(), String> {
        positive("notional", self.notional)?;
        positive("fixed_interval", self.fixed_interval)?;
        if self.fixed_interval < MIN_FIXED_INTERVAL - TIME_EPS {
            return Err(format!(
                "fixed_interval must be at least one day, got {}",
                self.fixed_interval
            ));
        }
        finite("fixed_rate", self.fixed_rate)?;
        if !(self.start >= 0.0 && self.start.is_finite()) {
            return Err(format!("start must be non-negative, got {}", self.start));
        }
        if !(self.maturity > self.start + TIME_EPS && self.maturity.is_finite()) {
            return Err(format!(
                "maturity {} must be after start {}",
                self.maturity, self.start
            ));
        }
        Ok(())
    }
}

/// Exchange of `notional` units of foreign currency against
/// `notional * strike` units of domestic currency at maturity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FxForward {
    /// Currency bought when long
    pub foreign_currency: String,
    /// Currency paid when long; must be the base currency of the run
    pub domestic_currency: String,
    /// Foreign currency amount
    pub notional: f64,
    /// Contract rate, domestic per foreign
    pub strike: f64,
    /// Settlement time
    pub maturity: f64,
    /// Long buys the foreign currency
    #[serde(default)]
    pub position: Position,
}

impl FxForward {
    /// Spot factor, quoted domestic per foreign.
    pub fn spot_factor(&self) -> RiskFactorId {
        RiskFactorId::fx(&format!(
            "{}{}",
            self.foreign_currency, self.domestic_currency
        ))
    }

    fn validate(&self) -> Result<(), String> {
        positive("notional", self.notional)?;
        positive("strike", self.strike)?;
        positive("maturity", self.maturity)?;
        if self.foreign_currency == self.domestic_currency {
            return Err("foreign and domestic currency must differ".to_string());
        }
        Ok(())
    }
}

/// Forward purchase of `quantity` units of a lognormal spot at `strike`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquityForward {
    /// Spot factor, e.g. `EQ/SPX`
    pub underlying: RiskFactorId,
    /// Currency of the strike payment
    pub currency: String,
    /// Number of units
    pub quantity: f64,
    /// Forward price
    pub strike: f64,
    /// Settlement time
    pub maturity: f64,
    /// Long buys the underlying
    #[serde(default)]
    pub position: Position,
}

impl EquityForward {
    fn validate(&self) -> Result<(), String> {
        positive("quantity", self.quantity)?;
        positive("strike", self.strike)?;
        positive("maturity", self.maturity)
    }
}

/// European option on a lognormal spot, priced with Black-Scholes.
///
/// The volatility is read from the market data provider under
/// `VOL/<underlying name>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EuropeanOption {
    /// Spot factor, e.g. `EQ/SPX` or `FX/USDEUR`
    pub underlying: RiskFactorId,
    /// Currency of the payoff
    pub currency: String,
    /// Call or put
    pub option_type: OptionType,
    /// Strike
    pub strike: f64,
    /// Expiry and payment time
    pub expiry: f64,
    /// Number of units
    pub quantity: f64,
    /// Bought or sold
    #[serde(default)]
    pub position: Position,
}

impl EuropeanOption {
    /// Market data key of the implied volatility.
    pub fn volatility_factor(&self) -> RiskFactorId {
        volatility_factor(&self.underlying)
    }

    fn validate(&self) -> Result<(), String> {
        positive("quantity", self.quantity)?;
        positive("strike", self.strike)?;
        positive("expiry", self.expiry)
    }
}

/// Cash-settled option on a lognormal spot, exercisable on a set of dates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BermudanOption {
    /// Spot factor, e.g. `EQ/SPX`
    pub underlying: RiskFactorId,
    /// Currency of the payoff
    pub currency: String,
    /// Call or put
    pub option_type: OptionType,
    /// Strike
    pub strike: f64,
    /// Exercise times, strictly increasing
    pub exercise_times: Vec<f64>,
    /// Number of units
    pub quantity: f64,
    /// Bought or sold
    #[serde(default)]
    pub position: Position,
}

/// Option to enter the remaining part of an interest rate swap on a set of dates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BermudanSwaption {
    /// Swap entered on exercise
    pub underlying: InterestRateSwap,
    /// Exercise times, strictly increasing and before the swap maturity
    pub exercise_times: Vec<f64>,
    /// Cash or physical delivery
    #[serde(default)]
    pub settlement: Settlement,
    /// Bought or sold
    #[serde(default)]
    pub position: Position,
}

/// Products valued as a pure function of the scenario at one (date, sample).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PathIndependentProduct {
    /// Fixed-float swap
    InterestRateSwap(InterestRateSwap),
    /// FX forward
    FxForward(FxForward),
    /// Equity forward
    EquityForward(EquityForward),
    /// European option
    EuropeanOption(EuropeanOption),
}

impl PathIndependentProduct {
    /// Currency the NPV is expressed in.
    pub fn currency(&self) -> &str {
        match self {
            PathIndependentProduct::InterestRateSwap(p) => &p.currency,
            PathIndependentProduct::FxForward(p) => &p.domestic_currency,
            PathIndependentProduct::EquityForward(p) => &p.currency,
            PathIndependentProduct::EuropeanOption(p) => &p.currency,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            PathIndependentProduct::InterestRateSwap(p) => p.validate(),
            PathIndependentProduct::FxForward(p) => p.validate(),
            PathIndependentProduct::EquityForward(p) => p.validate(),
            PathIndependentProduct::EuropeanOption(p) => p.validate(),
        }
    }
}

/// Products whose value depends on an exercise decision along the path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EarlyExerciseProduct {
    /// Bermudan option on a spot
    BermudanOption(BermudanOption),
    /// Bermudan swaption
    BermudanSwaption(BermudanSwaption),
}

impl EarlyExerciseProduct {
    /// Currency the NPV is expressed in.
    pub fn currency(&self) -> &str {
        match self {
            EarlyExerciseProduct::BermudanOption(p) => &p.currency,
            EarlyExerciseProduct::BermudanSwaption(p) => &p.underlying.currency,
        }
    }

    /// Exercise times, ascending.
    pub fn exercise_times(&self) -> &[f64] {
        match self {
            EarlyExerciseProduct::BermudanOption(p) => &p.exercise_times,
            EarlyExerciseProduct::BermudanSwaption(p) => &p.exercise_times,
        }
    }

    /// Holding direction.
    pub fn position(&self) -> Position {
        match self {
            EarlyExerciseProduct::BermudanOption(p) => p.position,
            EarlyExerciseProduct::BermudanSwaption(p) => p.position,
        }
    }

    /// Delivery on exercise.
    pub fn settlement(&self) -> Settlement {
        match self {
            EarlyExerciseProduct::BermudanOption(_) => Settlement::Cash,
            EarlyExerciseProduct::BermudanSwaption(p) => p.settlement,
        }
    }

    fn validate(&self) -> Result<(), String> {
        let times = self.exercise_times();
        if times.is_empty() {
            return Err("at least one exercise time is required".to_string());
        }
        if !(times[0] > 0.0) {
            return Err(format!("exercise times must be positive, got {}", times[0]));
        }
        if let Some(w) = times.windows(2).find(|w| !(w[1] > w[0] + TIME_EPS)) {
            return Err(format!(
                "exercise times must be strictly increasing, got {} then {}",
                w[0], w[1]
            ));
        }
        match self {
            EarlyExerciseProduct::BermudanOption(p) => {
                positive("quantity", p.quantity)?;
                positive("strike", p.strike)
            }
            EarlyExerciseProduct::BermudanSwaption(p) => {
                p.underlying.validate()?;
                let last = times[times.len() - 1];
                if last >= p.underlying.maturity - TIME_EPS {
                    return Err(format!(
                        "last exercise {} must be before swap maturity {}",
                        last, p.underlying.maturity
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Trade kind; the variant fixes the valuation strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TradeKind {
    /// Valued date by date from the scenario
    PathIndependent(PathIndependentProduct),
    /// Valued with American Monte Carlo
    EarlyExercise(EarlyExerciseProduct),
}

/// How a trade is valued on the cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValuationStrategy {
    /// Closed-form pricing from the scenario at each (date, sample)
    PathIndependent,
    /// Frozen continuation regressions and a forward exercise pass
    AmericanMonteCarlo,
}

impl TradeKind {
    /// Valuation strategy for this kind.
    pub fn strategy(&self) -> ValuationStrategy {
        match self {
            TradeKind::PathIndependent(_) => ValuationStrategy::PathIndependent,
            TradeKind::EarlyExercise(_) => ValuationStrategy::AmericanMonteCarlo,
        }
    }

    /// Currency the NPV is expressed in.
    pub fn currency(&self) -> &str {
        match self {
            TradeKind::PathIndependent(p) => p.currency(),
            TradeKind::EarlyExercise(p) => p.currency(),
        }
    }
}

/// A trade booked in a netting set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    id: TradeId,
    netting_set: NettingSetId,
    product: TradeKind,
}

impl Trade {
    /// Creates a trade.
    pub fn new(id: impl Into<TradeId>, netting_set: impl Into<NettingSetId>, product: TradeKind) -> Self {
        Self {
            id: id.into(),
            netting_set: netting_set.into(),
            product,
        }
    }

    /// Trade identifier.
    #[inline]
    pub fn id(&self) -> &TradeId {
        &self.id
    }

    /// Netting set the trade belongs to.
    #[inline]
    pub fn netting_set_id(&self) -> &NettingSetId {
        &self.netting_set
    }

    /// Product terms.
    #[inline]
    pub fn kind(&self) -> &TradeKind {
        &self.product
    }

    /// Valuation strategy.
    #[inline]
    pub fn strategy(&self) -> ValuationStrategy {
        self.product.strategy()
    }

    /// Checks the product terms.
    ///
    /// # Errors
    /// `ConfigurationError::InvalidParameter` naming the trade.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let result = match &self.product {
            TradeKind::PathIndependent(p) => p.validate(),
            TradeKind::EarlyExercise(p) => p.validate(),
        };
        result.map_err(|reason| ConfigurationError::invalid(format!("trade {}", self.id), reason))
    }
}

/// Market data key of the volatility of a spot factor: `EQ/SPX` -> `VOL/SPX`.
pub fn volatility_factor(underlying: &RiskFactorId) -> RiskFactorId {
    let s = underlying.as_str();
    let name = s.split_once('/').map_or(s, |(_, name)| name);
    RiskFactorId::volatility(name)
}

fn positive(name: &str, value: f64) -> Result<(), String> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(format!("{} must be positive, got {}", name, value))
    }
}

fn finite(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(format!("{} must be finite", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn swap(start: f64, maturity: f64, interval: f64) -> InterestRateSwap {
        InterestRateSwap {
            currency: "EUR".to_string(),
            notional: 1e6,
            fixed_rate: 0.02,
            direction: SwapDirection::Receiver,
            start,
            maturity,
            fixed_interval: interval,
        }
    }

    #[test]
    fn test_fixed_schedule_regular() {
        let s = swap(0.0, 2.0, 0.5).fixed_schedule();
        assert_eq!(s.len(), 4);
        assert_relative_eq!(s[3].1, 2.0);
        assert!(s.iter().all(|(tau, _)| (tau - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_fixed_schedule_short_stub() {
        let s = swap(1.0, 2.75, 1.0).fixed_schedule();
        assert_eq!(s.len(), 2);
        assert_relative_eq!(s[0].1, 2.0);
        assert_relative_eq!(s[1].0, 0.75, epsilon = 1e-12);
        assert_relative_eq!(s[1].1, 2.75);
    }

    #[test]
    fn test_strategy_follows_kind() {
        let irs = TradeKind::PathIndependent(PathIndependentProduct::InterestRateSwap(swap(
            0.0, 5.0, 1.0,
        )));
        assert_eq!(irs.strategy(), ValuationStrategy::PathIndependent);

        let berm = TradeKind::EarlyExercise(EarlyExerciseProduct::BermudanSwaption(
            BermudanSwaption {
                underlying: swap(1.0, 5.0, 1.0),
                exercise_times: vec![1.0, 2.0, 3.0],
                settlement: Settlement::Physical,
                position: Position::Long,
            },
        ));
        assert_eq!(berm.strategy(), ValuationStrategy::AmericanMonteCarlo);
        assert_eq!(berm.currency(), "EUR");
    }

    #[test]
    fn test_validation_rejects_bad_terms() {
        let bad = Trade::new(
            "T1",
            "NS1",
            TradeKind::PathIndependent(PathIndependentProduct::InterestRateSwap(swap(
                2.0, 1.0, 1.0,
            ))),
        );
        let err = bad.validate().unwrap_err();
        assert!(err.to_string().contains("trade T1"));

        let late_exercise = Trade::new(
            "T2",
            "NS1",
            TradeKind::EarlyExercise(EarlyExerciseProduct::BermudanSwaption(BermudanSwaption {
                underlying: swap(0.0, 3.0, 1.0),
                exercise_times: vec![1.0, 3.0],
                settlement: Settlement::Cash,
                position: Position::Long,
            })),
        );
        assert!(late_exercise.validate().is_err());

        let unordered = Trade::new(
            "T3",
            "NS1",
            TradeKind::EarlyExercise(EarlyExerciseProduct::BermudanOption(BermudanOption {
                underlying: RiskFactorId::equity("SPX"),
                currency: "EUR".to_string(),
                option_type: OptionType::Put,
                strike: 100.0,
                exercise_times: vec![1.0, 0.5],
                quantity: 1.0,
                position: Position::Long,
            })),
        );
        assert!(unordered.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_sub_daily_interval() {
        let irs = |interval| {
            Trade::new(
                "T1",
                "NS1",
                TradeKind::PathIndependent(PathIndependentProduct::InterestRateSwap(swap(
                    0.0, 30.0, interval,
                ))),
            )
        };
        let err = irs(1e-12).validate().unwrap_err();
        assert!(err.to_string().contains("fixed_interval"));
        assert!(irs(MIN_FIXED_INTERVAL).validate().is_ok());

        let swaption = Trade::new(
            "T2",
            "NS1",
            TradeKind::EarlyExercise(EarlyExerciseProduct::BermudanSwaption(BermudanSwaption {
                underlying: swap(0.0, 5.0, 1e-9),
                exercise_times: vec![1.0],
                settlement: Settlement::Physical,
                position: Position::Long,
            })),
        );
        assert!(swaption.validate().is_err());
    }

    #[test]
    fn test_volatility_factor_uses_underlying_name() {
        assert_eq!(
            volatility_factor(&RiskFactorId::equity("SPX")),
            RiskFactorId::volatility("SPX")
        );
        assert_eq!(
            volatility_factor(&RiskFactorId::fx("USDEUR")),
            RiskFactorId::volatility("USDEUR")
        );
    }
}
