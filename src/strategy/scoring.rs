//! Scoring Functions
//!
//! Each scoring function compares two adjacent evaluation points
//! (`target_index - 1` and `target_index`) and turns a crossover into a
//! signal in [-1, 1].

use std::fmt::Debug;

use crate::domain::period::{PricePeriod, PriceSource};
use super::indicators::{
    calculate_ema, calculate_stochastic_d, calculate_stochastic_k, check_lookback, check_smoothing,
    check_target, IndicatorError,
};

/// A configured scoring function, resolved once at startup
pub trait ScoringFunction: Send + Sync + Debug {
    /// Registry tag of this function
    fn name(&self) -> &'static str;

    /// Minimum history length needed to score the newest period
    fn lookback(&self) -> usize;

    /// Score in [-1, 1] at `target_index`
    fn score(&self, data: &[PricePeriod], target_index: usize) -> Result<f64, IndicatorError>;
}

/// Value at the previous and current evaluation point
#[derive(Debug, Clone, Copy)]
struct Pair {
    previous: f64,
    current: f64,
}

impl Pair {
    fn crosses_above(&self, other: &Pair) -> bool {
        self.previous <= other.previous && self.current > other.current
    }

    fn crosses_below(&self, other: &Pair) -> bool {
        self.previous > other.previous && self.current <= other.current
    }

    fn crosses_above_level(&self, level: f64) -> bool {
        self.previous <= level && self.current > level
    }

    fn crosses_below_level(&self, level: f64) -> bool {
        self.previous > level && self.current <= level
    }
}

fn check_adjacent(data: &[PricePeriod], target_index: usize) -> Result<(), IndicatorError> {
    check_target(data, target_index)?;
    if target_index < 1 {
        return Err(IndicatorError::TargetOutOfRange {
            index: target_index,
            len: data.len(),
        });
    }
    Ok(())
}

/// EMA crossover score.
///
/// `periods[0]` is the fast EMA; every other entry is a slow comparator worth
/// `1 / (N - 1)`. Fast crossing above a comparator adds its share, crossing
/// below or onto it subtracts it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaScore {
    periods: Vec<usize>,
    smoothing: f64,
    source: PriceSource,
}

impl EmaScore {
    pub const NAME: &'static str = "emaScore";

    pub fn new(periods: Vec<usize>, smoothing: f64, source: PriceSource) -> Result<Self, IndicatorError> {
        if periods.len() < 2 {
            return Err(IndicatorError::InvalidArguments {
                function: Self::NAME.to_string(),
                reason: format!("need a fast and at least one slow window, got {:?}", periods),
            });
        }
        if let Some(&bad) = periods.iter().find(|&&n| n == 0) {
            return Err(IndicatorError::InvalidPeriods(bad));
        }
        check_smoothing(smoothing)?;

        Ok(Self {
            periods,
            smoothing,
            source,
        })
    }

    pub fn periods(&self) -> &[usize] {
        &self.periods
    }

    fn ema_pair(&self, data: &[PricePeriod], n: usize, target_index: usize) -> Result<Pair, IndicatorError> {
        Ok(Pair {
            previous: calculate_ema(data, n, target_index - 1, self.smoothing, self.source)?,
            current: calculate_ema(data, n, target_index, self.smoothing, self.source)?,
        })
    }
}

impl ScoringFunction for EmaScore {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn lookback(&self) -> usize {
        let widest = self.periods.iter().copied().max().unwrap_or(0);
        2 * widest + 1
    }

    fn score(&self, data: &[PricePeriod], target_index: usize) -> Result<f64, IndicatorError> {
        check_adjacent(data, target_index)?;
        // Double lookback evaluated at target_index - 1
        for &n in &self.periods {
            check_lookback(target_index - 1, 2 * n)?;
        }

        let fast = self.ema_pair(data, self.periods[0], target_index)?;
        let share = 1.0 / (self.periods.len() - 1) as f64;

        let mut score = 0.0;
        for &n in &self.periods[1..] {
            let slow = self.ema_pair(data, n, target_index)?;
            if fast.crosses_above(&slow) {
                score += share;
            } else if fast.crosses_below(&slow) {
                score -= share;
            }
        }

        Ok(score)
    }
}

/// Stochastic oscillator score.
///
/// Two half-weight signals: %K crossing %D, and %K breaking out of the
/// overbought/oversold band. When %K is already beyond either level the
/// running score is pulled 0.25 toward zero to avoid chasing an exhausted move.
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticScore {
    k_periods: usize,
    d_periods: usize,
    overbought: f64,
    oversold: f64,
    source: PriceSource,
}

impl StochasticScore {
    pub const NAME: &'static str = "stochasticScore";

    const SIGNAL_WEIGHT: f64 = 0.5;
    const DAMPENING_STEP: f64 = 0.25;

    pub fn new(
        k_periods: usize,
        d_periods: usize,
        overbought: f64,
        oversold: f64,
        source: PriceSource,
    ) -> Result<Self, IndicatorError> {
        if k_periods == 0 {
            return Err(IndicatorError::InvalidPeriods(k_periods));
        }
        if d_periods == 0 {
            return Err(IndicatorError::InvalidPeriods(d_periods));
        }
        let in_range = |level: f64| (0.0..=100.0).contains(&level);
        if !(in_range(overbought) && in_range(oversold) && oversold < overbought) {
            return Err(IndicatorError::InvalidLevels { overbought, oversold });
        }

        Ok(Self {
            k_periods,
            d_periods,
            overbought,
            oversold,
            source,
        })
    }
}

impl ScoringFunction for StochasticScore {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn lookback(&self) -> usize {
        self.k_periods + self.d_periods + 1
    }

    fn score(&self, data: &[PricePeriod], target_index: usize) -> Result<f64, IndicatorError> {
        check_adjacent(data, target_index)?;
        check_lookback(target_index - 1, self.k_periods + self.d_periods)?;

        let k = Pair {
            previous: calculate_stochastic_k(data, self.k_periods, target_index - 1, self.source)?,
            current: calculate_stochastic_k(data, self.k_periods, target_index, self.source)?,
        };
        let d = Pair {
            previous: calculate_stochastic_d(data, self.k_periods, self.d_periods, target_index - 1, self.source)?,
            current: calculate_stochastic_d(data, self.k_periods, self.d_periods, target_index, self.source)?,
        };

        let mut score = 0.0;

        if k.crosses_above(&d) {
            score += Self::SIGNAL_WEIGHT;
        } else if k.crosses_below(&d) {
            score -= Self::SIGNAL_WEIGHT;
        }

        if k.crosses_above_level(self.overbought) {
            score += Self::SIGNAL_WEIGHT;
        } else if k.crosses_below_level(self.oversold) {
            score -= Self::SIGNAL_WEIGHT;
        }

        // Applies to any score, strong buys included
        if k.current > self.overbought || k.current <= self.oversold {
            score = toward_zero(score, Self::DAMPENING_STEP);
        }

        Ok(score.clamp(-1.0, 1.0))
    }
}

/// Move `value` toward zero by `step` without crossing it
fn toward_zero(value: f64, step: f64) -> f64 {
    if value > 0.0 {
        (value - step).max(0.0)
    } else {
        (value + step).min(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::indicators::tests::{flat_periods, periods};
    use approx::assert_relative_eq;

    fn ema(periods: Vec<usize>) -> EmaScore {
        EmaScore::new(periods, 2.0, PriceSource::Close).unwrap()
    }

    /// Bars with a fixed 90-110 range so that 1-period %K = (close - 90) * 5
    fn banded(closes: &[f64]) -> Vec<PricePeriod> {
        let bars: Vec<_> = closes.iter().map(|&c| (c, 110.0, 90.0, c)).collect();
        periods(&bars)
    }

    fn stochastic() -> StochasticScore {
        StochasticScore::new(1, 2, 80.0, 20.0, PriceSource::Close).unwrap()
    }

    #[test]
    fn test_ema_fast_crosses_above() {
        let data = flat_periods(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 9.0, 12.0]);
        assert_eq!(ema(vec![1, 3]).score(&data, 7).unwrap(), 1.0);
    }

    #[test]
    fn test_ema_fast_crosses_below() {
        let data = flat_periods(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 11.0, 8.0]);
        assert_eq!(ema(vec![1, 3]).score(&data, 7).unwrap(), -1.0);
    }

    #[test]
    fn test_ema_no_cross_is_zero() {
        let data = flat_periods(&[10.0; 8]);
        assert_eq!(ema(vec![1, 3]).score(&data, 7).unwrap(), 0.0);

        // Fast stays above slow: no crossing
        let data = flat_periods(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 12.0, 13.0]);
        assert_eq!(ema(vec![1, 3]).score(&data, 7).unwrap(), 0.0);
    }

    #[test]
    fn test_ema_comparators_share_weight() {
        let data = flat_periods(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 9.0, 12.0]);
        assert_relative_eq!(ema(vec![1, 2, 3]).score(&data, 7).unwrap(), 1.0);
    }

    #[test]
    fn test_ema_validation() {
        let data = flat_periods(&[10.0; 8]);
        assert!(matches!(
            EmaScore::new(vec![3], 2.0, PriceSource::Close),
            Err(IndicatorError::InvalidArguments { .. })
        ));
        assert_eq!(
            EmaScore::new(vec![3, 0], 2.0, PriceSource::Close),
            Err(IndicatorError::InvalidPeriods(0))
        );
        assert!(EmaScore::new(vec![1, 3], 0.0, PriceSource::Close).is_err());

        assert!(matches!(
            ema(vec![1, 3]).score(&data, 0),
            Err(IndicatorError::TargetOutOfRange { .. })
        ));
        assert!(matches!(
            ema(vec![1, 3]).score(&data, 8),
            Err(IndicatorError::TargetOutOfRange { .. })
        ));
        // 3-period EMA at index 4 needs index >= 6
        assert!(matches!(
            ema(vec![1, 3]).score(&data, 5),
            Err(IndicatorError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_ema_lookback() {
        let scorer = ema(vec![9, 21]);
        assert_eq!(scorer.lookback(), 43);
        let data = flat_periods(&[10.0; 43]);
        assert!(scorer.score(&data, 42).is_ok());
        assert!(scorer.score(&data, 41).is_err());
    }

    #[test]
    fn test_stochastic_bullish_cross() {
        // %K: 50, 40, 60 -> crosses above %D (45 -> 50)
        let data = banded(&[100.0, 100.0, 98.0, 102.0]);
        assert_relative_eq!(stochastic().score(&data, 3).unwrap(), 0.5);
    }

    #[test]
    fn test_stochastic_bearish_cross() {
        // %K: 50, 60, 40 -> crosses below %D (55 -> 50)
        let data = banded(&[100.0, 100.0, 102.0, 98.0]);
        assert_relative_eq!(stochastic().score(&data, 3).unwrap(), -0.5);
    }

    #[test]
    fn test_stochastic_overbought_breakout_dampened() {
        // %K: 70, 75, 90 -> breaks above 80, then dampened since already overbought
        let data = banded(&[104.0, 104.0, 105.0, 108.0]);
        assert_relative_eq!(stochastic().score(&data, 3).unwrap(), 0.25);
    }

    #[test]
    fn test_stochastic_dampener_trims_strong_buy_when_overbought() {
        // %K: 75, 70, 90 -> crosses above %D (72.5 -> 80) and breaks above 80
        let data = banded(&[105.0, 105.0, 104.0, 108.0]);
        assert_relative_eq!(stochastic().score(&data, 3).unwrap(), 0.75);
    }

    #[test]
    fn test_stochastic_oversold_breakdown_is_negative() {
        // %K: 30, 25, 10 -> breaks below 20
        let data = banded(&[96.0, 96.0, 95.0, 92.0]);
        let score = stochastic().score(&data, 3).unwrap();
        assert!(score < 0.0);
        assert_relative_eq!(score, -0.25);
    }

    #[test]
    fn test_stochastic_dampener_does_not_flip_sign() {
        // %K: 85, 90, 88 -> crosses below %D while overbought
        let data = banded(&[107.0, 107.0, 108.0, 107.6]);
        let score = stochastic().score(&data, 3).unwrap();
        assert!(score <= 0.0);
        assert_relative_eq!(score, -0.25);

        let data = banded(&[108.0, 108.0, 108.0, 108.0]);
        assert_eq!(stochastic().score(&data, 3).unwrap(), 0.0);
    }

    #[test]
    fn test_stochastic_validation() {
        assert!(matches!(
            StochasticScore::new(14, 3, 20.0, 80.0, PriceSource::Close),
            Err(IndicatorError::InvalidLevels { .. })
        ));
        assert!(StochasticScore::new(14, 3, 120.0, 20.0, PriceSource::Close).is_err());
        assert_eq!(
            StochasticScore::new(0, 3, 80.0, 20.0, PriceSource::Close),
            Err(IndicatorError::InvalidPeriods(0))
        );

        let data = banded(&[100.0, 100.0, 100.0]);
        assert!(matches!(
            stochastic().score(&data, 2),
            Err(IndicatorError::InsufficientData { .. })
        ));
        assert_eq!(stochastic().lookback(), 4);
    }
}
