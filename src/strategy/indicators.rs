//! Indicator Library
//!
//! Moving averages and the stochastic oscillator evaluated at a single index of
//! an ordered price history. Every function validates its window against the
//! available history and fails instead of clamping.

use thiserror::Error;

use crate::domain::period::{InvalidSource, PricePeriod, PriceSource};

/// Default EMA smoothing constant
pub const DEFAULT_SMOOTHING: f64 = 2.0;

/// Parameter validation errors. These indicate a configuration or
/// programming defect and are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("Num. periods parameter out of range: {0}")]
    InvalidPeriods(usize),

    #[error("Target index {index} out of range for {len} periods")]
    TargetOutOfRange { index: usize, len: usize },

    #[error("Not enough data provided for the number of periods specified: need index >= {required}, got {index}")]
    InsufficientData { required: usize, index: usize },

    #[error("Smoothing parameter out of range: {0}")]
    InvalidSmoothing(f64),

    #[error(transparent)]
    InvalidSource(#[from] InvalidSource),

    #[error("Invalid overbought/oversold levels: overbought={overbought}, oversold={oversold}")]
    InvalidLevels { overbought: f64, oversold: f64 },

    #[error("Invalid arguments for {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("Unknown scoring function: {0}")]
    UnknownScoringFunction(String),
}

/// Check that `target_index` is inside the history
pub(crate) fn check_target(data: &[PricePeriod], target_index: usize) -> Result<(), IndicatorError> {
    if target_index >= data.len() {
        return Err(IndicatorError::TargetOutOfRange {
            index: target_index,
            len: data.len(),
        });
    }
    Ok(())
}

/// Check that `target_index - lookback + 1 >= 0`
pub(crate) fn check_lookback(target_index: usize, lookback: usize) -> Result<(), IndicatorError> {
    if target_index + 1 < lookback {
        return Err(IndicatorError::InsufficientData {
            required: lookback - 1,
            index: target_index,
        });
    }
    Ok(())
}

fn check_periods(num_periods: usize) -> Result<(), IndicatorError> {
    if num_periods == 0 {
        return Err(IndicatorError::InvalidPeriods(num_periods));
    }
    Ok(())
}

pub(crate) fn check_smoothing(smoothing: f64) -> Result<(), IndicatorError> {
    if !(smoothing.is_finite() && smoothing > 0.0) {
        return Err(IndicatorError::InvalidSmoothing(smoothing));
    }
    Ok(())
}

/// Inclusive window `[target_index - num_periods + 1, target_index]`
#[inline]
fn window(data: &[PricePeriod], num_periods: usize, target_index: usize) -> &[PricePeriod] {
    &data[target_index + 1 - num_periods..=target_index]
}

/// Simple moving average of `source` over the `num_periods` ending at `target_index`
pub fn calculate_sma(
    data: &[PricePeriod],
    num_periods: usize,
    target_index: usize,
    source: PriceSource,
) -> Result<f64, IndicatorError> {
    check_periods(num_periods)?;
    check_target(data, target_index)?;
    check_lookback(target_index, num_periods)?;

    let slice = window(data, num_periods, target_index);
    let sum: f64 = slice.iter().map(|p| p.price(source)).sum();
    Ok(sum / slice.len() as f64)
}

/// Exponential moving average ending at `target_index`.
///
/// Seeded with the SMA one full window earlier, then smoothed forward through
/// the window with `multiplier = smoothing / (num_periods + 1)`. Needs twice the
/// lookback of the SMA.
pub fn calculate_ema(
    data: &[PricePeriod],
    num_periods: usize,
    target_index: usize,
    smoothing: f64,
    source: PriceSource,
) -> Result<f64, IndicatorError> {
    check_periods(num_periods)?;
    check_target(data, target_index)?;
    check_lookback(target_index, num_periods * 2)?;
    check_smoothing(smoothing)?;

    let multiplier = smoothing / (num_periods as f64 + 1.0);
    let seed = calculate_sma(data, num_periods, target_index - num_periods, source)?;

    let ema = window(data, num_periods, target_index)
        .iter()
        .fold(seed, |value, period| (period.price(source) - value) * multiplier + value);

    Ok(ema)
}

/// Stochastic %K: position of `source` within the window's low-high range, 0-100.
///
/// A flat window (high == low) yields exactly 100.
pub fn calculate_stochastic_k(
    data: &[PricePeriod],
    num_periods: usize,
    target_index: usize,
    source: PriceSource,
) -> Result<f64, IndicatorError> {
    check_periods(num_periods)?;
    check_target(data, target_index)?;
    check_lookback(target_index, num_periods)?;

    let slice = window(data, num_periods, target_index);
    let (low, high) = slice.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.ohlc.low), hi.max(p.ohlc.high))
    });

    let range = high - low;
    if range == 0.0 {
        return Ok(100.0);
    }

    Ok((data[target_index].price(source) - low) / range * 100.0)
}

/// Stochastic %D: mean of the `num_d_periods` %K values ending at `target_index`
pub fn calculate_stochastic_d(
    data: &[PricePeriod],
    num_k_periods: usize,
    num_d_periods: usize,
    target_index: usize,
    source: PriceSource,
) -> Result<f64, IndicatorError> {
    check_periods(num_k_periods)?;
    check_periods(num_d_periods)?;
    check_target(data, target_index)?;
    check_lookback(target_index, num_k_periods + num_d_periods)?;

    let first = target_index + 1 - num_d_periods;
    let mut sum = 0.0;
    for index in first..=target_index {
        sum += calculate_stochastic_k(data, num_k_periods, index, source)?;
    }

    Ok(sum / num_d_periods as f64)
}
