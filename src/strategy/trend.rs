//! Trend Strength (ADX)
//!
//! Wilder's Average Directional Index evaluated at one index of a price
//! history. ADX measures trend strength without direction (0-100 scale) and
//! gates buy orders when a minimum trend strength is configured.
//!
//! Components:
//! - +DI / -DI: smoothed directional movement relative to true range
//! - DX: `|+DI - -DI| / (+DI + -DI) * 100`
//! - ADX: mean of the first `period` DX values, then Wilder-smoothed

use crate::domain::period::{Ohlc, PricePeriod};
use super::indicators::{check_lookback, check_target, IndicatorError};

/// ADX reading at the target index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxReading {
    /// Plus Directional Indicator (0-100)
    pub plus_di: f64,
    /// Minus Directional Indicator (0-100)
    pub minus_di: f64,
    /// Average Directional Index (0-100)
    pub adx: f64,
}

impl AdxReading {
    pub fn regime(&self) -> TrendRegime {
        TrendRegime::from_adx(self.adx)
    }
}

/// Market trend regime based on ADX
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendRegime {
    /// ADX < 20: Weak/no trend
    Ranging,
    /// ADX 20-25: Transition zone
    Transitioning,
    /// ADX 25-40: Confirmed trend
    Trending,
    /// ADX 40-50: Strong trend
    StrongTrend,
    /// ADX >= 50: Extreme trend (potential exhaustion)
    ExtremeTrend,
}

impl TrendRegime {
    pub fn from_adx(adx: f64) -> Self {
        if adx < 20.0 {
            Self::Ranging
        } else if adx < 25.0 {
            Self::Transitioning
        } else if adx < 40.0 {
            Self::Trending
        } else if adx < 50.0 {
            Self::StrongTrend
        } else {
            Self::ExtremeTrend
        }
    }
}

/// Streaming Wilder accumulator, fed oldest to newest
#[derive(Debug)]
struct AdxAccumulator {
    period: usize,
    prev: Option<Ohlc>,
    bars_processed: usize,

    tr_sum: f64,
    plus_dm_sum: f64,
    minus_dm_sum: f64,

    smoothed_tr: f64,
    smoothed_plus_dm: f64,
    smoothed_minus_dm: f64,

    dx_sum: f64,
    dx_count: usize,
    adx: f64,

    plus_di: f64,
    minus_di: f64,
}

impl AdxAccumulator {
    fn new(period: usize) -> Self {
        Self {
            period,
            prev: None,
            bars_processed: 0,
            tr_sum: 0.0,
            plus_dm_sum: 0.0,
            minus_dm_sum: 0.0,
            smoothed_tr: 0.0,
            smoothed_plus_dm: 0.0,
            smoothed_minus_dm: 0.0,
            dx_sum: 0.0,
            dx_count: 0,
            adx: 0.0,
            plus_di: 0.0,
            minus_di: 0.0,
        }
    }

    fn update(&mut self, candle: &Ohlc) {
        let n = self.period as f64;
        let tr = self.true_range(candle);
        let (plus_dm, minus_dm) = self.directional_movement(candle);
        self.prev = Some(*candle);
        self.bars_processed += 1;

        // Accumulate the first `period` bars, then switch to Wilder smoothing:
        // smoothed = previous - previous / n + current
        if self.bars_processed <= self.period {
            self.tr_sum += tr;
            self.plus_dm_sum += plus_dm;
            self.minus_dm_sum += minus_dm;

            if self.bars_processed < self.period {
                return;
            }
            self.smoothed_tr = self.tr_sum;
            self.smoothed_plus_dm = self.plus_dm_sum;
            self.smoothed_minus_dm = self.minus_dm_sum;
        } else {
            self.smoothed_tr = self.smoothed_tr - (self.smoothed_tr / n) + tr;
            self.smoothed_plus_dm = self.smoothed_plus_dm - (self.smoothed_plus_dm / n) + plus_dm;
            self.smoothed_minus_dm = self.smoothed_minus_dm - (self.smoothed_minus_dm / n) + minus_dm;
        }

        self.update_di();
        let dx = self.dx();

        if self.dx_count < self.period {
            self.dx_sum += dx;
            self.dx_count += 1;
            if self.dx_count == self.period {
                self.adx = self.dx_sum / n;
            }
        } else {
            self.adx = (self.adx * (n - 1.0) + dx) / n;
        }
    }

    /// True range, accounting for gaps against the previous close
    #[inline]
    fn true_range(&self, candle: &Ohlc) -> f64 {
        match self.prev {
            Some(prev) => {
                let hl = candle.high - candle.low;
                let hc = (candle.high - prev.close).abs();
                let lc = (candle.low - prev.close).abs();
                hl.max(hc).max(lc)
            }
            None => candle.high - candle.low,
        }
    }

    #[inline]
    fn directional_movement(&self, candle: &Ohlc) -> (f64, f64) {
        match self.prev {
            Some(prev) => {
                let up_move = candle.high - prev.high;
                let down_move = prev.low - candle.low;

                if up_move > down_move && up_move > 0.0 {
                    (up_move, 0.0)
                } else if down_move > up_move && down_move > 0.0 {
                    (0.0, down_move)
                } else {
                    (0.0, 0.0)
                }
            }
            None => (0.0, 0.0),
        }
    }

    #[inline]
    fn update_di(&mut self) {
        if self.smoothed_tr > 0.0 {
            self.plus_di = (self.smoothed_plus_dm / self.smoothed_tr) * 100.0;
            self.minus_di = (self.smoothed_minus_dm / self.smoothed_tr) * 100.0;
        } else {
            self.plus_di = 0.0;
            self.minus_di = 0.0;
        }
    }

    #[inline]
    fn dx(&self) -> f64 {
        let di_sum = self.plus_di + self.minus_di;
        if di_sum > 0.0 {
            ((self.plus_di - self.minus_di).abs() / di_sum) * 100.0
        } else {
            0.0
        }
    }

    fn reading(&self) -> AdxReading {
        AdxReading {
            plus_di: self.plus_di,
            minus_di: self.minus_di,
            adx: self.adx,
        }
    }
}

/// Bars needed before ADX is defined
pub fn adx_warmup(period: usize) -> usize {
    (2 * period).saturating_sub(1)
}

/// ADX over `data[..=target_index]`. Requires `2 * period - 1` periods.
pub fn calculate_adx(
    data: &[PricePeriod],
    period: usize,
    target_index: usize,
) -> Result<AdxReading, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriods(period));
    }
    check_target(data, target_index)?;
    check_lookback(target_index, adx_warmup(period))?;

    let mut acc = AdxAccumulator::new(period);
    for p in &data[..=target_index] {
        acc.update(&p.ohlc);
    }

    Ok(acc.reading())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::indicators::tests::{flat_periods, periods};
    use approx::assert_relative_eq;

    fn uptrend(n: usize) -> Vec<PricePeriod> {
        let bars: Vec<_> = (0..n)
            .map(|i| {
                let base = 100.0 + i as f64;
                (base, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        periods(&bars)
    }

    #[test]
    fn test_strong_uptrend() {
        let data = uptrend(40);
        let reading = calculate_adx(&data, 14, 39).unwrap();
        assert!(reading.adx > 50.0, "ADX {}", reading.adx);
        assert!(reading.plus_di > reading.minus_di);
        assert_eq!(reading.regime(), TrendRegime::ExtremeTrend);
    }

    #[test]
    fn test_flat_market_is_zero() {
        let data = flat_periods(&[50.0; 30]);
        let reading = calculate_adx(&data, 10, 29).unwrap();
        assert_relative_eq!(reading.adx, 0.0);
        assert_eq!(reading.regime(), TrendRegime::Ranging);
    }

    #[test]
    fn test_warmup_requirement() {
        let data = uptrend(30);
        assert_eq!(adx_warmup(14), 27);
        assert!(calculate_adx(&data, 14, 26).is_ok());
        assert!(matches!(
            calculate_adx(&data, 14, 25),
            Err(IndicatorError::InsufficientData { .. })
        ));
        assert_eq!(calculate_adx(&data, 0, 25), Err(IndicatorError::InvalidPeriods(0)));
    }

    #[test]
    fn test_regime_thresholds() {
        assert_eq!(TrendRegime::from_adx(15.0), TrendRegime::Ranging);
        assert_eq!(TrendRegime::from_adx(22.0), TrendRegime::Transitioning);
        assert_eq!(TrendRegime::from_adx(30.0), TrendRegime::Trending);
        assert_eq!(TrendRegime::from_adx(45.0), TrendRegime::StrongTrend);
        assert_eq!(TrendRegime::from_adx(55.0), TrendRegime::ExtremeTrend);
    }
}
