//! Kraken OHLC price history with a per-period cache

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::period::PricePeriod;
use crate::ports::exchange::ExchangeError;
use crate::ports::market_data::{MarketDataError, PriceHistoryPort};
use super::client::KrakenClient;
use super::types::parse_ohlc;

impl From<ExchangeError> for MarketDataError {
    fn from(error: ExchangeError) -> Self {
        match error {
            ExchangeError::Http(msg) => MarketDataError::Http(msg),
            ExchangeError::Parse(msg) => MarketDataError::Parse(msg),
            other => MarketDataError::Api(other.to_string()),
        }
    }
}

/// Closed candles for one pair, refreshed once per period
#[derive(Debug)]
pub struct KrakenPriceHistory {
    client: KrakenClient,
    pair: String,
    interval_minutes: u32,
    min_data_length: usize,
    cache: Mutex<Option<Vec<PricePeriod>>>,
}

impl KrakenPriceHistory {
    pub fn new(client: KrakenClient, pair: &str, interval_minutes: u32, min_data_length: usize) -> Self {
        Self {
            client,
            pair: pair.to_string(),
            interval_minutes,
            min_data_length,
            cache: Mutex::new(None),
        }
    }

    fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<PricePeriod>, MarketDataError> {
        // One extra interval covers the in-progress candle that gets dropped
        let span = self.interval() * (self.min_data_length as i32 + 1);
        let since = (now - span).timestamp();

        let result: Value = self
            .client
            .public(
                "OHLC",
                &[
                    ("pair", self.pair.clone()),
                    ("interval", self.interval_minutes.to_string()),
                    ("since", since.to_string()),
                ],
            )
            .await?;

        let periods = parse_ohlc(&result, self.interval())?;
        let closed = closed_history(periods, self.min_data_length);
        if closed.is_empty() {
            return Err(MarketDataError::Empty);
        }
        debug!("Fetched {} closed {}m candles for {}", closed.len(), self.interval_minutes, self.pair);
        Ok(closed)
    }
}

/// Drop the in-progress newest candle and keep the newest `keep` closed ones
pub fn closed_history(mut periods: Vec<PricePeriod>, keep: usize) -> Vec<PricePeriod> {
    periods.pop();
    let excess = periods.len().saturating_sub(keep);
    periods.drain(..excess);
    periods
}

/// Cached history is current until another period closes after it
pub fn is_current(history: &[PricePeriod], now: DateTime<Utc>) -> bool {
    match history.last() {
        Some(newest) => now < newest.end() + newest.duration,
        None => false,
    }
}

#[async_trait]
impl PriceHistoryPort for KrakenPriceHistory {
    async fn get_data(&self) -> Result<Vec<PricePeriod>, MarketDataError> {
        let now = Utc::now();
        let mut cache = self.cache.lock().await;

        if let Some(history) = cache.as_ref() {
            if is_current(history, now) {
                return Ok(history.clone());
            }
        }

        let fresh = self.fetch(now).await?;
        *cache = Some(fresh.clone());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::indicators::tests::flat_periods;
    use chrono::TimeZone;

    #[test]
    fn test_closed_history_drops_in_progress_candle() {
        let periods = flat_periods(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let closed = closed_history(periods, 3);
        let closes: Vec<f64> = closed.iter().map(|p| p.ohlc.close).collect();
        assert_eq!(closes, vec![2.0, 3.0, 4.0]);

        let short = closed_history(flat_periods(&[1.0, 2.0]), 10);
        assert_eq!(short.len(), 1);
        assert!(closed_history(vec![], 10).is_empty());
    }

    #[test]
    fn test_cache_expires_when_next_period_closes() {
        // Hourly candles from 2024-01-01 00:00; newest closed one starts 02:00
        let history = flat_periods(&[1.0, 2.0, 3.0]);
        let at = |h, m| Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap();

        assert!(is_current(&history, at(3, 0)));
        assert!(is_current(&history, at(3, 59)));
        assert!(!is_current(&history, at(4, 0)));
        assert!(!is_current(&[], at(3, 0)));
    }

    #[test]
    fn test_exchange_errors_map_to_market_data_errors() {
        assert_eq!(
            MarketDataError::from(ExchangeError::Http("timeout".into())),
            MarketDataError::Http("timeout".into())
        );
        assert!(matches!(
            MarketDataError::from(ExchangeError::UnknownPair("X".into())),
            MarketDataError::Api(_)
        ));
    }
}
