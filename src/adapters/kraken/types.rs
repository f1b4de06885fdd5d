//! Kraken REST payloads

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::account::TickerSnapshot;
use crate::domain::period::{Ohlc, PricePeriod};
use crate::ports::exchange::ExchangeError;

/// Envelope shared by every endpoint
#[derive(Debug, Deserialize)]
pub struct KrakenResponse<T> {
    #[serde(default)]
    pub error: Vec<String>,
    pub result: Option<T>,
}

impl<T> KrakenResponse<T> {
    /// Venue errors take priority over a (partial) result
    pub fn into_result(self) -> Result<T, ExchangeError> {
        if !self.error.is_empty() {
            return Err(ExchangeError::from_venue_message(&self.error.join("; ")));
        }
        self.result
            .ok_or_else(|| ExchangeError::Parse("response has neither error nor result".into()))
    }
}

/// Ticker entry: `[price, whole lot volume, lot volume]` style arrays
#[derive(Debug, Clone, Deserialize)]
pub struct TickerInfo {
    /// Best ask
    pub a: Vec<String>,
    /// Best bid
    pub b: Vec<String>,
    /// Last trade closed
    pub c: Vec<String>,
}

impl TickerInfo {
    pub fn snapshot(&self) -> Result<TickerSnapshot, ExchangeError> {
        Ok(TickerSnapshot::new(
            first_price(&self.a, "ask")?,
            first_price(&self.b, "bid")?,
            first_price(&self.c, "last")?,
        ))
    }
}

fn first_price(values: &[String], field: &str) -> Result<f64, ExchangeError> {
    values
        .first()
        .ok_or_else(|| ExchangeError::Parse(format!("ticker {} is empty", field)))
        .and_then(|v| parse_number(v, field))
}

pub fn parse_number(value: &str, field: &str) -> Result<f64, ExchangeError> {
    value
        .parse::<f64>()
        .map_err(|e| ExchangeError::Parse(format!("{} {:?}: {}", field, value, e)))
}

/// AddOrder result
#[derive(Debug, Clone, Deserialize)]
pub struct AddOrderResult {
    #[serde(default)]
    pub descr: Option<OrderDescription>,
    pub txid: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderDescription {
    pub order: String,
}

/// Balance result: asset -> decimal string
pub type BalanceResult = HashMap<String, String>;

/// OHLC result: `{ "<pair>": [[time, o, h, l, c, vwap, volume, count], ...], "last": id }`
pub fn parse_ohlc(result: &Value, interval: Duration) -> Result<Vec<PricePeriod>, ExchangeError> {
    let object = result
        .as_object()
        .ok_or_else(|| ExchangeError::Parse("OHLC result is not an object".into()))?;

    let rows = object
        .iter()
        .find(|(key, _)| key.as_str() != "last")
        .and_then(|(_, value)| value.as_array())
        .ok_or_else(|| ExchangeError::Parse("OHLC result has no candle array".into()))?;

    rows.iter().map(|row| parse_candle(row, interval)).collect()
}

fn parse_candle(row: &Value, interval: Duration) -> Result<PricePeriod, ExchangeError> {
    let fields = row
        .as_array()
        .filter(|f| f.len() >= 5)
        .ok_or_else(|| ExchangeError::Parse(format!("malformed candle: {}", row)))?;

    let time = fields[0]
        .as_i64()
        .ok_or_else(|| ExchangeError::Parse(format!("candle time: {}", fields[0])))?;
    let timestamp = DateTime::<Utc>::from_timestamp(time, 0)
        .ok_or_else(|| ExchangeError::Parse(format!("candle time out of range: {}", time)))?;

    let price = |index: usize, field: &str| -> Result<f64, ExchangeError> {
        match &fields[index] {
            Value::String(s) => parse_number(s, field),
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| ExchangeError::Parse(format!("{}: {}", field, n))),
            other => Err(ExchangeError::Parse(format!("{}: {}", field, other))),
        }
    };

    let ohlc = Ohlc::new(price(1, "open")?, price(2, "high")?, price(3, "low")?, price(4, "close")?);
    if !ohlc.is_valid() {
        return Err(ExchangeError::Parse(format!("inconsistent candle at {}: {:?}", time, ohlc)));
    }
    Ok(PricePeriod::new(timestamp, interval, ohlc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_error_wins() {
        let response: KrakenResponse<BalanceResult> =
            serde_json::from_value(json!({ "error": ["EAPI:Invalid nonce"] })).unwrap();
        assert!(matches!(response.into_result(), Err(ExchangeError::InvalidNonce(_))));

        let response: KrakenResponse<BalanceResult> =
            serde_json::from_value(json!({ "error": [], "result": { "XXBT": "0.5" } })).unwrap();
        assert_eq!(response.into_result().unwrap()["XXBT"], "0.5");

        let response: KrakenResponse<BalanceResult> = serde_json::from_value(json!({ "error": [] })).unwrap();
        assert!(matches!(response.into_result(), Err(ExchangeError::Parse(_))));
    }

    #[test]
    fn test_ticker_snapshot() {
        let ticker: HashMap<String, TickerInfo> = serde_json::from_value(json!({
            "XXBTZUSD": {
                "a": ["30300.10000", "1", "1.000"],
                "b": ["30300.00000", "1", "1.000"],
                "c": ["30303.20000", "0.00067643"],
                "v": ["4083.67001100", "4412.73601799"]
            }
        }))
        .unwrap();

        let snapshot = ticker["XXBTZUSD"].snapshot().unwrap();
        assert_eq!(snapshot, TickerSnapshot::new(30300.1, 30300.0, 30303.2));
    }

    #[test]
    fn test_parse_ohlc() {
        let result = json!({
            "XXBTZUSD": [
                [1688671200, "30306.1", "30306.2", "30305.7", "30305.7", "30306.1", "3.39243896", 23],
                [1688671260, "30305.7", "30310.0", "30301.0", "30309.9", "30305.9", "1.20000000", 12]
            ],
            "last": 1688672160
        });

        let periods = parse_ohlc(&result, Duration::minutes(1)).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].timestamp.timestamp(), 1688671200);
        assert_eq!(periods[1].ohlc, Ohlc::new(30305.7, 30310.0, 30301.0, 30309.9));
        assert_eq!(periods[1].duration, Duration::minutes(1));
    }

    #[test]
    fn test_parse_ohlc_rejects_garbage() {
        assert!(parse_ohlc(&json!([]), Duration::minutes(1)).is_err());
        assert!(parse_ohlc(&json!({ "last": 1 }), Duration::minutes(1)).is_err());
        assert!(parse_ohlc(&json!({ "X": [[1, "a", "1", "1", "1"]] }), Duration::minutes(1)).is_err());
    }

    #[test]
    fn test_parse_ohlc_rejects_inconsistent_candle() {
        // high below low
        let result = json!({
            "XXBTZUSD": [[1688671200, "30306.1", "30300.0", "30310.0", "30305.7", "30306.1", "3.39", 23]],
            "last": 1688671200
        });
        assert!(matches!(parse_ohlc(&result, Duration::minutes(1)), Err(ExchangeError::Parse(_))));

        // negative prices
        let result = json!({
            "XXBTZUSD": [[1688671200, "-1.0", "-1.0", "-1.0", "-1.0", "0", "0", 0]],
            "last": 1688671200
        });
        assert!(matches!(parse_ohlc(&result, Duration::minutes(1)), Err(ExchangeError::Parse(_))));
    }
}
