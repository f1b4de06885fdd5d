//! Price Periods
//!
//! OHLC candles consumed by the indicator library. A price history is an
//! ordered slice of periods, oldest first.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Open/high/low/close prices for one period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Ohlc {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { open, high, low, close }
    }

    /// Price for the requested source field
    #[inline]
    pub fn get(&self, source: PriceSource) -> f64 {
        match source {
            PriceSource::Open => self.open,
            PriceSource::High => self.high,
            PriceSource::Low => self.low,
            PriceSource::Close => self.close,
        }
    }

    /// Validate OHLC data integrity
    pub fn is_valid(&self) -> bool {
        let finite = self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite();

        finite
            && self.low >= 0.0
            && self.high >= self.open.max(self.close).max(self.low)
            && self.low <= self.open.min(self.close).min(self.high)
    }
}

/// One candle of price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePeriod {
    /// Start of the period
    pub timestamp: DateTime<Utc>,
    /// Period length
    #[serde(with = "duration_seconds")]
    pub duration: Duration,
    pub ohlc: Ohlc,
}

impl PricePeriod {
    pub fn new(timestamp: DateTime<Utc>, duration: Duration, ohlc: Ohlc) -> Self {
        Self { timestamp, duration, ohlc }
    }

    /// End of the period (exclusive)
    pub fn end(&self) -> DateTime<Utc> {
        self.timestamp + self.duration
    }

    #[inline]
    pub fn price(&self, source: PriceSource) -> f64 {
        self.ohlc.get(source)
    }
}

/// Which OHLC field an indicator reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Open => write!(f, "open"),
            PriceSource::High => write!(f, "high"),
            PriceSource::Low => write!(f, "low"),
            PriceSource::Close => write!(f, "close"),
        }
    }
}

/// Unrecognized price source name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Source parameter ({0:?}) is invalid")]
pub struct InvalidSource(pub String);

impl FromStr for PriceSource {
    type Err = InvalidSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PriceSource::Open),
            "high" => Ok(PriceSource::High),
            "low" => Ok(PriceSource::Low),
            "close" => Ok(PriceSource::Close),
            other => Err(InvalidSource(other.to_string())),
        }
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(secs))
    }
}
