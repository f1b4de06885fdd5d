//! Price History Port - ordered OHLC periods for the configured pair

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::period::PricePeriod;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketDataError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Data parsing error: {0}")]
    Parse(String),

    #[error("No price data returned")]
    Empty,
}

/// Source of closed price periods, oldest first
#[async_trait]
pub trait PriceHistoryPort: Send + Sync {
    /// Closed periods, oldest first. The in-progress period is never included.
    async fn get_data(&self) -> Result<Vec<PricePeriod>, MarketDataError>;
}
