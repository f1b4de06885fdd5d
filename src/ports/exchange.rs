//! Exchange Port - balances, quotes and order submission on one venue

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::account::{AccountBalance, TickerSnapshot};
use crate::domain::order::OrderRequest;

/// Venue error, classified so callers can pick retry / skip / abort
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    /// Request nonce was not strictly increasing; safe to retry
    #[error("Invalid nonce: {0}")]
    InvalidNonce(String),

    /// Venue refused the order size
    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Unknown asset pair: {0}")]
    UnknownPair(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing API credentials: {0}")]
    MissingCredentials(String),
}

impl ExchangeError {
    /// Classify a venue error string
    pub fn from_venue_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        let owned = message.to_string();

        if lower.contains("invalid nonce") {
            Self::InvalidNonce(owned)
        } else if lower.contains("insufficient funds") {
            Self::InsufficientFunds(owned)
        } else if lower.contains("volume") || lower.contains("order minimum not met") {
            Self::InvalidVolume(owned)
        } else if lower.contains("unknown asset pair") {
            Self::UnknownPair(owned)
        } else {
            Self::Api(owned)
        }
    }

    /// Worth retrying the same request
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::InvalidNonce(_))
    }

    /// Business rejection: skip this cycle without failing it
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::InvalidVolume(_) | Self::InsufficientFunds(_))
    }
}

/// A trading venue holding the two-asset account
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Venue name for logging
    fn name(&self) -> &str;

    /// Balances of the configured base and quote assets
    async fn get_balance(&self) -> Result<AccountBalance, ExchangeError>;

    /// Best ask, best bid and last trade for the configured pair
    async fn get_ticker(&self) -> Result<TickerSnapshot, ExchangeError>;

    /// Submit an order, returning the venue's transaction ids
    async fn submit_order(&self, request: &OrderRequest) -> Result<Vec<String>, ExchangeError>;
}
