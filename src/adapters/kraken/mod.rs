//! Kraken Adapter
//!
//! REST client with request signing, plus the exchange and price history
//! ports built on top of it.

pub mod client;
pub mod exchange;
pub mod market_data;
pub mod types;

pub use client::{KrakenClient, KrakenConfig};
pub use exchange::KrakenExchange;
pub use market_data::KrakenPriceHistory;
