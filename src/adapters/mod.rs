//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Kraken: REST client, exchange and OHLC price history
//! - Paper: in-memory venue for dry runs
//! - CLI: Command-line interface handlers

pub mod kraken;
pub mod paper;
pub mod cli;

pub use kraken::{KrakenClient, KrakenExchange, KrakenPriceHistory};
pub use paper::PaperExchange;
pub use cli::CliApp;
