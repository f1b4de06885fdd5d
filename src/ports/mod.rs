//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Price history (closed OHLC periods)
//! - The trading venue (balances, ticker, order submission)

pub mod exchange;
pub mod market_data;
pub mod mocks;

pub use exchange::{ExchangeError, ExchangePort};
pub use market_data::{MarketDataError, PriceHistoryPort};
