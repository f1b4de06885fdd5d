//! Domain Layer - Core types for the rebalancing engine
//!
//! Pure types and logic with no I/O. All external interactions happen
//! through the ports layer.

pub mod period;
pub mod account;
pub mod order;
pub mod precision;
pub mod signal;
pub mod sizing;

pub use period::{InvalidSource, Ohlc, PricePeriod, PriceSource};
pub use account::{AccountBalance, TickerSnapshot};
pub use order::{OrderIntent, OrderRequest, OrderResult, OrderSide, OrderType};
pub use signal::Signal;
pub use sizing::{Allocation, PositionSizer, SizingConfig, SizingError};
