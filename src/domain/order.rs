//! Order types produced by position sizing and returned after submission.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order direction relative to the base asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Spend quote asset to acquire base asset
    Buy,
    /// Sell base asset for quote asset
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit => write!(f, "limit"),
            OrderType::Market => write!(f, "market"),
        }
    }
}

/// A sized order, ready for submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Limit price (reference price for market orders)
    pub price: Decimal,
    /// Quantity of base asset
    pub volume: Decimal,
    /// Quantity of quote asset
    pub cost: Decimal,
    /// Reject instead of taking liquidity
    pub post_only: bool,
}

/// Venue-facing submission parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub pair: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub volume: Decimal,
    /// Only sent for limit orders
    pub price: Option<Decimal>,
    pub post_only: bool,
    pub expire_after_seconds: Option<u64>,
}

impl OrderRequest {
    pub fn from_intent(pair: &str, intent: &OrderIntent, expire_after_seconds: Option<u64>) -> Self {
        Self {
            pair: pair.to_string(),
            side: intent.side,
            order_type: intent.order_type,
            volume: intent.volume,
            price: match intent.order_type {
                OrderType::Limit => Some(intent.price),
                OrderType::Market => None,
            },
            post_only: intent.post_only,
            expire_after_seconds,
        }
    }
}

/// Outcome of a successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub txid: Vec<String>,
    pub side: OrderSide,
    pub price: Decimal,
    pub volume: Decimal,
    pub cost: Decimal,
}

impl OrderResult {
    pub fn from_intent(txid: Vec<String>, intent: &OrderIntent) -> Self {
        Self {
            txid,
            side: intent.side,
            price: intent.price,
            volume: intent.volume,
            cost: intent.cost,
        }
    }
}
