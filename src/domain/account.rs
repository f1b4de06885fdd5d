//! Account state snapshots read once per evaluation cycle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Asset quantities held at the venue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub balances: HashMap<String, f64>,
}

impl AccountBalance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set a balance
    pub fn with(mut self, asset: &str, quantity: f64) -> Self {
        self.balances.insert(asset.to_string(), quantity);
        self
    }

    /// Quantity held, zero when the asset is absent
    pub fn get(&self, asset: &str) -> f64 {
        self.balances.get(asset).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, asset: &str, quantity: f64) {
        self.balances.insert(asset.to_string(), quantity);
    }

}

impl FromIterator<(String, f64)> for AccountBalance {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            balances: iter.into_iter().collect(),
        }
    }
}

/// Best ask, best bid and last trade price
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub ask: f64,
    pub bid: f64,
    pub last: f64,
}

impl TickerSnapshot {
    pub fn new(ask: f64, bid: f64, last: f64) -> Self {
        Self { ask, bid, last }
    }

    /// Mid price between best bid and ask
    pub fn mid(&self) -> f64 {
        (self.ask + self.bid) / 2.0
    }

    /// Spread in basis points of the mid price
    pub fn spread_bps(&self) -> f64 {
        let mid = self.mid();
        if mid <= 0.0 {
            return 0.0;
        }
        (self.ask - self.bid) / mid * 10_000.0
    }
}
