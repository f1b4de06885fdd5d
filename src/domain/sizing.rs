//! Position Sizing
//!
//! Turns a decision score and the current account state into a concrete,
//! precision-safe order that moves the portfolio toward a target allocation.
//!
//! The portfolio is valued in units of the base asset:
//!
//! ```text
//! total   = base + quote / last
//! current = base / total
//! target  = clamp(current + score, 0, 1)
//! ```
//!
//! A buy spends `quote * (target - current) / (1 - current)`, a sell releases
//! `base * (current - target) / current`. All amounts are truncated toward zero
//! before they are compared against the minimum transaction sizes.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use super::account::{AccountBalance, TickerSnapshot};
use super::order::{OrderIntent, OrderSide, OrderType};
use super::precision::truncate;
use super::signal::Signal;

/// Sizing failures. Business rejections are `Ok(None)`, not errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("Specified score is invalid: a zero score must not reach order sizing")]
    ZeroScore,
    #[error("Score is not a finite number: {0}")]
    InvalidScore(f64),
    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),
    #[error("Amount cannot be represented: {0}")]
    InvalidAmount(String),
}

/// Venue rules and risk knobs used by the sizer
#[derive(Debug, Clone, PartialEq)]
pub struct SizingConfig {
    pub base_asset: String,
    pub quote_asset: String,
    /// Decimal places accepted for prices
    pub price_precision: u32,
    /// Decimal places accepted for base asset quantities (volume)
    pub base_precision: u32,
    /// Decimal places accepted for quote asset quantities (cost)
    pub quote_precision: u32,
    pub base_minimum_transaction: Decimal,
    pub quote_minimum_transaction: Decimal,
    /// Price offset applied to post-only limit orders
    pub maker_margin: f64,
    /// Price offset applied otherwise
    pub taker_margin: f64,
    /// Submit post-only limit orders instead of market orders
    pub force_maker: bool,
    /// Dead zone: |score| below this places no order
    pub score_threshold: f64,
    /// Minimum ADX required before buying, when set
    pub min_trend_strength: Option<f64>,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_asset: "XXBT".to_string(),
            quote_asset: "ZUSD".to_string(),
            price_precision: 1,
            base_precision: 8,
            quote_precision: 5,
            base_minimum_transaction: Decimal::new(1, 4),  // 0.0001
            quote_minimum_transaction: Decimal::new(5, 1), // 0.5
            maker_margin: 0.0,
            taker_margin: 0.0,
            force_maker: true,
            score_threshold: 0.05,
            min_trend_strength: None,
        }
    }
}

/// Current and target allocation of the portfolio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    /// Portfolio value expressed in base asset units
    pub total_value_in_base: f64,
    /// Fraction of value currently held in base asset
    pub current_ratio: f64,
    /// Desired fraction after rebalancing
    pub target_ratio: f64,
}

impl Allocation {
    /// `None` when the portfolio holds nothing
    pub fn compute(base: f64, quote: f64, last_price: f64, score: f64) -> Option<Self> {
        let total_value_in_base = base + quote / last_price;
        if !(total_value_in_base.is_finite() && total_value_in_base > 0.0) {
            return None;
        }

        let current_ratio = base / total_value_in_base;
        let target_ratio = (current_ratio + score).clamp(0.0, 1.0);

        Some(Self {
            total_value_in_base,
            current_ratio,
            target_ratio,
        })
    }

    /// Fraction of the quote balance to spend
    pub fn buy_multiplier(&self) -> f64 {
        (self.target_ratio - self.current_ratio) / (1.0 - self.current_ratio)
    }

    /// Fraction of the base balance to sell
    pub fn sell_multiplier(&self) -> f64 {
        (self.current_ratio - self.target_ratio) / self.current_ratio
    }
}

/// Pure order sizing over a balance and ticker snapshot
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Size an order for `signal`.
    ///
    /// Returns `Ok(None)` when no trade should happen this cycle: score inside
    /// the dead zone, nothing to spend, trend gate closed, or the truncated
    /// amount below the venue minimum.
    pub fn size(
        &self,
        signal: &Signal,
        balances: &AccountBalance,
        ticker: &TickerSnapshot,
    ) -> Result<Option<OrderIntent>, SizingError> {
        let score = signal.score;
        if score == 0.0 {
            return Err(SizingError::ZeroScore);
        }
        if !score.is_finite() {
            return Err(SizingError::InvalidScore(score));
        }
        if !(ticker.last.is_finite() && ticker.last > 0.0) {
            return Err(SizingError::InvalidTicker(format!(
                "last trade price must be positive, got {}",
                ticker.last
            )));
        }

        let base = balances.get(&self.config.base_asset);
        let quote = balances.get(&self.config.quote_asset);

        let Some(allocation) = Allocation::compute(base, quote, ticker.last, score) else {
            debug!("Portfolio is empty, nothing to rebalance");
            return Ok(None);
        };

        debug!(
            "Allocation: total={:.8} {} | current={:.4} | target={:.4}",
            allocation.total_value_in_base,
            self.config.base_asset,
            allocation.current_ratio,
            allocation.target_ratio
        );

        if score.abs() < self.config.score_threshold {
            debug!(
                "Score {:.2} inside dead zone (threshold {:.2})",
                score, self.config.score_threshold
            );
            return Ok(None);
        }

        if score > 0.0 {
            self.size_buy(signal, quote, &allocation, ticker)
        } else {
            self.size_sell(base, &allocation, ticker)
        }
    }

    fn size_buy(
        &self,
        signal: &Signal,
        quote: f64,
        allocation: &Allocation,
        ticker: &TickerSnapshot,
    ) -> Result<Option<OrderIntent>, SizingError> {
        if quote <= 0.0 {
            debug!("No {} balance to buy with", self.config.quote_asset);
            return Ok(None);
        }

        if let Some(min_adx) = self.config.min_trend_strength {
            match signal.trend_strength {
                Some(adx) if adx >= min_adx => {}
                Some(adx) => {
                    info!("Trend too weak to buy: ADX {:.1} < {:.1}", adx, min_adx);
                    return Ok(None);
                }
                None => {
                    info!("Trend gate enabled but no trend strength supplied, skipping buy");
                    return Ok(None);
                }
            }
        }

        let price = self.limit_price(ticker.ask + self.margin())?;
        if price <= Decimal::ZERO {
            return Ok(None);
        }

        let Some(multiplier) = usable_multiplier(allocation.buy_multiplier()) else {
            debug!("Allocation already at target, nothing to buy");
            return Ok(None);
        };
        let multiplier = to_decimal(multiplier, "buy multiplier")?;
        let quote = to_decimal(quote, "quote balance")?;
        let cost = quote
            .checked_mul(multiplier)
            .map(|c| truncate(c, self.config.quote_precision))
            .ok_or_else(|| SizingError::InvalidAmount("cost overflow".into()))?;
        let volume = cost
            .checked_div(price)
            .map(|v| truncate(v, self.config.base_precision))
            .ok_or_else(|| SizingError::InvalidAmount("volume overflow".into()))?;

        if cost < self.config.quote_minimum_transaction || volume <= Decimal::ZERO {
            info!(
                "Buy cost {} {} below minimum {}",
                cost, self.config.quote_asset, self.config.quote_minimum_transaction
            );
            return Ok(None);
        }

        Ok(Some(self.intent(OrderSide::Buy, price, volume, cost)))
    }

    fn size_sell(
        &self,
        base: f64,
        allocation: &Allocation,
        ticker: &TickerSnapshot,
    ) -> Result<Option<OrderIntent>, SizingError> {
        if base <= 0.0 {
            debug!("No {} balance to sell", self.config.base_asset);
            return Ok(None);
        }

        let price = self.limit_price(ticker.bid - self.margin())?;
        if price <= Decimal::ZERO {
            return Ok(None);
        }

        let Some(multiplier) = usable_multiplier(allocation.sell_multiplier()) else {
            debug!("Allocation already at target, nothing to sell");
            return Ok(None);
        };
        let multiplier = to_decimal(multiplier, "sell multiplier")?;
        let base = to_decimal(base, "base balance")?;
        let volume = base
            .checked_mul(multiplier)
            .map(|v| truncate(v, self.config.base_precision))
            .ok_or_else(|| SizingError::InvalidAmount("volume overflow".into()))?;
        let cost = volume
            .checked_mul(price)
            .map(|c| truncate(c, self.config.quote_precision))
            .ok_or_else(|| SizingError::InvalidAmount("cost overflow".into()))?;

        if volume < self.config.base_minimum_transaction || volume <= Decimal::ZERO {
            info!(
                "Sell volume {} {} below minimum {}",
                volume, self.config.base_asset, self.config.base_minimum_transaction
            );
            return Ok(None);
        }

        Ok(Some(self.intent(OrderSide::Sell, price, volume, cost)))
    }

    fn margin(&self) -> f64 {
        if self.config.force_maker {
            self.config.maker_margin
        } else {
            self.config.taker_margin
        }
    }

    fn limit_price(&self, raw: f64) -> Result<Decimal, SizingError> {
        to_decimal(raw, "price").map(|p| truncate(p, self.config.price_precision))
    }

    fn intent(&self, side: OrderSide, price: Decimal, volume: Decimal, cost: Decimal) -> OrderIntent {
        let order_type = if self.config.force_maker {
            OrderType::Limit
        } else {
            OrderType::Market
        };

        OrderIntent {
            side,
            order_type,
            price,
            volume,
            cost,
            post_only: self.config.force_maker,
        }
    }
}

/// A tiny balance can vanish from the f64 total, leaving target == current and 0/0
fn usable_multiplier(multiplier: f64) -> Option<f64> {
    (multiplier.is_finite() && multiplier > 0.0).then_some(multiplier)
}

fn to_decimal(value: f64, what: &str) -> Result<Decimal, SizingError> {
    Decimal::from_f64(value).ok_or_else(|| SizingError::InvalidAmount(format!("{what} = {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn config() -> SizingConfig {
        SizingConfig {
            base_asset: "BASE".into(),
            quote_asset: "QUOTE".into(),
            price_precision: 1,
            base_precision: 8,
            quote_precision: 2,
            base_minimum_transaction: dec!(0.01),
            quote_minimum_transaction: dec!(10),
            maker_margin: 0.0,
            taker_margin: 0.0,
            force_maker: true,
            score_threshold: 0.05,
            min_trend_strength: None,
        }
    }

    fn balances(base: f64, quote: f64) -> AccountBalance {
        AccountBalance::new().with("BASE", base).with("QUOTE", quote)
    }

    fn ticker() -> TickerSnapshot {
        TickerSnapshot::new(100.5, 99.5, 100.0)
    }

    #[test]
    fn test_allocation_ratios() {
        let allocation = Allocation::compute(1.0, 1000.0, 100.0, 0.2).unwrap();
        assert_relative_eq!(allocation.total_value_in_base, 11.0);
        assert_relative_eq!(allocation.current_ratio, 1.0 / 11.0);
        assert_relative_eq!(allocation.target_ratio, 1.0 / 11.0 + 0.2);
        assert_relative_eq!(allocation.buy_multiplier(), 0.22, epsilon = 1e-12);
    }

    #[test]
    fn test_allocation_target_clamped() {
        let allocation = Allocation::compute(2.0, 0.0, 100.0, -1.0).unwrap();
        assert_eq!(allocation.current_ratio, 1.0);
        assert_eq!(allocation.target_ratio, 0.0);

        let allocation = Allocation::compute(0.0, 500.0, 100.0, 1.0).unwrap();
        assert_eq!(allocation.target_ratio, 1.0);
        assert!(Allocation::compute(0.0, 0.0, 100.0, 0.5).is_none());
    }

    #[test]
    fn test_buy_scenario() {
        let sizer = PositionSizer::new(config());
        let intent = sizer
            .size(&Signal::new(0.2), &balances(1.0, 1000.0), &ticker())
            .unwrap()
            .expect("buy expected");

        assert_eq!(intent.side, OrderSide::Buy);
        assert_eq!(intent.order_type, OrderType::Limit);
        assert!(intent.post_only);
        assert_eq!(intent.price, dec!(100.5));
        // 1000 * 0.22, truncated to cents
        assert!(intent.cost >= dec!(219.99) && intent.cost <= dec!(220));
        assert_eq!(intent.cost, truncate(intent.cost, 2));
        assert_eq!(intent.volume, truncate(intent.cost / dec!(100.5), 8));
        assert!(intent.volume * intent.price <= intent.cost);
    }

    #[test]
    fn test_buy_below_quote_minimum() {
        let mut cfg = config();
        cfg.quote_minimum_transaction = dec!(250);
        let sizer = PositionSizer::new(cfg);

        let result = sizer.size(&Signal::new(0.2), &balances(1.0, 1000.0), &ticker()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_sell_scenario() {
        let sizer = PositionSizer::new(config());
        let intent = sizer
            .size(&Signal::new(-0.5), &balances(2.0, 0.0), &ticker())
            .unwrap()
            .expect("sell expected");

        assert_eq!(intent.side, OrderSide::Sell);
        assert_eq!(intent.price, dec!(99.5));
        assert_eq!(intent.volume, dec!(1));
        assert_eq!(intent.cost, dec!(99.5));
    }

    #[test]
    fn test_sell_below_base_minimum() {
        let sizer = PositionSizer::new(config());
        // current ratio ~0.0099, target 0 => sell everything, 0.005 < 0.01
        let result = sizer
            .size(&Signal::new(-0.5), &balances(0.005, 50.0), &ticker())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_negligible_counter_balance_places_nothing() {
        let sizer = PositionSizer::new(config());

        // 1e-15 QUOTE disappears next to 100 BASE: current == target == 1
        let result = sizer.size(&Signal::new(0.5), &balances(100.0, 1e-15), &ticker());
        assert_eq!(result, Ok(None));

        // Smallest subnormal BASE gives current == target == 0
        let result = sizer.size(&Signal::new(-0.5), &balances(5e-324, 1000.0), &ticker());
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn test_dead_zone_returns_none() {
        let sizer = PositionSizer::new(config());
        for b in [balances(1.0, 1000.0), balances(0.0, 1_000_000.0), balances(50.0, 0.0)] {
            assert!(sizer.size(&Signal::new(0.01), &b, &ticker()).unwrap().is_none());
            assert!(sizer.size(&Signal::new(-0.04), &b, &ticker()).unwrap().is_none());
        }
    }

    #[test]
    fn test_zero_score_is_error() {
        let sizer = PositionSizer::new(config());
        let result = sizer.size(&Signal::new(0.0), &balances(1.0, 1000.0), &ticker());
        assert_eq!(result, Err(SizingError::ZeroScore));
    }

    #[test]
    fn test_invalid_last_price() {
        let sizer = PositionSizer::new(config());
        let bad = TickerSnapshot::new(100.0, 99.0, 0.0);
        let result = sizer.size(&Signal::new(0.5), &balances(1.0, 1000.0), &bad);
        assert!(matches!(result, Err(SizingError::InvalidTicker(_))));
    }

    #[test]
    fn test_buy_requires_quote_balance() {
        let sizer = PositionSizer::new(config());
        let result = sizer.size(&Signal::new(0.5), &balances(3.0, 0.0), &ticker()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_sell_requires_base_balance() {
        let sizer = PositionSizer::new(config());
        let result = sizer.size(&Signal::new(-0.5), &balances(0.0, 1000.0), &ticker()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_trend_gate() {
        let mut cfg = config();
        cfg.min_trend_strength = Some(25.0);
        let sizer = PositionSizer::new(cfg);
        let b = balances(1.0, 1000.0);

        assert!(sizer.size(&Signal::new(0.2), &b, &ticker()).unwrap().is_none());
        assert!(sizer
            .size(&Signal::new(0.2).with_trend_strength(18.0), &b, &ticker())
            .unwrap()
            .is_none());
        assert!(sizer
            .size(&Signal::new(0.2).with_trend_strength(31.0), &b, &ticker())
            .unwrap()
            .is_some());

        // Sells are not gated
        assert!(sizer.size(&Signal::new(-0.2), &b, &ticker()).unwrap().is_some());
    }

    #[test]
    fn test_market_order_uses_taker_margin() {
        let mut cfg = config();
        cfg.force_maker = false;
        cfg.maker_margin = 5.0;
        cfg.taker_margin = 0.25;
        let sizer = PositionSizer::new(cfg);

        let intent = sizer
            .size(&Signal::new(0.2), &balances(1.0, 1000.0), &ticker())
            .unwrap()
            .unwrap();
        assert_eq!(intent.order_type, OrderType::Market);
        assert!(!intent.post_only);
        // 100.5 + 0.25 truncated to one decimal
        assert_eq!(intent.price, dec!(100.7));
    }
}
