//! Paper Trading Venue
//!
//! In-memory balances priced off the latest closed candle. Orders fill
//! immediately at the requested price (or the touch for market orders).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use tracing::info;

use crate::domain::account::{AccountBalance, TickerSnapshot};
use crate::domain::order::{OrderRequest, OrderSide};
use crate::ports::exchange::{ExchangeError, ExchangePort};
use crate::ports::market_data::{MarketDataError, PriceHistoryPort};

pub struct PaperExchange {
    balances: Mutex<AccountBalance>,
    history: Arc<dyn PriceHistoryPort>,
    base_asset: String,
    quote_asset: String,
    /// Full bid/ask spread around the last close
    spread_bps: f64,
    fills: AtomicU64,
}

impl PaperExchange {
    pub fn new(
        history: Arc<dyn PriceHistoryPort>,
        base_asset: &str,
        quote_asset: &str,
        starting_base: f64,
        starting_quote: f64,
    ) -> Self {
        let balances = AccountBalance::new()
            .with(base_asset, starting_base)
            .with(quote_asset, starting_quote);

        Self {
            balances: Mutex::new(balances),
            history,
            base_asset: base_asset.to_string(),
            quote_asset: quote_asset.to_string(),
            spread_bps: 0.0,
            fills: AtomicU64::new(0),
        }
    }

    pub fn with_spread_bps(mut self, spread_bps: f64) -> Self {
        self.spread_bps = spread_bps.max(0.0);
        self
    }

    fn lock_balances(&self) -> Result<std::sync::MutexGuard<'_, AccountBalance>, ExchangeError> {
        self.balances
            .lock()
            .map_err(|_| ExchangeError::Api("paper balances lock poisoned".into()))
    }
}

fn history_error(error: MarketDataError) -> ExchangeError {
    match error {
        MarketDataError::Http(msg) => ExchangeError::Http(msg),
        MarketDataError::Parse(msg) => ExchangeError::Parse(msg),
        other => ExchangeError::Api(other.to_string()),
    }
}

#[async_trait]
impl ExchangePort for PaperExchange {
    fn name(&self) -> &str {
        "paper"
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExchangeError> {
        Ok(self.lock_balances()?.clone())
    }

    async fn get_ticker(&self) -> Result<TickerSnapshot, ExchangeError> {
        let data = self.history.get_data().await.map_err(history_error)?;
        let last = data
            .last()
            .map(|p| p.ohlc.close)
            .ok_or_else(|| history_error(MarketDataError::Empty))?;

        let half_spread = last * self.spread_bps / 20_000.0;
        Ok(TickerSnapshot::new(last + half_spread, last - half_spread, last))
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<Vec<String>, ExchangeError> {
        let volume = request
            .volume
            .to_f64()
            .filter(|v| *v > 0.0)
            .ok_or_else(|| ExchangeError::InvalidVolume(format!("volume {}", request.volume)))?;

        let price = match request.price.and_then(|p| p.to_f64()) {
            Some(price) => price,
            None => {
                let ticker = self.get_ticker().await?;
                match request.side {
                    OrderSide::Buy => ticker.ask,
                    OrderSide::Sell => ticker.bid,
                }
            }
        };
        let cost = volume * price;

        let mut balances = self.lock_balances()?;
        let base = balances.get(&self.base_asset);
        let quote = balances.get(&self.quote_asset);

        match request.side {
            OrderSide::Buy => {
                if quote < cost {
                    return Err(ExchangeError::InsufficientFunds(format!(
                        "need {:.5} {}, have {:.5}",
                        cost, self.quote_asset, quote
                    )));
                }
                balances.set(&self.quote_asset, quote - cost);
                balances.set(&self.base_asset, base + volume);
            }
            OrderSide::Sell => {
                if base < volume {
                    return Err(ExchangeError::InsufficientFunds(format!(
                        "need {:.8} {}, have {:.8}",
                        volume, self.base_asset, base
                    )));
                }
                balances.set(&self.base_asset, base - volume);
                balances.set(&self.quote_asset, quote + cost);
            }
        }

        let txid = format!("PAPER-{}", self.fills.fetch_add(1, Ordering::SeqCst) + 1);
        info!(
            "[PAPER] {} {} {} @ {:.5} ({})",
            request.side, volume, self.base_asset, price, txid
        );
        Ok(vec![txid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderType;
    use crate::ports::mocks::MockPriceHistory;
    use crate::strategy::indicators::tests::flat_periods;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn venue(base: f64, quote: f64) -> PaperExchange {
        let history = MockPriceHistory::new(flat_periods(&[90.0, 100.0]));
        PaperExchange::new(Arc::new(history), "XXBT", "ZUSD", base, quote)
    }

    fn order(side: OrderSide, volume: rust_decimal::Decimal, price: Option<rust_decimal::Decimal>) -> OrderRequest {
        OrderRequest {
            pair: "XXBTZUSD".to_string(),
            side,
            order_type: if price.is_some() { OrderType::Limit } else { OrderType::Market },
            volume,
            price,
            post_only: price.is_some(),
            expire_after_seconds: None,
        }
    }

    #[tokio::test]
    async fn test_ticker_brackets_last_close() {
        let exchange = venue(0.0, 0.0).with_spread_bps(20.0);
        let ticker = exchange.get_ticker().await.unwrap();
        assert_relative_eq!(ticker.last, 100.0);
        assert_relative_eq!(ticker.ask, 100.1);
        assert_relative_eq!(ticker.bid, 99.9);
    }

    #[tokio::test]
    async fn test_limit_buy_moves_balances() {
        let exchange = venue(0.0, 1000.0);
        let txid = exchange
            .submit_order(&order(OrderSide::Buy, dec!(2), Some(dec!(99.5))))
            .await
            .unwrap();
        assert_eq!(txid, vec!["PAPER-1".to_string()]);

        let balance = exchange.get_balance().await.unwrap();
        assert_relative_eq!(balance.get("XXBT"), 2.0);
        assert_relative_eq!(balance.get("ZUSD"), 801.0);
    }

    #[tokio::test]
    async fn test_market_sell_fills_at_bid() {
        let exchange = venue(1.0, 0.0).with_spread_bps(20.0);
        exchange.submit_order(&order(OrderSide::Sell, dec!(0.5), None)).await.unwrap();

        let balance = exchange.get_balance().await.unwrap();
        assert_relative_eq!(balance.get("XXBT"), 0.5);
        assert_relative_eq!(balance.get("ZUSD"), 49.95, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_rejections() {
        let exchange = venue(1.0, 10.0);

        let result = exchange.submit_order(&order(OrderSide::Buy, dec!(1), Some(dec!(100)))).await;
        assert!(matches!(result, Err(ExchangeError::InsufficientFunds(_))));

        let result = exchange.submit_order(&order(OrderSide::Sell, dec!(2), Some(dec!(100)))).await;
        assert!(matches!(result, Err(ExchangeError::InsufficientFunds(_))));

        let result = exchange.submit_order(&order(OrderSide::Sell, dec!(0), Some(dec!(100)))).await;
        assert!(matches!(result, Err(ExchangeError::InvalidVolume(_))));

        // Nothing moved
        let balance = exchange.get_balance().await.unwrap();
        assert_eq!(balance.get("XXBT"), 1.0);
        assert_eq!(balance.get("ZUSD"), 10.0);
    }
}
