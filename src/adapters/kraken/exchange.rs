//! Kraken implementation of the exchange port

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::account::{AccountBalance, TickerSnapshot};
use crate::domain::order::{OrderRequest, OrderType};
use crate::ports::exchange::{ExchangeError, ExchangePort};
use super::client::KrakenClient;
use super::types::{parse_number, AddOrderResult, BalanceResult, TickerInfo};

/// Spot account on Kraken trading one pair
#[derive(Debug, Clone)]
pub struct KrakenExchange {
    client: KrakenClient,
    pair: String,
    base_asset: String,
    quote_asset: String,
}

impl KrakenExchange {
    pub fn new(client: KrakenClient, pair: &str, base_asset: &str, quote_asset: &str) -> Self {
        Self {
            client,
            pair: pair.to_string(),
            base_asset: base_asset.to_string(),
            quote_asset: quote_asset.to_string(),
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Check the configured pair exists (AssetPairs)
    pub async fn verify_pair(&self) -> Result<(), ExchangeError> {
        let pairs: HashMap<String, Value> = self
            .client
            .public("AssetPairs", &[("pair", self.pair.clone())])
            .await
            .map_err(|e| match e {
                ExchangeError::UnknownPair(_) => {
                    ExchangeError::UnknownPair(format!("Specified asset pair is invalid: {}", self.pair))
                }
                other => other,
            })?;

        if pairs.is_empty() {
            return Err(ExchangeError::UnknownPair(self.pair.clone()));
        }
        info!("Verified Kraken pair {}", self.pair);
        Ok(())
    }
}

/// AddOrder form fields for `request`
pub fn order_params(request: &OrderRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("pair", request.pair.clone()),
        ("type", request.side.to_string()),
        ("ordertype", request.order_type.to_string()),
        ("volume", request.volume.normalize().to_string()),
    ];

    if request.order_type == OrderType::Limit {
        if let Some(price) = request.price {
            params.push(("price", price.normalize().to_string()));
        }
    }
    if let Some(seconds) = request.expire_after_seconds {
        params.push(("expiretm", format!("+{}", seconds)));
    }
    if request.post_only {
        params.push(("oflags", "post".to_string()));
    }

    params
}

/// Pick the ticker entry for `pair`. Kraken may key the result by its
/// canonical pair name, so a single entry is accepted as-is.
fn select_ticker(mut tickers: HashMap<String, TickerInfo>, pair: &str) -> Result<TickerSnapshot, ExchangeError> {
    if let Some(info) = tickers.remove(pair) {
        return info.snapshot();
    }
    if tickers.len() == 1 {
        if let Some(info) = tickers.into_values().next() {
            return info.snapshot();
        }
    }
    Err(ExchangeError::Parse(format!("ticker response has no entry for {}", pair)))
}

fn parse_balances(raw: BalanceResult, assets: &[&str]) -> Result<AccountBalance, ExchangeError> {
    raw.into_iter()
        .filter(|(asset, _)| assets.contains(&asset.as_str()))
        .map(|(asset, amount)| {
            let quantity = parse_number(&amount, &asset)?;
            Ok((asset, quantity))
        })
        .collect()
}

#[async_trait]
impl ExchangePort for KrakenExchange {
    fn name(&self) -> &str {
        "kraken"
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExchangeError> {
        let raw: BalanceResult = self.client.private("Balance", &[]).await?;
        parse_balances(raw, &[self.base_asset.as_str(), self.quote_asset.as_str()])
    }

    async fn get_ticker(&self) -> Result<TickerSnapshot, ExchangeError> {
        let tickers: HashMap<String, TickerInfo> =
            self.client.public("Ticker", &[("pair", self.pair.clone())]).await?;
        select_ticker(tickers, &self.pair)
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<Vec<String>, ExchangeError> {
        let params = order_params(request);
        let result: AddOrderResult = self.client.private("AddOrder", &params).await?;
        if let Some(descr) = &result.descr {
            debug!("Kraken accepted order: {}", descr.order);
        }
        Ok(result.txid)
    }
}
