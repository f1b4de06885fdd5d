//! Order Executor
//!
//! One rebalancing attempt per call:
//! Idle -> BalanceFetched -> PriceFetched -> Sized -> Submitted -> Done.
//!
//! Venue calls go through the bounded `RetryPolicy`. Business rejections
//! (invalid volume, insufficient funds) end the attempt with `Ok(None)`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::order::{OrderRequest, OrderResult};
use crate::domain::signal::Signal;
use crate::domain::sizing::{PositionSizer, SizingError};
use crate::ports::exchange::{ExchangeError, ExchangePort};
use super::retry::RetryPolicy;
use super::shutdown::Shutdown;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Specified score is invalid: a zero score must not reach order execution")]
    ZeroScore,

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Sizing error: {0}")]
    Sizing(#[from] SizingError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        last_error: ExchangeError,
    },

    #[error("Cancelled by shutdown")]
    Cancelled,
}

pub struct OrderExecutor {
    pair: String,
    order_expiry_seconds: Option<u64>,
    sizer: PositionSizer,
    exchange: Arc<dyn ExchangePort>,
    retry: RetryPolicy,
}

impl OrderExecutor {
    pub fn new(pair: impl Into<String>, sizer: PositionSizer, exchange: Arc<dyn ExchangePort>, retry: RetryPolicy) -> Self {
        Self {
            pair: pair.into(),
            order_expiry_seconds: None,
            sizer,
            exchange,
            retry,
        }
    }

    /// Relative expiry sent with every order
    pub fn with_order_expiry(mut self, seconds: u64) -> Self {
        self.order_expiry_seconds = Some(seconds);
        self
    }

    pub fn exchange(&self) -> &Arc<dyn ExchangePort> {
        &self.exchange
    }

    pub fn sizer(&self) -> &PositionSizer {
        &self.sizer
    }

    /// Size and submit one order for `signal`.
    ///
    /// Returns `Ok(None)` when no order is warranted or the venue rejects it
    /// as a business rule. Shutdown is honoured at every venue call and
    /// re-checked immediately before submission.
    pub async fn place_order(
        &self,
        signal: Signal,
        shutdown: &mut Shutdown,
    ) -> Result<Option<OrderResult>, ExecutionError> {
        if signal.score == 0.0 {
            return Err(ExecutionError::ZeroScore);
        }
        signal.validate().map_err(ExecutionError::InvalidSignal)?;
        let venue = self.exchange.name();

        let balances = self
            .retry
            .retry("get_balance", shutdown, || self.exchange.get_balance())
            .await?;
        debug!(venue, ?balances, "Balance fetched");

        let ticker = self
            .retry
            .retry("get_ticker", shutdown, || self.exchange.get_ticker())
            .await?;
        debug!(venue, ask = ticker.ask, bid = ticker.bid, last = ticker.last, "Price fetched");

        let intent = match self.sizer.size(&signal, &balances, &ticker)? {
            Some(intent) => intent,
            None => {
                info!(score = signal.score, "No order warranted");
                return Ok(None);
            }
        };
        debug!(?intent, "Order sized");

        let request = OrderRequest::from_intent(&self.pair, &intent, self.order_expiry_seconds);
        let submitted = self
            .retry
            .retry("submit_order", shutdown, || self.exchange.submit_order(&request))
            .await;

        match submitted {
            Ok(txid) => {
                let result = OrderResult::from_intent(txid, &intent);
                info!(
                    venue,
                    side = %result.side,
                    price = %result.price,
                    volume = %result.volume,
                    cost = %result.cost,
                    txid = ?result.txid,
                    "Order submitted"
                );
                Ok(Some(result))
            }
            Err(ExecutionError::Exchange(error)) if error.is_rejection() => {
                warn!(venue, side = %intent.side, volume = %intent.volume, "Order rejected: {}", error);
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}
