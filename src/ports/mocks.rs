use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::account::{AccountBalance, TickerSnapshot};
use crate::domain::order::OrderRequest;
use crate::domain::period::PricePeriod;
use super::exchange::{ExchangeError, ExchangePort};
use super::market_data::{MarketDataError, PriceHistoryPort};

/// Mock exchange that records calls and replays scripted responses.
///
/// Scripted errors are consumed front to back; once a queue is empty the
/// call succeeds with the configured balance / ticker / a generated txid.
#[derive(Debug, Default, Clone)]
pub struct MockExchange {
    balance: Arc<Mutex<AccountBalance>>,
    ticker: Arc<Mutex<TickerSnapshot>>,
    balance_errors: Arc<Mutex<VecDeque<ExchangeError>>>,
    ticker_errors: Arc<Mutex<VecDeque<ExchangeError>>>,
    submit_responses: Arc<Mutex<VecDeque<Result<Vec<String>, ExchangeError>>>>,
    orders: Arc<Mutex<Vec<OrderRequest>>>,
    balance_calls: Arc<Mutex<usize>>,
}

impl MockExchange {
    pub fn new(balance: AccountBalance, ticker: TickerSnapshot) -> Self {
        Self {
            balance: Arc::new(Mutex::new(balance)),
            ticker: Arc::new(Mutex::new(ticker)),
            ..Self::default()
        }
    }

    /// Builder method to queue a balance failure
    pub fn with_balance_error(self, error: ExchangeError) -> Self {
        self.balance_errors.lock().unwrap().push_back(error);
        self
    }

    /// Builder method to queue a ticker failure
    pub fn with_ticker_error(self, error: ExchangeError) -> Self {
        self.ticker_errors.lock().unwrap().push_back(error);
        self
    }

    /// Builder method to queue the next order submission outcome
    pub fn with_submit_response(self, response: Result<Vec<String>, ExchangeError>) -> Self {
        self.submit_responses.lock().unwrap().push_back(response);
        self
    }

    /// Every order request submitted, including rejected ones
    pub fn get_orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn balance_calls(&self) -> usize {
        *self.balance_calls.lock().unwrap()
    }
}

#[async_trait]
impl ExchangePort for MockExchange {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_balance(&self) -> Result<AccountBalance, ExchangeError> {
        *self.balance_calls.lock().unwrap() += 1;
        if let Some(error) = self.balance_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.balance.lock().unwrap().clone())
    }

    async fn get_ticker(&self) -> Result<TickerSnapshot, ExchangeError> {
        if let Some(error) = self.ticker_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(*self.ticker.lock().unwrap())
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<Vec<String>, ExchangeError> {
        let mut orders = self.orders.lock().unwrap();
        orders.push(request.clone());
        let n = orders.len();
        drop(orders);

        self.submit_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![format!("MOCK-TX-{}", n)]))
    }
}

/// Mock price history serving a fixed series
#[derive(Debug, Default, Clone)]
pub struct MockPriceHistory {
    data: Arc<Mutex<Vec<PricePeriod>>>,
    error: Arc<Mutex<Option<MarketDataError>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockPriceHistory {
    pub fn new(data: Vec<PricePeriod>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            ..Self::default()
        }
    }

    /// Builder method to fail every call with `error`
    pub fn with_error(self, error: MarketDataError) -> Self {
        *self.error.lock().unwrap() = Some(error);
        self
    }

    pub fn set_data(&self, data: Vec<PricePeriod>) {
        *self.data.lock().unwrap() = data;
    }

    pub fn get_calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PriceHistoryPort for MockPriceHistory {
    async fn get_data(&self) -> Result<Vec<PricePeriod>, MarketDataError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(error) = self.error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.data.lock().unwrap().clone())
    }
}
