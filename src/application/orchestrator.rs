//! Rebalancing Orchestrator
//!
//! Period-aligned loop: fetch history, score it, optionally measure trend
//! strength, then hand the signal to the order executor. A failed cycle is
//! logged and the loop waits for the next period boundary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::domain::order::OrderResult;
use crate::domain::signal::Signal;
use crate::ports::market_data::{MarketDataError, PriceHistoryPort};
use crate::strategy::combiner::CombinedScore;
use crate::strategy::indicators::IndicatorError;
use crate::strategy::trend::calculate_adx;
use super::executor::{ExecutionError, OrderExecutor};
use super::shutdown::Shutdown;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] IndicatorError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Not enough price history: need {required} periods, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Cancelled by shutdown")]
    Cancelled,
}

impl OrchestratorError {
    fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Execution(ExecutionError::Cancelled))
    }
}

/// What one cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Combined score was exactly zero
    NoSignal,
    /// Non-zero score, but sizing or the venue produced no order
    NoOrder { score: f64 },
    Placed { score: f64, order: OrderResult },
}

pub struct Orchestrator {
    history: Arc<dyn PriceHistoryPort>,
    scorer: CombinedScore,
    executor: OrderExecutor,
    period: Duration,
    settle_delay: Duration,
    trend_period: Option<usize>,
}

impl Orchestrator {
    pub fn new(
        history: Arc<dyn PriceHistoryPort>,
        scorer: CombinedScore,
        executor: OrderExecutor,
        period: Duration,
    ) -> Self {
        Self {
            history,
            scorer,
            executor,
            period,
            settle_delay: Duration::ZERO,
            trend_period: None,
        }
    }

    /// Wait this long after each period boundary before running a cycle
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Attach an ADX reading of `period` to every signal
    pub fn with_trend_period(mut self, period: usize) -> Self {
        self.trend_period = Some(period);
        self
    }

    pub fn scorer(&self) -> &CombinedScore {
        &self.scorer
    }

    /// Run cycles on every period boundary until shutdown
    pub async fn run(&self, mut shutdown: Shutdown) -> Result<(), OrchestratorError> {
        info!(
            "Starting rebalancer - Venue: {}, Period: {:?}, Lookback: {} periods",
            self.executor.exchange().name(),
            self.period,
            self.scorer.lookback()
        );

        loop {
            match self.tick(&mut shutdown).await {
                Ok(outcome) => debug!(?outcome, "Cycle complete"),
                Err(e) if e.is_cancelled() => break,
                // Continue running despite errors
                Err(e) => error!("Cycle error: {}", e),
            }

            let wait = time_until_next_period(Utc::now(), self.period) + self.settle_delay;
            debug!("Next cycle in {:?}", wait);

            tokio::select! {
                _ = shutdown.triggered() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("Rebalancer stopped");
        Ok(())
    }

    /// Execute one rebalancing cycle
    pub async fn tick(&self, shutdown: &mut Shutdown) -> Result<CycleOutcome, OrchestratorError> {
        let data = tokio::select! {
            _ = shutdown.triggered() => return Err(OrchestratorError::Cancelled),
            data = self.history.get_data() => data?,
        };

        let required = self.scorer.lookback();
        if data.len() < required {
            return Err(OrchestratorError::InsufficientHistory {
                required,
                available: data.len(),
            });
        }

        let score = self.scorer.compute_score(&data, None)?;
        let newest = data.len() - 1;
        info!(score, period_start = %data[newest].timestamp, "Score computed");

        if score == 0.0 {
            return Ok(CycleOutcome::NoSignal);
        }

        let mut signal = Signal::new(score);
        if let Some(period) = self.trend_period {
            let reading = calculate_adx(&data, period, newest)?;
            debug!(
                "ADX {:.1} (+DI {:.1}, -DI {:.1}) regime {:?}",
                reading.adx,
                reading.plus_di,
                reading.minus_di,
                reading.regime()
            );
            signal = signal.with_trend_strength(reading.adx);
        }

        match self.executor.place_order(signal, shutdown).await? {
            Some(order) => Ok(CycleOutcome::Placed { score, order }),
            None => Ok(CycleOutcome::NoOrder { score }),
        }
    }
}

/// Time from `now` until the next multiple of `period` since the Unix epoch
pub fn time_until_next_period(now: DateTime<Utc>, period: Duration) -> Duration {
    let period_ms = period.as_millis() as i64;
    if period_ms <= 0 {
        return Duration::ZERO;
    }
    let elapsed = now.timestamp_millis().rem_euclid(period_ms);
    Duration::from_millis((period_ms - elapsed) as u64)
}
