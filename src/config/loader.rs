//! Configuration Loader
//!
//! Loads and validates the rebalancer configuration from a TOML file.
//! API credentials never live in the file; they come from `KRAKEN_KEY` and
//! `KRAKEN_SECRET` (optionally via a `.env` file).

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::application::retry::RetryPolicy;
use crate::domain::sizing::SizingConfig;
use crate::strategy::registry::{ScoreFunctionSpec, ScoringRegistry};

/// Candle intervals (minutes) served by the Kraken OHLC endpoint
pub const SUPPORTED_INTERVALS: [u32; 9] = [1, 5, 15, 30, 60, 240, 1440, 10080, 21600];

/// Largest scale a `Decimal` can carry
const MAX_PRECISION: u32 = 28;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pair: PairSection,
    pub exchange: ExchangeSection,
    pub source: SourceSection,
    pub strategy: StrategySection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// The two assets being rebalanced
#[derive(Debug, Clone, Deserialize)]
pub struct PairSection {
    /// Venue asset code of the base asset (e.g. "XXBT")
    pub base: String,
    /// Venue asset code of the quote asset (e.g. "ZUSD")
    pub quote: String,
    /// Venue pair name used for orders and market data (e.g. "XXBTZUSD")
    pub symbol: String,
}

/// Which venue orders are sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    #[default]
    Kraken,
    Paper,
}

/// Venue rules and order style
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSection {
    #[serde(default)]
    pub kind: ExchangeKind,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    pub price_precision: u32,
    pub base_precision: u32,
    pub quote_precision: u32,
    pub base_minimum_transaction: Decimal,
    pub quote_minimum_transaction: Decimal,
    /// Quote units added to the ask (buy) or taken off the bid (sell)
    #[serde(default)]
    pub maker_margin: f64,
    #[serde(default)]
    pub taker_margin: f64,
    /// Post-only limit orders instead of market orders
    #[serde(default = "default_true")]
    pub force_maker: bool,
    /// Relative order expiry; 0 sends none
    #[serde(default = "default_order_expiry")]
    pub order_expiry_seconds: u64,
    #[serde(default)]
    pub paper: PaperSection,
}

impl ExchangeSection {
    /// Kraken API key and secret from the environment
    pub fn credentials(&self) -> (Option<String>, Option<String>) {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        (read("KRAKEN_KEY"), read("KRAKEN_SECRET"))
    }

    pub fn order_expiry(&self) -> Option<u64> {
        (self.order_expiry_seconds > 0).then_some(self.order_expiry_seconds)
    }
}

/// Starting state of the paper venue
#[derive(Debug, Clone, Deserialize)]
pub struct PaperSection {
    #[serde(default)]
    pub starting_base: f64,
    #[serde(default = "default_paper_quote")]
    pub starting_quote: f64,
    #[serde(default = "default_paper_spread")]
    pub spread_bps: f64,
}

impl Default for PaperSection {
    fn default() -> Self {
        Self {
            starting_base: 0.0,
            starting_quote: default_paper_quote(),
            spread_bps: default_paper_spread(),
        }
    }
}

/// Price history source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    /// Candle length in minutes
    pub interval_minutes: u32,
    /// Closed candles kept for scoring
    pub min_data_length: usize,
}

impl SourceSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }
}

/// Scoring and decision knobs
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySection {
    /// Dead zone around zero where no order is placed
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
    /// Minimum ADX before buying
    #[serde(default)]
    pub min_trend_strength: Option<f64>,
    /// ADX period; required when `min_trend_strength` is set
    #[serde(default)]
    pub trend_period: Option<usize>,
    pub score_functions: Vec<ScoreFunctionSpec>,
}

/// Retry and scheduling
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionSection {
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Delay after each period boundary so the venue can close the candle
    #[serde(default = "default_settle_delay")]
    pub settle_delay_seconds: u64,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            settle_delay_seconds: default_settle_delay(),
        }
    }
}

impl ExecutionSection {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_seconds)
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.kraken.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_order_expiry() -> u64 {
    30
}

fn default_paper_quote() -> f64 {
    10_000.0
}

fn default_paper_spread() -> f64 {
    10.0
}

fn default_score_threshold() -> f64 {
    0.05
}

fn default_settle_delay() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// Load configuration from a TOML file. `~` in the path is expanded.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let raw = path.as_ref().to_string_lossy();
    let expanded = shellexpand::tilde(&raw);
    let content = std::fs::read_to_string(&*expanded)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Pair
        for (field, value) in [
            ("pair.base", &self.pair.base),
            ("pair.quote", &self.pair.quote),
            ("pair.symbol", &self.pair.symbol),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(format!("{} cannot be empty", field)));
            }
        }
        if self.pair.base == self.pair.quote {
            return Err(invalid("pair.base and pair.quote must differ"));
        }

        // Exchange
        let exchange = &self.exchange;
        for (field, value) in [
            ("price_precision", exchange.price_precision),
            ("base_precision", exchange.base_precision),
            ("quote_precision", exchange.quote_precision),
        ] {
            if value > MAX_PRECISION {
                return Err(invalid(format!("{} must be 0-{}, got {}", field, MAX_PRECISION, value)));
            }
        }

        if exchange.base_minimum_transaction <= Decimal::ZERO {
            return Err(invalid(format!(
                "base_minimum_transaction must be > 0, got {}",
                exchange.base_minimum_transaction
            )));
        }
        if exchange.quote_minimum_transaction <= Decimal::ZERO {
            return Err(invalid(format!(
                "quote_minimum_transaction must be > 0, got {}",
                exchange.quote_minimum_transaction
            )));
        }

        for (field, value) in [("maker_margin", exchange.maker_margin), ("taker_margin", exchange.taker_margin)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("{} must be a finite price offset >= 0, got {}", field, value)));
            }
        }

        if exchange.kind == ExchangeKind::Kraken && exchange.api_url.is_empty() {
            return Err(invalid("api_url cannot be empty"));
        }
        if exchange.paper.starting_base < 0.0 || exchange.paper.starting_quote < 0.0 {
            return Err(invalid("paper starting balances must be >= 0"));
        }
        if exchange.paper.spread_bps < 0.0 {
            return Err(invalid(format!("paper spread_bps must be >= 0, got {}", exchange.paper.spread_bps)));
        }

        // Source
        if !SUPPORTED_INTERVALS.contains(&self.source.interval_minutes) {
            return Err(invalid(format!(
                "interval_minutes must be one of {:?}, got {}",
                SUPPORTED_INTERVALS, self.source.interval_minutes
            )));
        }
        if self.source.min_data_length == 0 {
            return Err(invalid("min_data_length must be > 0"));
        }

        // Strategy
        let strategy = &self.strategy;
        if !(0.0..1.0).contains(&strategy.score_threshold) {
            return Err(invalid(format!(
                "score_threshold must be in [0, 1), got {}",
                strategy.score_threshold
            )));
        }
        if strategy.min_trend_strength.is_some() && strategy.trend_period.is_none() {
            return Err(invalid("min_trend_strength requires trend_period"));
        }
        if let Some(min) = strategy.min_trend_strength {
            if !(0.0..=100.0).contains(&min) {
                return Err(invalid(format!("min_trend_strength must be 0-100, got {}", min)));
            }
        }
        if strategy.trend_period == Some(0) {
            return Err(invalid("trend_period must be > 0"));
        }

        if strategy.score_functions.is_empty() {
            return Err(invalid("at least one score function is required"));
        }
        let registry = ScoringRegistry::with_defaults();
        for spec in &strategy.score_functions {
            if !registry.contains(&spec.function_name) {
                return Err(invalid(format!(
                    "unknown score function '{}' (known: {})",
                    spec.function_name,
                    registry.tags().join(", ")
                )));
            }
            if !spec.weight.is_finite() {
                return Err(invalid(format!(
                    "weight of '{}' must be finite, got {}",
                    spec.function_name, spec.weight
                )));
            }
        }

        // Execution
        let retry = &self.execution.retry;
        if retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be >= 1"));
        }
        if !(retry.backoff_factor >= 1.0) {
            return Err(invalid(format!("retry.backoff_factor must be >= 1, got {}", retry.backoff_factor)));
        }
        if !(0.0..=1.0).contains(&retry.jitter) {
            return Err(invalid(format!("retry.jitter must be 0-1, got {}", retry.jitter)));
        }

        Ok(())
    }
}

// Conversion from Config to SizingConfig
impl From<&Config> for SizingConfig {
    fn from(config: &Config) -> Self {
        SizingConfig {
            base_asset: config.pair.base.clone(),
            quote_asset: config.pair.quote.clone(),
            price_precision: config.exchange.price_precision,
            base_precision: config.exchange.base_precision,
            quote_precision: config.exchange.quote_precision,
            base_minimum_transaction: config.exchange.base_minimum_transaction,
            quote_minimum_transaction: config.exchange.quote_minimum_transaction,
            maker_margin: config.exchange.maker_margin,
            taker_margin: config.exchange.taker_margin,
            force_maker: config.exchange.force_maker,
            score_threshold: config.strategy.score_threshold,
            min_trend_strength: config.strategy.min_trend_strength,
        }
    }
}
