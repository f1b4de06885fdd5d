//! Rebalancer - two-asset portfolio rebalancing library
//!
//! Scores closed price periods with weighted indicator signals and moves the
//! base/quote allocation toward the score with precision-safe orders.
//!
//! # Modules
//!
//! - `domain`: Core types (PricePeriod, AccountBalance, orders, PositionSizer)
//! - `ports`: Trait abstractions (PriceHistoryPort, ExchangePort)
//! - `strategy`: Indicators, scoring functions, registry and combiner
//! - `adapters`: External implementations (Kraken, paper venue, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Order executor, retry policy and orchestrator

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
