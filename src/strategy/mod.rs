//! Strategy Layer - Indicators, scoring functions and score combination
//!
//! Everything here is pure and synchronous:
//! - `indicators`: SMA, EMA, stochastic %K / %D at a target index
//! - `trend`: ADX trend strength used by the optional buy gate
//! - `scoring`: crossover scoring functions producing values in [-1, 1]
//! - `registry`: configuration tag -> scoring function constructor
//! - `combiner`: weighted, rounded and clamped decision score

pub mod indicators;
pub mod trend;
pub mod scoring;
pub mod registry;
pub mod combiner;

pub use indicators::{
    calculate_ema, calculate_sma, calculate_stochastic_d, calculate_stochastic_k, IndicatorError,
    DEFAULT_SMOOTHING,
};
pub use trend::{adx_warmup, calculate_adx, AdxReading, TrendRegime};
pub use scoring::{EmaScore, ScoringFunction, StochasticScore};
pub use registry::{ScoreArg, ScoreFunctionSpec, ScoringConstructor, ScoringRegistry};
pub use combiner::{combine_score_functions, CombinedScore, ScoreContribution, WeightedScore};
