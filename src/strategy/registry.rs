//! Scoring function registry
//!
//! Maps configuration tags to constructors so unknown names and malformed
//! arguments fail at startup, never mid-tick.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::period::PriceSource;
use super::indicators::{IndicatorError, DEFAULT_SMOOTHING};
use super::scoring::{EmaScore, ScoringFunction, StochasticScore};

/// One positional argument from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreArg {
    Number(f64),
    Numbers(Vec<f64>),
    Text(String),
}

/// A configured scoring function with its weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFunctionSpec {
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<ScoreArg>,
    pub weight: f64,
}

impl ScoreFunctionSpec {
    pub fn new(function_name: impl Into<String>, args: Vec<ScoreArg>, weight: f64) -> Self {
        Self {
            function_name: function_name.into(),
            args,
            weight,
        }
    }
}

pub type ScoringConstructor = fn(&[ScoreArg]) -> Result<Box<dyn ScoringFunction>, IndicatorError>;

/// Tag -> constructor table
#[derive(Clone, Default)]
pub struct ScoringRegistry {
    constructors: HashMap<String, ScoringConstructor>,
}

impl std::fmt::Debug for ScoringRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringRegistry").field("tags", &self.tags()).finish()
    }
}

impl ScoringRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `emaScore` and `stochasticScore`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EmaScore::NAME, build_ema_score);
        registry.register(StochasticScore::NAME, build_stochastic_score);
        registry
    }

    pub fn register(&mut self, tag: impl Into<String>, constructor: ScoringConstructor) {
        self.constructors.insert(tag.into(), constructor);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Resolve and construct the function named by `spec`
    pub fn build(&self, spec: &ScoreFunctionSpec) -> Result<Box<dyn ScoringFunction>, IndicatorError> {
        let constructor = self
            .constructors
            .get(&spec.function_name)
            .ok_or_else(|| IndicatorError::UnknownScoringFunction(spec.function_name.clone()))?;
        constructor(&spec.args)
    }
}

/// Positional argument reader that reports errors against one function
struct Args<'a> {
    function: &'static str,
    args: &'a [ScoreArg],
}

impl<'a> Args<'a> {
    fn new(function: &'static str, args: &'a [ScoreArg], max: usize) -> Result<Self, IndicatorError> {
        let reader = Self { function, args };
        if args.len() > max {
            return Err(reader.invalid(format!("expected at most {} arguments, got {}", max, args.len())));
        }
        Ok(reader)
    }

    fn invalid(&self, reason: String) -> IndicatorError {
        IndicatorError::InvalidArguments {
            function: self.function.to_string(),
            reason,
        }
    }

    fn count(&self, index: usize, name: &str, value: f64) -> Result<usize, IndicatorError> {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
            Ok(value as usize)
        } else {
            Err(self.invalid(format!("argument {} ({}) must be a whole number, got {}", index, name, value)))
        }
    }

    fn number(&self, index: usize, name: &str) -> Result<f64, IndicatorError> {
        match self.args.get(index) {
            Some(ScoreArg::Number(value)) => Ok(*value),
            Some(other) => Err(self.invalid(format!("argument {} ({}) must be a number, got {:?}", index, name, other))),
            None => Err(self.invalid(format!("missing argument {} ({})", index, name))),
        }
    }

    fn optional_number(&self, index: usize, name: &str, default: f64) -> Result<f64, IndicatorError> {
        match self.args.get(index) {
            None => Ok(default),
            Some(_) => self.number(index, name),
        }
    }

    fn periods(&self, index: usize, name: &str) -> Result<usize, IndicatorError> {
        let value = self.number(index, name)?;
        self.count(index, name, value)
    }

    fn period_list(&self, index: usize, name: &str) -> Result<Vec<usize>, IndicatorError> {
        match self.args.get(index) {
            Some(ScoreArg::Numbers(values)) => values.iter().map(|&v| self.count(index, name, v)).collect(),
            Some(other) => Err(self.invalid(format!("argument {} ({}) must be a list, got {:?}", index, name, other))),
            None => Err(self.invalid(format!("missing argument {} ({})", index, name))),
        }
    }

    fn source(&self, index: usize) -> Result<PriceSource, IndicatorError> {
        match self.args.get(index) {
            None => Ok(PriceSource::default()),
            Some(ScoreArg::Text(text)) => Ok(PriceSource::from_str(text)?),
            Some(other) => Err(self.invalid(format!("argument {} (source) must be a string, got {:?}", index, other))),
        }
    }
}

/// `[periods, smoothing?, source?]`
fn build_ema_score(args: &[ScoreArg]) -> Result<Box<dyn ScoringFunction>, IndicatorError> {
    let args = Args::new(EmaScore::NAME, args, 3)?;
    let periods = args.period_list(0, "periods")?;
    let smoothing = args.optional_number(1, "smoothing", DEFAULT_SMOOTHING)?;
    let source = args.source(2)?;
    Ok(Box::new(EmaScore::new(periods, smoothing, source)?))
}

/// `[k, d, overbought, oversold, source?]`
fn build_stochastic_score(args: &[ScoreArg]) -> Result<Box<dyn ScoringFunction>, IndicatorError> {
    let args = Args::new(StochasticScore::NAME, args, 5)?;
    let k = args.periods(0, "k")?;
    let d = args.periods(1, "d")?;
    let overbought = args.number(2, "overbought")?;
    let oversold = args.number(3, "oversold")?;
    let source = args.source(4)?;
    Ok(Box::new(StochasticScore::new(k, d, overbought, oversold, source)?))
}
