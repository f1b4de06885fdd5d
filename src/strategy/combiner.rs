//! Weighted combination of scoring functions into one decision score

use tracing::debug;

use crate::domain::period::PricePeriod;
use super::indicators::IndicatorError;
use super::registry::{ScoreFunctionSpec, ScoringRegistry};
use super::scoring::ScoringFunction;

/// A scoring function and its weight
#[derive(Debug)]
pub struct WeightedScore {
    pub function: Box<dyn ScoringFunction>,
    pub weight: f64,
}

/// One part's contribution, for reporting
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreContribution {
    pub name: &'static str,
    pub raw: f64,
    pub weight: f64,
}

impl ScoreContribution {
    pub fn weighted(&self) -> f64 {
        self.raw * self.weight
    }
}

/// Combined decision score over a fixed set of weighted functions
#[derive(Debug)]
pub struct CombinedScore {
    parts: Vec<WeightedScore>,
}

/// Resolve every spec through the registry. Fails on the first bad entry.
pub fn combine_score_functions(
    specs: &[ScoreFunctionSpec],
    registry: &ScoringRegistry,
) -> Result<CombinedScore, IndicatorError> {
    let parts = specs
        .iter()
        .map(|spec| {
            Ok(WeightedScore {
                function: registry.build(spec)?,
                weight: spec.weight,
            })
        })
        .collect::<Result<Vec<_>, IndicatorError>>()?;

    Ok(CombinedScore::new(parts))
}

impl CombinedScore {
    pub fn new(parts: Vec<WeightedScore>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[WeightedScore] {
        &self.parts
    }

    /// History length needed to score the newest period
    pub fn lookback(&self) -> usize {
        self.parts.iter().map(|p| p.function.lookback()).max().unwrap_or(1)
    }

    /// Per-part raw scores at `target_index`
    pub fn breakdown(&self, data: &[PricePeriod], target_index: usize) -> Result<Vec<ScoreContribution>, IndicatorError> {
        self.parts
            .iter()
            .map(|part| {
                Ok(ScoreContribution {
                    name: part.function.name(),
                    raw: part.function.score(data, target_index)?,
                    weight: part.weight,
                })
            })
            .collect()
    }

    /// Weighted sum rounded to 2 decimal places and clamped to [-1, 1]
    pub fn score(&self, data: &[PricePeriod], target_index: usize) -> Result<f64, IndicatorError> {
        let contributions = self.breakdown(data, target_index)?;
        let total: f64 = contributions.iter().map(ScoreContribution::weighted).sum();
        let score = round_to_cents(total).clamp(-1.0, 1.0);

        debug!(target_index, raw = total, score, "Combined score");
        Ok(score)
    }

    /// Score at `target_index`, or at the newest period when `None`
    pub fn compute_score(&self, data: &[PricePeriod], target_index: Option<usize>) -> Result<f64, IndicatorError> {
        let target_index = match target_index {
            Some(index) => index,
            None => data.len().checked_sub(1).ok_or(IndicatorError::TargetOutOfRange { index: 0, len: 0 })?,
        };
        self.score(data, target_index)
    }
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::indicators::tests::flat_periods;
    use crate::strategy::registry::ScoreArg;

    /// Scoring function that always returns the same value
    #[derive(Debug)]
    struct Constant(f64);

    impl ScoringFunction for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn lookback(&self) -> usize {
            1
        }

        fn score(&self, _data: &[PricePeriod], _target_index: usize) -> Result<f64, IndicatorError> {
            Ok(self.0)
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl ScoringFunction for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn lookback(&self) -> usize {
            50
        }

        fn score(&self, _data: &[PricePeriod], _target_index: usize) -> Result<f64, IndicatorError> {
            Err(IndicatorError::InvalidPeriods(0))
        }
    }

    fn part(function: impl ScoringFunction + 'static, weight: f64) -> WeightedScore {
        WeightedScore {
            function: Box::new(function),
            weight,
        }
    }

    #[test]
    fn test_weighted_sum_is_rounded() {
        let data = flat_periods(&[1.0; 3]);
        let score = CombinedScore::new(vec![
            part(Constant(0.5), 0.333),
            part(Constant(-0.25), 0.111),
        ])
        .score(&data, 2)
        .unwrap();

        // 0.1665 - 0.02775 = 0.13875
        assert_eq!(score, 0.14);
    }

    #[test]
    fn test_score_is_clamped() {
        let data = flat_periods(&[1.0; 3]);
        let high = CombinedScore::new(vec![part(Constant(1.0), 0.8), part(Constant(1.0), 0.8)]);
        assert_eq!(high.score(&data, 2).unwrap(), 1.0);

        let low = CombinedScore::new(vec![part(Constant(-1.0), 3.0)]);
        assert_eq!(low.score(&data, 2).unwrap(), -1.0);
    }

    #[test]
    fn test_first_failure_propagates() {
        let data = flat_periods(&[1.0; 3]);
        let scorer = CombinedScore::new(vec![part(Constant(0.5), 1.0), part(Failing, 1.0)]);
        assert_eq!(scorer.score(&data, 2), Err(IndicatorError::InvalidPeriods(0)));
        assert_eq!(scorer.lookback(), 50);
    }

    #[test]
    fn test_compute_score_defaults_to_newest() {
        let data = flat_periods(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 9.0, 12.0]);
        let registry = ScoringRegistry::with_defaults();
        let scorer = combine_score_functions(
            &[ScoreFunctionSpec::new(
                "emaScore",
                vec![ScoreArg::Numbers(vec![1.0, 3.0]), ScoreArg::Number(2.0), ScoreArg::Text("close".into())],
                0.75,
            )],
            &registry,
        )
        .unwrap();

        assert_eq!(scorer.compute_score(&data, None).unwrap(), 0.75);
        assert_eq!(scorer.compute_score(&data, Some(7)).unwrap(), 0.75);
        assert!(scorer.compute_score(&[], None).is_err());
        assert_eq!(scorer.lookback(), 7);
    }

    #[test]
    fn test_breakdown_reports_each_part() {
        let data = flat_periods(&[1.0; 3]);
        let scorer = CombinedScore::new(vec![part(Constant(0.5), 0.4), part(Constant(-1.0), 0.1)]);
        let parts = scorer.breakdown(&data, 2).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "constant");
        assert!((parts[0].weighted() - 0.2).abs() < 1e-12);
        assert!((parts[1].weighted() + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_function_rejected_at_startup() {
        let registry = ScoringRegistry::with_defaults();
        let result = combine_score_functions(
            &[
                ScoreFunctionSpec::new("emaScore", vec![ScoreArg::Numbers(vec![9.0, 21.0])], 0.5),
                ScoreFunctionSpec::new("macdScore", vec![], 0.5),
            ],
            &registry,
        );
        assert!(matches!(result, Err(IndicatorError::UnknownScoringFunction(name)) if name == "macdScore"));
    }
}
