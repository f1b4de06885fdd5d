/// Decision handed from scoring to order execution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    /// Combined score in [-1, 1]; positive favors buying the base asset
    pub score: f64,
    /// ADX at the evaluation point, when the trend gate is enabled
    pub trend_strength: Option<f64>,
}

impl Signal {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            trend_strength: None,
        }
    }

    pub fn with_trend_strength(mut self, adx: f64) -> Self {
        self.trend_strength = Some(adx);
        self
    }

    /// Score must be finite and inside [-1, 1]; ADX finite and >= 0
    pub fn validate(&self) -> Result<(), String> {
        if !self.score.is_finite() || self.score.abs() > 1.0 {
            return Err(format!("Invalid score value: {}", self.score));
        }

        if let Some(adx) = self.trend_strength {
            if !adx.is_finite() || adx < 0.0 {
                return Err(format!("Invalid trend strength: {}", adx));
            }
        }

        Ok(())
    }
}
