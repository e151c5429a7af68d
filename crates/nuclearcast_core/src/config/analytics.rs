//! Thresholds for market insights and the ensemble performance check

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Newest observations the share trend insight looks at
    pub trend_window: usize,
    /// Of those, how many count as "recent"; the rest are the comparison base
    pub trend_recent: usize,
    /// Minimum absolute change in mean share that raises a trend insight
    pub trend_threshold: f64,

    /// Latest share below this flags a growth opportunity
    pub opportunity_share_below: f64,

    /// History older than this many days raises a freshness alert
    pub stale_after_days: i32,

    /// Newest observations used for the performance check
    pub performance_window: usize,
    /// Shares whose year-over-year changes are scored against `expected_change`
    pub trend_accuracy_window: usize,
    pub volatility_window: usize,
    pub expected_change: f64,
    pub expected_volatility: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            trend_window: 12,
            trend_recent: 6,
            trend_threshold: 0.01,
            opportunity_share_below: 0.2,
            stale_after_days: 7,
            performance_window: 100,
            trend_accuracy_window: 10,
            volatility_window: 30,
            expected_change: 0.001,
            expected_volatility: 0.05,
        }
    }
}

impl AnalyticsConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.trend_recent == 0 || self.trend_recent >= self.trend_window {
            return Err(EngineError::Config(format!(
                "analytics trend_recent must be within 1..{}, got {}",
                self.trend_window, self.trend_recent
            )));
        }
        if self.stale_after_days < 0 {
            return Err(EngineError::Config(
                "analytics stale_after_days cannot be negative".to_string(),
            ));
        }
        if self.trend_accuracy_window < 2 || self.volatility_window < 2 {
            return Err(EngineError::Config(
                "analytics accuracy and volatility windows need at least 2 observations"
                    .to_string(),
            ));
        }
        if !(self.expected_volatility.is_finite() && self.expected_volatility > 0.0) {
            return Err(EngineError::Config(format!(
                "analytics expected_volatility must be positive, got {}",
                self.expected_volatility
            )));
        }
        if ![
            self.trend_threshold,
            self.opportunity_share_below,
            self.expected_change,
        ]
        .iter()
        .all(|v| v.is_finite())
        {
            return Err(EngineError::Config(
                "analytics thresholds must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AnalyticsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_recent_must_leave_a_comparison_base() {
        let config = AnalyticsConfig {
            trend_recent: 12,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_expected_volatility_rejected() {
        let config = AnalyticsConfig {
            expected_volatility: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
