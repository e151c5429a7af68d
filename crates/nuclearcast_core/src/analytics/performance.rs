use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::config::AnalyticsConfig;
use crate::model::HistoricalObservation;

/// Scores for one evaluated model on one date.
///
/// `trend_accuracy` is `1 − mean |Δshare − expected_change|` and is not
/// clamped; the volatility score is clamped to [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub model_name: String,
    pub evaluation_date: Date,
    pub trend_accuracy: f64,
    pub volatility_prediction: f64,
    pub overall_accuracy: f64,
}

impl PerformanceMetrics {
    /// `(metric_name, value)` pairs in storage order
    #[must_use]
    pub fn entries(&self) -> [(&'static str, f64); 3] {
        [
            ("trend_accuracy", self.trend_accuracy),
            ("volatility_prediction", self.volatility_prediction),
            ("overall_accuracy", self.overall_accuracy),
        ]
    }
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Score the newest `performance_window` observations.
///
/// Shares are taken in date order, skipping rows without one. Returns `None`
/// when fewer than two shares remain.
#[must_use]
pub fn evaluate_performance(
    history: &[HistoricalObservation],
    model_name: &str,
    today: Date,
    config: &AnalyticsConfig,
) -> Option<PerformanceMetrics> {
    let mut sorted: Vec<&HistoricalObservation> = history.iter().collect();
    sorted.sort_by_key(|obs| obs.date);
    let recent = &sorted[sorted.len().saturating_sub(config.performance_window)..];

    let shares: Vec<f64> = recent
        .iter()
        .filter_map(|obs| obs.nuclear_share.filter(|s| s.is_finite()))
        .collect();
    if shares.len() < 2 {
        return None;
    }

    let changes: Vec<f64> = tail(&shares, config.trend_accuracy_window)
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .collect();
    let trend_accuracy = 1.0
        - changes
            .iter()
            .map(|change| (change - config.expected_change).abs())
            .sum::<f64>()
            / changes.len() as f64;

    let volatility = std_dev(tail(&shares, config.volatility_window));
    let volatility_prediction = (1.0
        - (volatility - config.expected_volatility).abs() / config.expected_volatility)
        .clamp(0.0, 1.0);

    Some(PerformanceMetrics {
        model_name: model_name.to_string(),
        evaluation_date: today,
        trend_accuracy,
        volatility_prediction,
        overall_accuracy: (trend_accuracy + volatility_prediction) / 2.0,
    })
}
