use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ForecastingModel, REFERENCE_DEMAND_TWH, Readiness, TREND_ID};
use crate::error::ModelError;
use crate::model::{HistorySnapshot, ModelId, ScenarioProjection, YearRange};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Per-scenario share multipliers; unknown scenarios use 1.0
    #[serde(default = "default_multipliers")]
    pub multipliers: BTreeMap<String, f64>,

    /// Fixed demand used instead of a compounding series
    #[serde(default = "default_reference_demand")]
    pub reference_demand_twh: f64,
}

fn default_multipliers() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("conservative".to_string(), 0.8),
        ("base".to_string(), 1.0),
        ("aggressive".to_string(), 1.2),
    ])
}

fn default_reference_demand() -> f64 {
    REFERENCE_DEMAND_TWH
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            multipliers: default_multipliers(),
            reference_demand_twh: default_reference_demand(),
        }
    }
}

impl TrendConfig {
    #[must_use]
    pub fn multiplier(&self, scenario: &str) -> f64 {
        self.multipliers.get(scenario).copied().unwrap_or(1.0)
    }
}

/// Ordinary least-squares slope of `values` against their index `0..n`.
///
/// Returns 0 when the slope is undefined (fewer than two values).
#[must_use]
pub fn ols_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }

    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, &y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });

    if den > 0.0 { num / den } else { 0.0 }
}

/// Linear extrapolation of the historical share trend.
///
/// The slope is fitted per observation, not per calendar year, and applied
/// per projected year from the newest observation date. Output is clamped to [0, 1].
#[derive(Debug)]
pub struct TrendExtrapolationModel {
    id: ModelId,
    config: TrendConfig,
    trained: Readiness,
}

impl TrendExtrapolationModel {
    #[must_use]
    pub fn new(config: TrendConfig) -> Self {
        Self {
            id: ModelId::from(TREND_ID),
            config,
            trained: Readiness::default(),
        }
    }
}

impl ForecastingModel for TrendExtrapolationModel {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn version(&self) -> &str {
        "trend-v1.0"
    }

    fn forecast(
        &self,
        history: &HistorySnapshot,
        years: YearRange,
        scenarios: &[String],
    ) -> Result<Vec<ScenarioProjection>, ModelError> {
        let Some(last) = history.last() else {
            return Err(ModelError::InsufficientHistory {
                required: 1,
                available: 0,
            });
        };

        let anchor_year = history.last_observed_year().unwrap_or(last.year());
        let shares: Vec<f64> = history.shares().collect();
        let slope = ols_slope(&shares);
        let demand = self.config.reference_demand_twh;

        let mut rows = Vec::with_capacity(scenarios.len() * years.len());
        for scenario in scenarios {
            let multiplier = self.config.multiplier(scenario);

            for year in years.years() {
                let years_ahead = f64::from(year - anchor_year);
                let share = ((last.share + slope * years_ahead) * multiplier).clamp(0.0, 1.0);

                rows.push(ScenarioProjection::new(
                    scenario.as_str(),
                    year,
                    share,
                    share * demand,
                    demand,
                    self.version(),
                ));
            }
        }

        Ok(rows)
    }

    fn retrain(&self, history: &HistorySnapshot) -> Result<(), ModelError> {
        if history.is_empty() {
            tracing::warn!(model = %self.id, "no usable history, skipping retrain");
            return Ok(());
        }
        self.trained.mark_trained();
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.trained.is_trained()
    }
}
