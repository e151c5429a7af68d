use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::grid_search::{LogisticGrid, LogisticParams, fit_logistic};
use super::{ForecastingModel, LOGISTIC_ID, Readiness};
use crate::error::ModelError;
use crate::model::{HistorySnapshot, ModelId, ScenarioProjection, YearRange};

/// Scenario multipliers applied to the fitted K and r; t0 is never adjusted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticAdjustment {
    pub capacity_multiplier: f64,
    pub growth_rate_multiplier: f64,
}

impl Default for LogisticAdjustment {
    fn default() -> Self {
        Self {
            capacity_multiplier: 1.0,
            growth_rate_multiplier: 1.0,
        }
    }
}

impl LogisticAdjustment {
    #[must_use]
    pub fn apply(&self, params: LogisticParams) -> LogisticParams {
        LogisticParams {
            capacity: params.capacity * self.capacity_multiplier,
            growth_rate: params.growth_rate * self.growth_rate_multiplier,
            midpoint: params.midpoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticConfig {
    #[serde(default)]
    pub grid: LogisticGrid,

    /// Per-scenario multipliers; unknown scenarios use the identity adjustment
    #[serde(default = "default_adjustments")]
    pub adjustments: BTreeMap<String, LogisticAdjustment>,

    /// Annual compounding growth of urban demand
    #[serde(default = "default_demand_growth_rate")]
    pub demand_growth_rate: f64,
}

fn default_adjustments() -> BTreeMap<String, LogisticAdjustment> {
    BTreeMap::from([
        (
            "conservative".to_string(),
            LogisticAdjustment {
                capacity_multiplier: 0.8,
                growth_rate_multiplier: 0.7,
            },
        ),
        ("base".to_string(), LogisticAdjustment::default()),
        (
            "aggressive".to_string(),
            LogisticAdjustment {
                capacity_multiplier: 1.2,
                growth_rate_multiplier: 1.3,
            },
        ),
    ])
}

fn default_demand_growth_rate() -> f64 {
    0.012
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            grid: LogisticGrid::default(),
            adjustments: default_adjustments(),
            demand_growth_rate: default_demand_growth_rate(),
        }
    }
}

impl LogisticConfig {
    #[must_use]
    pub fn adjustment(&self, scenario: &str) -> LogisticAdjustment {
        self.adjustments.get(scenario).copied().unwrap_or_default()
    }
}

/// S-curve model fitted to the historical share by grid search.
///
/// Demand compounds from the newest reported urban demand, including rows
/// without a share, and generation is the projected share of that demand.
#[derive(Debug)]
pub struct LogisticGrowthModel {
    id: ModelId,
    config: LogisticConfig,
    trained: Readiness,
    fitted: RwLock<Option<LogisticParams>>,
}

impl LogisticGrowthModel {
    #[must_use]
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            id: ModelId::from(LOGISTIC_ID),
            config,
            trained: Readiness::default(),
            fitted: RwLock::new(None),
        }
    }

    /// Parameters recorded by the last successful `retrain`
    #[must_use]
    pub fn fitted(&self) -> Option<LogisticParams> {
        self.fitted.read().ok().and_then(|slot| *slot)
    }

    fn fit(&self, history: &HistorySnapshot) -> Result<LogisticParams, ModelError> {
        let points: Vec<(f64, f64)> = history
            .points()
            .iter()
            .map(|p| (f64::from(p.year()), p.share))
            .collect();

        fit_logistic(&self.config.grid, &points)
            .map(|fit| fit.params)
            .ok_or_else(|| ModelError::Failed("no finite logistic fit on grid".to_string()))
    }
}

impl ForecastingModel for LogisticGrowthModel {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn version(&self) -> &str {
        "logistic-v1.0"
    }

    fn forecast(
        &self,
        history: &HistorySnapshot,
        years: YearRange,
        scenarios: &[String],
    ) -> Result<Vec<ScenarioProjection>, ModelError> {
        let (Some(_), Some(anchor)) = (history.last(), history.last_demand_point()) else {
            return Err(ModelError::InsufficientHistory {
                required: 1,
                available: history.len(),
            });
        };
        let base_year = anchor.year();
        let base_demand = anchor.demand_twh;

        let fitted = self.fit(history)?;
        tracing::debug!(
            capacity = fitted.capacity,
            growth_rate = fitted.growth_rate,
            midpoint = fitted.midpoint,
            "logistic fit"
        );

        let mut rows = Vec::with_capacity(scenarios.len() * years.len());
        for scenario in scenarios {
            let params = self.config.adjustment(scenario).apply(fitted);

            for year in years.years() {
                let share = params.eval(f64::from(year));
                let demand =
                    base_demand * (1.0 + self.config.demand_growth_rate).powi(year - base_year);

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

        let params = self.fit(history)?;
        if let Ok(mut slot) = self.fitted.write() {
            *slot = Some(params);
        }
        self.trained.mark_trained();
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.trained.is_trained()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HistoricalObservation;

    fn snapshot() -> HistorySnapshot {
        let shares = [0.195, 0.197, 0.200, 0.193, 0.196, 0.197, 0.189, 0.182, 0.186];
        HistorySnapshot::from_observations(
            shares
                .iter()
                .enumerate()
                .map(|(i, &share)| HistoricalObservation {
                    date: jiff::civil::date(2015 + i as i16, 12, 31),
                    nuclear_share: Some(share),
                    nuclear_generation_gwh: 790_000.0,
                    urban_electricity_demand_gwh: 4_000_000.0,
                    urban_population_percent: 82.5,
                })
                .collect(),
        )
    }

    fn scenarios(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_row_per_scenario_year() {
        let model = LogisticGrowthModel::new(LogisticConfig::default());
        let rows = model
            .forecast(
                &snapshot(),
                YearRange::new(2025, 2030).unwrap(),
                &scenarios(&["conservative", "base", "aggressive"]),
            )
            .unwrap();

        assert_eq!(rows.len(), 18);
        assert!(rows.iter().all(|r| r.model_version == "logistic-v1.0"));
        assert!(rows.iter().all(|r| r.microreactor_units == 0));
    }

    #[test]
    fn test_demand_compounds_from_last_observation() {
        let model = LogisticGrowthModel::new(LogisticConfig::default());
        let rows = model
            .forecast(
                &snapshot(),
                YearRange::new(2033, 2033).unwrap(),
                &scenarios(&["base"]),
            )
            .unwrap();

        // Last observation 2023 at 4000 TWh, ten years of 1.2% growth
        let expected = 4000.0 * 1.012_f64.powi(10);
        assert!((rows[0].urban_demand_twh - expected).abs() < 1e-9);
        assert!(
            (rows[0].nuclear_generation_twh - rows[0].nuclear_share * expected).abs() < 1e-9
        );
    }

    #[test]
    fn test_demand_anchored_on_newest_row_without_share() {
        let mut observations: Vec<HistoricalObservation> = (2015..=2023)
            .map(|year| HistoricalObservation {
                date: jiff::civil::date(year, 12, 31),
                nuclear_share: Some(0.19),
                nuclear_generation_gwh: 760_000.0,
                urban_electricity_demand_gwh: 4_000_000.0,
                urban_population_percent: 82.5,
            })
            .collect();
        observations.push(HistoricalObservation {
            date: jiff::civil::date(2024, 12, 31),
            nuclear_share: None,
            nuclear_generation_gwh: 790_000.0,
            urban_electricity_demand_gwh: 5_000_000.0,
            urban_population_percent: 83.0,
        });

        let model = LogisticGrowthModel::new(LogisticConfig::default());
        let rows = model
            .forecast(
                &HistorySnapshot::from_observations(observations),
                YearRange::new(2030, 2030).unwrap(),
                &scenarios(&["base"]),
            )
            .unwrap();

        // 2024 at 5000 TWh, six years of 1.2% growth
        let expected = 5000.0 * 1.012_f64.powi(6);
        assert!((rows[0].urban_demand_twh - expected).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_coefficients_order_shares() {
        let model = LogisticGrowthModel::new(LogisticConfig::default());
        let rows = model
            .forecast(
                &snapshot(),
                YearRange::new(2045, 2045).unwrap(),
                &scenarios(&["conservative", "base", "aggressive"]),
            )
            .unwrap();

        let share = |name: &str| {
            rows.iter()
                .find(|r| r.scenario_name == name)
                .unwrap()
                .nuclear_share
        };
        assert!(share("conservative") < share("base"));
        assert!(share("base") < share("aggressive"));
    }

    #[test]
    fn test_unknown_scenario_uses_base_coefficients() {
        let model = LogisticGrowthModel::new(LogisticConfig::default());
        let rows = model
            .forecast(
                &snapshot(),
                YearRange::new(2040, 2040).unwrap(),
                &scenarios(&["base", "net-zero"]),
            )
            .unwrap();

        assert_eq!(rows[0].nuclear_share, rows[1].nuclear_share);
        assert_eq!(rows[1].scenario_name, "net-zero");
    }

    #[test]
    fn test_share_bounded_by_adjusted_capacity() {
        let config = LogisticConfig::default();
        let model = LogisticGrowthModel::new(config.clone());
        let rows = model
            .forecast(
                &snapshot(),
                YearRange::new(2025, 2050).unwrap(),
                &scenarios(&["aggressive"]),
            )
            .unwrap();

        let cap = config.grid.capacity.max * 1.2;
        assert!(rows.iter().all(|r| r.nuclear_share > 0.0 && r.nuclear_share < cap));
    }

    #[test]
    fn test_empty_history_is_insufficient() {
        let model = LogisticGrowthModel::new(LogisticConfig::default());
        let result = model.forecast(
            &HistorySnapshot::default(),
            YearRange::new(2030, 2030).unwrap(),
            &scenarios(&["base"]),
        );
        assert!(matches!(
            result,
            Err(ModelError::InsufficientHistory { available: 0, .. })
        ));
    }

    #[test]
    fn test_retrain_records_fit_and_readiness() {
        let model = LogisticGrowthModel::new(LogisticConfig::default());

        model.retrain(&HistorySnapshot::default()).unwrap();
        assert!(!model.is_trained());
        assert!(model.fitted().is_none());

        model.retrain(&snapshot()).unwrap();
        assert!(model.is_trained());
        assert!(model.fitted().is_some());
    }
}
