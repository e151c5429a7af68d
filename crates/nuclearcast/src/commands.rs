//! Command implementations behind the CLI
//!
//! A [`Workspace`] ties the data directory, its settings and the SQLite store
//! together; each subcommand is one method on it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use jiff::civil::Date;
use nuclearcast_core::{
    AnalyticsService, GenerationRequest, HistoricalObservation, MarketInsight, PerformanceMetrics,
    RetrainReport, ScenarioOrchestrator, ScenarioProjection,
};
use serde::Serialize;

use crate::db::{PerformanceRecord, ProjectionFilter, SqliteStore};
use crate::error::{AppError, AppResult};
use crate::settings::Settings;
use crate::worker::{RetrainWorker, WorkerResponse};

/// Scenarios generated when none are named
pub const DEFAULT_SCENARIOS: [&str; 3] = ["conservative", "base", "aggressive"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    pub scenarios: Vec<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub include_overlay: bool,
}

pub struct Workspace {
    data_dir: PathBuf,
    settings: Settings,
    store: Arc<SqliteStore>,
}

impl Workspace {
    /// Load settings and open the database under `data_dir`
    pub fn open(data_dir: &Path) -> AppResult<Self> {
        Self::with_settings(data_dir, Settings::load(data_dir)?)
    }

    /// Open the database named by already-loaded `settings`
    pub fn with_settings(data_dir: &Path, settings: Settings) -> AppResult<Self> {
        let store = SqliteStore::open(&settings.database_path(data_dir))?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            settings,
            store: Arc::new(store),
        })
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// An orchestrator reading and writing this workspace's store
    pub fn orchestrator(&self) -> AppResult<ScenarioOrchestrator> {
        Ok(ScenarioOrchestrator::new(
            self.settings.models.registry(),
            self.store.clone(),
            self.store.clone(),
            self.settings.engine.clone(),
        )?)
    }

    pub fn generate(&self, options: &GenerateOptions) -> AppResult<Vec<ScenarioProjection>> {
        let horizon = self.settings.engine.horizon;
        let scenarios = if options.scenarios.is_empty() {
            DEFAULT_SCENARIOS.iter().map(|s| s.to_string()).collect()
        } else {
            options.scenarios.clone()
        };

        let request = GenerationRequest {
            scenarios,
            start_year: options.start_year.unwrap_or(horizon.min_year),
            end_year: options.end_year.unwrap_or(horizon.max_year),
            include_overlay: options.include_overlay,
        };

        let outcome = self.orchestrator()?.run(&request)?;
        for failure in &outcome.failures {
            tracing::warn!(model = %failure.model, error = %failure.error, "model excluded from ensemble");
        }
        Ok(outcome.projections)
    }

    /// Load a YAML list of observations into the store
    pub fn import_history(&self, file: &Path) -> AppResult<usize> {
        let content = fs::read_to_string(file).map_err(|e| AppError::io(file, e))?;
        let observations: Vec<HistoricalObservation> =
            serde_saphyr::from_str(&content).map_err(|e| AppError::Parse {
                path: file.to_path_buf(),
                message: e.to_string(),
            })?;
        self.store.import_history(&observations)
    }

    pub fn stored(&self, filter: &ProjectionFilter) -> AppResult<Vec<ScenarioProjection>> {
        self.store.query_projections(filter)
    }

    /// Run `cycles` retraining cycles on the background worker.
    ///
    /// `interval` overrides the configured pause between cycles.
    pub fn retrain(&self, cycles: usize, interval: Option<Duration>) -> AppResult<Vec<RetrainReport>> {
        if cycles == 0 {
            return Err(AppError::InvalidArgument(
                "cycles must be at least 1".to_string(),
            ));
        }

        let interval = interval.unwrap_or_else(|| self.settings.retrain_interval());
        let worker = RetrainWorker::spawn(Arc::new(self.orchestrator()?), interval);

        let mut reports = Vec::with_capacity(cycles);
        while reports.len() < cycles {
            match worker.recv() {
                Some(WorkerResponse::Completed { report, .. }) => reports.push(report),
                Some(WorkerResponse::Failed { cycle, error }) => {
                    return Err(AppError::Retrain {
                        cycle,
                        message: error,
                    });
                }
                None => {
                    return Err(AppError::Retrain {
                        cycle: reports.len() + 1,
                        message: "worker stopped".to_string(),
                    });
                }
            }
        }

        Ok(reports)
    }

    fn analytics(&self) -> AppResult<AnalyticsService> {
        Ok(AnalyticsService::new(
            self.store.clone(),
            self.settings.engine.analytics.clone(),
        )?)
    }

    /// Generate today's insights and store them
    pub fn insights(&self, today: Date) -> AppResult<Vec<MarketInsight>> {
        let insights = self.analytics()?.insights(today)?;
        self.store.save_insights(&insights)?;
        Ok(insights)
    }

    /// Stored insights that have not expired by `today`
    pub fn stored_insights(&self, today: Date) -> AppResult<Vec<MarketInsight>> {
        self.store.active_insights(today)
    }

    /// Score the history under the ensemble's model version and store the
    /// metrics; `None` when there are too few shares to score
    pub fn evaluate(&self, today: Date) -> AppResult<Option<PerformanceMetrics>> {
        let model_name = &self.settings.engine.ensemble.model_version;
        let metrics = self.analytics()?.evaluate(model_name, today)?;
        if let Some(metrics) = &metrics {
            self.store.save_performance(metrics)?;
        }
        Ok(metrics)
    }

    pub fn performance_history(&self) -> AppResult<Vec<PerformanceRecord>> {
        let model_name = &self.settings.engine.ensemble.model_version;
        self.store.performance_history(Some(model_name))
    }
}

pub fn to_json<T: Serialize + ?Sized>(rows: &T, pretty: bool) -> AppResult<String> {
    let json = if pretty {
        serde_json::to_string_pretty(rows)?
    } else {
        serde_json::to_string(rows)?
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuclearcast_core::EngineError;
    use nuclearcast_core::storage::HistoricalSeriesProvider;
    use tempfile::TempDir;

    const HISTORY_YAML: &str = "\
- date: '2019-12-31'
  nuclear_share: 0.196
  nuclear_generation_gwh: 809409.0
  urban_electricity_demand_gwh: 4127000.0
  urban_population_percent: 82.5
- date: '2020-12-31'
  nuclear_share: 0.197
  nuclear_generation_gwh: 789919.0
  urban_electricity_demand_gwh: 4009000.0
  urban_population_percent: 82.7
- date: '2021-12-31'
  nuclear_generation_gwh: 779645.0
  urban_electricity_demand_gwh: 4110000.0
  urban_population_percent: 82.9
- date: '2022-12-31'
  nuclear_share: 0.182
  nuclear_generation_gwh: 771537.0
  urban_electricity_demand_gwh: 4230000.0
  urban_population_percent: 83.1
- date: '2023-12-31'
  nuclear_share: 0.186
  nuclear_generation_gwh: 775357.0
  urban_electricity_demand_gwh: 4180000.0
  urban_population_percent: 83.3
";

    fn workspace_with_history() -> (TempDir, Workspace) {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("history.yaml");
        fs::write(&file, HISTORY_YAML).unwrap();

        let workspace = Workspace::open(&temp_dir.path().join(".nuclearcast")).unwrap();
        assert_eq!(workspace.import_history(&file).unwrap(), 5);
        (temp_dir, workspace)
    }

    #[test]
    fn test_import_history_keeps_missing_share_as_null() {
        let (_dir, workspace) = workspace_with_history();
        let history = workspace.store().fetch().unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[2].nuclear_share, None);
    }

    #[test]
    fn test_generate_defaults_to_three_scenarios_full_horizon() {
        let (_dir, workspace) = workspace_with_history();

        let rows = workspace
            .generate(&GenerateOptions {
                include_overlay: true,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(rows.len(), 3 * 26);
        assert_eq!(rows[0].scenario_name, "conservative");
        assert_eq!(rows[0].year, 2025);
        assert_eq!(rows[rows.len() - 1].scenario_name, "aggressive");
        assert_eq!(rows[rows.len() - 1].year, 2050);
        assert_eq!(workspace.store().count_projections().unwrap(), rows.len());
    }

    #[test]
    fn test_generate_then_query_stored() {
        let (_dir, workspace) = workspace_with_history();
        let generated = workspace
            .generate(&GenerateOptions {
                scenarios: vec!["base".to_string()],
                start_year: Some(2030),
                end_year: Some(2035),
                include_overlay: true,
            })
            .unwrap();

        let stored = workspace
            .stored(&ProjectionFilter {
                scenario: Some("base".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(stored, generated);
    }

    #[test]
    fn test_generate_without_history_fails() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::open(temp_dir.path()).unwrap();

        let err = workspace.generate(&GenerateOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            AppError::Engine(EngineError::NoHistoricalData)
        ));
    }

    #[test]
    fn test_generate_rejects_years_outside_horizon() {
        let (_dir, workspace) = workspace_with_history();
        let err = workspace
            .generate(&GenerateOptions {
                start_year: Some(2020),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Engine(EngineError::InvalidYearRange { .. })
        ));
    }

    #[test]
    fn test_import_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("history.yaml");
        fs::write(&file, "- date: yesterday\n").unwrap();

        let workspace = Workspace::open(temp_dir.path()).unwrap();
        assert!(matches!(
            workspace.import_history(&file),
            Err(AppError::Parse { .. })
        ));
    }

    #[test]
    fn test_retrain_cycles() {
        let (_dir, workspace) = workspace_with_history();
        let reports = workspace
            .retrain(2, Some(Duration::from_millis(10)))
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.observations == 4));
        assert!(reports.iter().all(|r| r.failures.is_empty()));
    }

    #[test]
    fn test_retrain_zero_cycles_rejected() {
        let (_dir, workspace) = workspace_with_history();
        assert!(matches!(
            workspace.retrain(0, None),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_to_json_shapes() {
        let row = ScenarioProjection::new("base", 2030, 0.2, 800.0, 4000.0, "ensemble-v1.0");
        let compact = to_json(std::slice::from_ref(&row), false).unwrap();
        assert!(compact.starts_with("[{\"scenario_name\":\"base\",\"year\":2030"));
        assert!(!compact.contains('\n'));

        let pretty = to_json(&[row], true).unwrap();
        assert!(pretty.contains("\n  {"));
    }

    #[test]
    fn test_insights_stored_until_expiry() {
        let (_dir, workspace) = workspace_with_history();
        let today = jiff::civil::date(2025, 1, 1);

        let insights = workspace.insights(today).unwrap();
        let titles: Vec<&str> = insights.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Significant Nuclear Growth Opportunity",
                "Regulatory Risk Monitoring",
                "Data Freshness Alert",
            ]
        );

        // Rerunning the same day does not duplicate
        workspace.insights(today).unwrap();
        assert_eq!(workspace.stored_insights(today).unwrap().len(), 3);

        // The freshness alert lives one day
        let later = workspace
            .stored_insights(jiff::civil::date(2025, 1, 3))
            .unwrap();
        assert_eq!(later.len(), 2);
        assert!(later.iter().all(|i| i.title != "Data Freshness Alert"));

        let json = to_json(&later, false).unwrap();
        assert!(json.contains("\"impact_level\":\"high\""));
    }

    #[test]
    fn test_evaluate_stores_metrics_under_ensemble_version() {
        let (_dir, workspace) = workspace_with_history();
        let today = jiff::civil::date(2025, 1, 1);

        let metrics = workspace.evaluate(today).unwrap().unwrap();
        assert_eq!(metrics.model_name, "ensemble-v1.0");

        let records = workspace.performance_history().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.evaluation_date == today));
    }

    #[test]
    fn test_evaluate_without_history_stores_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::open(temp_dir.path()).unwrap();

        assert_eq!(workspace.evaluate(jiff::civil::date(2025, 1, 1)).unwrap(), None);
        assert!(workspace.performance_history().unwrap().is_empty());
    }
}
