//! Integration tests for the scenario engine
//!
//! Tests are organized by topic:
//! - `orchestrator` - Fan-out, failure isolation, timeouts, persistence
//! - `scenarios` - End-to-end projection values and the adoption overlay
//! - `retrain` - Retraining cycles over the model registry
//! - `analytics` - Insights and the performance check over provider history


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::{EngineConfig, ModelWeights};
use crate::error::{ModelError, StorageError};
use crate::forecast::ForecastingModel;
use crate::model::{HistoricalObservation, HistorySnapshot, ModelId, ScenarioProjection, YearRange};
use crate::orchestrator::ScenarioOrchestrator;
use crate::storage::{HistoricalSeriesProvider, MemorySink, PersistenceSink, StaticHistory};

/// Yearly US-like history 2015..=2023
pub(crate) fn sample_history() -> Vec<HistoricalObservation> {
    let shares = [0.195, 0.197, 0.200, 0.193, 0.196, 0.197, 0.189, 0.182, 0.186];
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
        .collect()
}

pub(crate) fn names(scenarios: &[&str]) -> Vec<String> {
    scenarios.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn orchestrator_with(
    models: Vec<Arc<dyn ForecastingModel>>,
    weights: &[(&str, f64)],
    history: Vec<HistoricalObservation>,
) -> (ScenarioOrchestrator, Arc<MemorySink>) {
    let mut config = EngineConfig::default();
    config.ensemble.weights = ModelWeights::from_pairs(weights.iter().copied());
    orchestrator_with_config(models, config, history)
}

pub(crate) fn orchestrator_with_config(
    models: Vec<Arc<dyn ForecastingModel>>,
    config: EngineConfig,
    history: Vec<HistoricalObservation>,
) -> (ScenarioOrchestrator, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = ScenarioOrchestrator::new(
        models,
        Arc::new(StaticHistory::new(history)),
        sink.clone(),
        config,
    )
    .unwrap();
    (orchestrator, sink)
}

// ============================================================================
// Test collaborators
// ============================================================================

/// History provider that counts fetches
#[derive(Debug, Default)]
pub(crate) struct CountingHistory {
    inner: StaticHistory,
    fetches: AtomicUsize,
}

impl CountingHistory {
    pub(crate) fn new(observations: Vec<HistoricalObservation>) -> Self {
        Self {
            inner: StaticHistory::new(observations),
            fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl HistoricalSeriesProvider for CountingHistory {
    fn fetch(&self) -> Result<Vec<HistoricalObservation>, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch()
    }
}

/// History provider whose backing store is down
#[derive(Debug)]
pub(crate) struct UnavailableHistory;

impl HistoricalSeriesProvider for UnavailableHistory {
    fn fetch(&self) -> Result<Vec<HistoricalObservation>, StorageError> {
        Err(StorageError::Unavailable("connection refused".to_string()))
    }
}

/// Sink that rejects every write
#[derive(Debug)]
pub(crate) struct FailingSink;

impl PersistenceSink for FailingSink {
    fn upsert(&self, _projections: &[ScenarioProjection]) -> Result<(), StorageError> {
        Err(StorageError::Query("disk I/O error".to_string()))
    }
}

/// How a [`ScriptedModel`] misbehaves
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Behavior {
    /// Constant share for every requested cell
    Constant(f64),
    /// Constant share, but NaN in one year
    NanIn { share: f64, year: i32 },
    /// Return an error from `forecast` and `retrain`
    Fail,
    /// Panic inside `forecast` and `retrain`
    Panic,
    /// Sleep, then answer with a 0.5 share
    Hang(Duration),
}

/// Model with a fixed, configurable behavior
#[derive(Debug)]
pub(crate) struct ScriptedModel {
    id: ModelId,
    version: String,
    behavior: Behavior,
}

impl ScriptedModel {
    pub(crate) fn new(id: &str, behavior: Behavior) -> Self {
        Self {
            id: ModelId::from(id),
            version: format!("{id}-v0"),
            behavior,
        }
    }

    pub(crate) fn arc(id: &str, behavior: Behavior) -> Arc<dyn ForecastingModel> {
        Arc::new(Self::new(id, behavior))
    }
}

impl ForecastingModel for ScriptedModel {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn forecast(
        &self,
        _history: &HistorySnapshot,
        years: YearRange,
        scenarios: &[String],
    ) -> Result<Vec<ScenarioProjection>, ModelError> {
        let share_for = |year: i32| match self.behavior {
            Behavior::Constant(share) => share,
            Behavior::Hang(_) => 0.5,
            Behavior::NanIn { year: bad, .. } if year == bad => f64::NAN,
            Behavior::NanIn { share, .. } => share,
            Behavior::Fail | Behavior::Panic => unreachable!(),
        };

        match self.behavior {
            Behavior::Fail => return Err(ModelError::Failed("scripted failure".to_string())),
            Behavior::Panic => panic!("scripted panic"),
            Behavior::Hang(delay) => std::thread::sleep(delay),
            _ => {}
        }

        Ok(scenarios
            .iter()
            .flat_map(|scenario| {
                years.years().map(move |year| {
                    let share = share_for(year);
                    ScenarioProjection::new(
                        scenario.as_str(),
                        year,
                        share,
                        share * 4000.0,
                        4000.0,
                        self.version.as_str(),
                    )
                })
            })
            .collect())
    }

    fn retrain(&self, _history: &HistorySnapshot) -> Result<(), ModelError> {
        match self.behavior {
            Behavior::Fail => Err(ModelError::Failed("scripted failure".to_string())),
            Behavior::Panic => panic!("scripted panic"),
            _ => Ok(()),
        }
    }

    fn is_trained(&self) -> bool {
        true
    }
}
