//! Scenario generation pipeline
//!
//! ```text
//! history provider ─► snapshot ─┬─► model 1 ─┐
//!                               ├─► model 2 ─┼─► sanitize ─► combine ─► overlay ─► sink
//!                               └─► model N ─┘
//! ```
//!
//! History is fetched once per request and shared as an `Arc<HistorySnapshot>`.
//! Each model runs on its own thread and reports over a channel; models that
//! fail, panic or miss the deadline are logged and left out of the ensemble.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::adoption;
use crate::config::EngineConfig;
use crate::ensemble::{self, CombineReport, ModelOutput};
use crate::error::{EngineError, ModelError, ModelFailure, Result};
use crate::forecast::{ForecastingModel, default_models};
use crate::model::{HistorySnapshot, ModelId, ScenarioProjection, YearRange};
use crate::storage::{HistoricalSeriesProvider, PersistenceSink};

type ModelResult = std::result::Result<Vec<ScenarioProjection>, ModelError>;

/// Parameters of one generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub scenarios: Vec<String>,
    pub start_year: i32,
    pub end_year: i32,
    pub include_overlay: bool,
}

/// Everything a generation run produced
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// Combined rows, ordered by requested scenario then year
    pub projections: Vec<ScenarioProjection>,
    /// Models excluded from the ensemble, in registry order
    pub failures: Vec<ModelFailure>,
    pub ensemble: CombineReport,
}

/// Result of one retraining pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrainReport {
    /// Usable observations in the snapshot the models saw
    pub observations: usize,
    pub retrained: Vec<ModelId>,
    pub failures: Vec<ModelFailure>,
}

pub struct ScenarioOrchestrator {
    models: Vec<Arc<dyn ForecastingModel>>,
    history: Arc<dyn HistoricalSeriesProvider>,
    sink: Arc<dyn PersistenceSink>,
    config: EngineConfig,
    /// Forecast threads that have not returned yet, including abandoned ones
    running: Arc<AtomicUsize>,
}

/// Holds a forecast thread in the running count until it exits
struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for ScenarioOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioOrchestrator")
            .field(
                "models",
                &self.models.iter().map(|m| m.id()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScenarioOrchestrator {
    /// Build an orchestrator over an explicit, ordered model registry
    pub fn new(
        models: Vec<Arc<dyn ForecastingModel>>,
        history: Arc<dyn HistoricalSeriesProvider>,
        sink: Arc<dyn PersistenceSink>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut ids = FxHashSet::default();
        if let Some(dup) = models.iter().find(|m| !ids.insert(m.id().clone())) {
            return Err(EngineError::Config(format!(
                "model {} registered twice",
                dup.id()
            )));
        }

        let ensemble_version = config.ensemble.model_version.as_str();
        if let Some(clash) = models.iter().find(|m| m.version() == ensemble_version) {
            return Err(EngineError::Config(format!(
                "ensemble model_version {ensemble_version} is already the version of model {}",
                clash.id()
            )));
        }

        Ok(Self {
            models,
            history,
            sink,
            config,
            running: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Build an orchestrator with the four reference models
    pub fn with_default_models(
        history: Arc<dyn HistoricalSeriesProvider>,
        sink: Arc<dyn PersistenceSink>,
        config: EngineConfig,
    ) -> Result<Self> {
        Self::new(default_models(), history, sink, config)
    }

    #[must_use]
    pub fn models(&self) -> &[Arc<dyn ForecastingModel>] {
        &self.models
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forecast threads still running, counting those abandoned at a timeout
    #[must_use]
    pub fn running_model_threads(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Generate, persist and return the ensemble projection.
    ///
    /// An empty scenario set returns no rows without validating the years or
    /// touching history and the sink.
    pub fn generate(
        &self,
        scenarios: &[String],
        start_year: i32,
        end_year: i32,
        include_overlay: bool,
    ) -> Result<Vec<ScenarioProjection>> {
        let request = GenerationRequest {
            scenarios: scenarios.to_vec(),
            start_year,
            end_year,
            include_overlay,
        };
        self.run(&request).map(|outcome| outcome.projections)
    }

    /// Like [`generate`](Self::generate), also reporting excluded models and
    /// partially covered ensemble cells
    pub fn run(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let scenarios = dedup_scenarios(&request.scenarios);
        if scenarios.is_empty() {
            tracing::info!("no scenarios requested, nothing to generate");
            return Ok(GenerationOutcome {
                projections: Vec::new(),
                failures: Vec::new(),
                ensemble: CombineReport::default(),
            });
        }

        let years = self
            .config
            .horizon
            .range(request.start_year, request.end_year)?;

        tracing::info!(
            scenarios = ?scenarios,
            start_year = years.start,
            end_year = years.end,
            overlay = request.include_overlay,
            "generating scenarios"
        );

        let snapshot = Arc::new(self.snapshot()?);
        if snapshot.is_empty() {
            return Err(EngineError::NoHistoricalData);
        }

        let scenarios: Arc<[String]> = scenarios.into();
        let (outputs, failures) = self.run_models(&snapshot, years, &scenarios);

        let combined = ensemble::combine(&outputs, &self.config.ensemble);
        if combined.report.partial_cells > 0 {
            tracing::warn!(
                partial_cells = combined.report.partial_cells,
                cells = combined.report.cells,
                policy = ?self.config.ensemble.missing_model_policy,
                "ensemble cells missing model contributions; weights were not redistributed"
            );
        }

        let mut projections = combined.rows;
        if request.include_overlay {
            let updated = adoption::apply(&mut projections, &self.config.adoption);
            tracing::debug!(updated, "applied adoption overlay");
        }

        // Stable: years stay ascending within a scenario
        projections.sort_by_key(|p| {
            (
                scenarios
                    .iter()
                    .position(|s| *s == p.scenario_name)
                    .unwrap_or(usize::MAX),
                p.year,
            )
        });

        if projections.is_empty() {
            tracing::warn!("no model produced usable projections, nothing persisted");
        } else {
            self.sink.upsert(&projections)?;
            tracing::info!(rows = projections.len(), "stored projections");
        }

        Ok(GenerationOutcome {
            projections,
            failures,
            ensemble: combined.report,
        })
    }

    /// Call `retrain` on every model with the latest history.
    ///
    /// A failing model is logged and does not stop the pass.
    pub fn retrain_all(&self) -> Result<RetrainReport> {
        let snapshot = self.snapshot()?;
        tracing::info!(
            observations = snapshot.len(),
            models = self.models.len(),
            "starting model retraining"
        );

        let mut report = RetrainReport {
            observations: snapshot.len(),
            ..Default::default()
        };

        for model in &self.models {
            let result = panic::catch_unwind(AssertUnwindSafe(|| model.retrain(&snapshot)))
                .unwrap_or(Err(ModelError::Panicked));

            match result {
                Ok(()) => {
                    tracing::info!(model = %model.id(), trained = model.is_trained(), "retrained model");
                    report.retrained.push(model.id().clone());
                }
                Err(error) => {
                    tracing::error!(model = %model.id(), error = %error, "failed to retrain model");
                    report.failures.push(ModelFailure {
                        model: model.id().clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            retrained = report.retrained.len(),
            failed = report.failures.len(),
            "model retraining completed"
        );
        Ok(report)
    }

    fn snapshot(&self) -> Result<HistorySnapshot> {
        let observations = self.history.fetch()?;
        let snapshot = HistorySnapshot::from_observations(observations);
        if snapshot.dropped() > 0 {
            tracing::debug!(
                dropped = snapshot.dropped(),
                "ignored observations without a nuclear share"
            );
        }
        Ok(snapshot)
    }

    /// Fan out to every model and wait for each to finish or hit the deadline
    fn run_models(
        &self,
        snapshot: &Arc<HistorySnapshot>,
        years: YearRange,
        scenarios: &Arc<[String]>,
    ) -> (Vec<ModelOutput>, Vec<ModelFailure>) {
        let (tx, rx) = mpsc::channel::<(usize, ModelResult)>();
        let mut results: Vec<Option<ModelResult>> = (0..self.models.len()).map(|_| None).collect();
        let mut pending = 0usize;

        for (slot, model) in self.models.iter().enumerate() {
            let tx = tx.clone();
            let model = Arc::clone(model);
            let snapshot = Arc::clone(snapshot);
            let scenarios = Arc::clone(scenarios);
            let guard = RunningGuard::enter(&self.running);

            let spawned = thread::Builder::new()
                .name(format!("forecast-{}", model.id()))
                .spawn(move || {
                    let _guard = guard;
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        model.forecast(&snapshot, years, &scenarios)
                    }))
                    .unwrap_or(Err(ModelError::Panicked));
                    // The receiver is gone if the deadline already passed
                    let _ = tx.send((slot, result));
                });

            match spawned {
                Ok(_) => pending += 1,
                Err(e) => results[slot] = Some(Err(ModelError::Failed(e.to_string()))),
            }
        }
        drop(tx);

        let deadline = Instant::now() + self.config.model_timeout();
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((slot, result)) => {
                    results[slot] = Some(result);
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }

        if pending > 0 {
            // Threads cannot be cancelled; they finish in the background
            tracing::warn!(
                timed_out = pending,
                still_running = self.running_model_threads(),
                "abandoned forecast threads past the deadline"
            );
        }

        let mut outputs = Vec::with_capacity(self.models.len());
        let mut failures = Vec::new();

        for (model, result) in self.models.iter().zip(results) {
            match result.unwrap_or(Err(ModelError::TimedOut)) {
                Ok(rows) => {
                    let rows = ensemble::sanitize(model.id(), rows, years, scenarios);
                    tracing::info!(model = %model.id(), rows = rows.len(), "generated forecast");
                    outputs.push(ModelOutput {
                        model: model.id().clone(),
                        rows,
                    });
                }
                Err(error) => {
                    tracing::error!(model = %model.id(), error = %error, "failed to generate forecast");
                    failures.push(ModelFailure {
                        model: model.id().clone(),
                        error,
                    });
                }
            }
        }

        (outputs, failures)
    }
}

/// Drop repeated scenario names, keeping first occurrences in order
fn dedup_scenarios(scenarios: &[String]) -> Vec<String> {
    let mut seen = FxHashSet::default();
    scenarios
        .iter()
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}
