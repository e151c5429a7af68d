//! Forecasting models
//!
//! Every model implements [`ForecastingModel`] and is registered as an
//! `Arc<dyn ForecastingModel>` in an ordered list owned by the orchestrator.
//! Models only read the [`HistorySnapshot`] they are handed, so any number of
//! them can run at once on separate threads.
//!
//! | id | model |
//! |---|---|
//! | `logistic` | [`LogisticGrowthModel`], grid-searched S-curve |
//! | `trend` | [`TrendExtrapolationModel`], OLS trend on observation index |
//! | `structural_stub` | [`LinearPlaceholderModel`], stand-in for a Bayesian structural model |
//! | `autoregressive_stub` | [`LinearPlaceholderModel`], stand-in for an autoregressive model |

mod grid_search;
mod logistic;
mod placeholder;
mod trend;

pub use grid_search::{GridFit, LogisticGrid, LogisticParams, ParamRange, fit_logistic};
pub use logistic::{LogisticAdjustment, LogisticConfig, LogisticGrowthModel};
pub use placeholder::LinearPlaceholderModel;
pub use trend::{TrendConfig, TrendExtrapolationModel, ols_slope};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ModelError;
use crate::model::{HistorySnapshot, ModelId, ScenarioProjection, YearRange};

pub const LOGISTIC_ID: &str = "logistic";
pub const TREND_ID: &str = "trend";
pub const STRUCTURAL_STUB_ID: &str = "structural_stub";
pub const AUTOREGRESSIVE_STUB_ID: &str = "autoregressive_stub";

/// Reference urban demand (TWh) used by models without a demand series
pub const REFERENCE_DEMAND_TWH: f64 = 4000.0;

/// A pluggable nuclear-share forecasting strategy.
///
/// `forecast` must emit at most one row per (scenario, year) inside `years`.
/// Omitting a cell is the model's way of saying it cannot forecast it.
pub trait ForecastingModel: Send + Sync {
    fn id(&self) -> &ModelId;

    /// Version string stamped on this model's rows
    fn version(&self) -> &str;

    fn forecast(
        &self,
        history: &HistorySnapshot,
        years: YearRange,
        scenarios: &[String],
    ) -> Result<Vec<ScenarioProjection>, ModelError>;

    /// Refresh the model from the latest history.
    ///
    /// Must succeed on an empty snapshot; models that need data simply stay
    /// untrained in that case.
    fn retrain(&self, history: &HistorySnapshot) -> Result<(), ModelError>;

    fn is_trained(&self) -> bool;
}

/// The four reference models with their default configurations, in registry order
#[must_use]
pub fn default_models() -> Vec<Arc<dyn ForecastingModel>> {
    vec![
        Arc::new(LogisticGrowthModel::new(LogisticConfig::default())),
        Arc::new(TrendExtrapolationModel::new(TrendConfig::default())),
        Arc::new(LinearPlaceholderModel::structural_stub()),
        Arc::new(LinearPlaceholderModel::autoregressive_stub()),
    ]
}

/// Lock-free readiness flag flipped by `retrain`
#[derive(Debug, Default)]
pub(crate) struct Readiness(AtomicBool);

impl Readiness {
    pub(crate) fn mark_trained(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_trained(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
