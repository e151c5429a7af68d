//! Engine configuration
//!
//! All tunables (weights, scenario coefficients, adoption parameters, timeouts)
//! are plain serde structs passed into the engine, so callers and tests can
//! swap them without any process-wide state.

mod adoption;
mod analytics;
mod ensemble;

pub use adoption::{AdoptionConfig, AdoptionCurve, AdoptionParams};
pub use analytics::AnalyticsConfig;
pub use ensemble::{ENSEMBLE_MODEL_VERSION, EnsembleConfig, MissingModelPolicy, ModelWeights};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::YearRange;

/// Years a generation request may cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    #[serde(default = "default_min_year")]
    pub min_year: i32,
    #[serde(default = "default_max_year")]
    pub max_year: i32,
}

fn default_min_year() -> i32 {
    2025
}

fn default_max_year() -> i32 {
    2050
}

impl Default for Horizon {
    fn default() -> Self {
        Self {
            min_year: default_min_year(),
            max_year: default_max_year(),
        }
    }
}

impl Horizon {
    /// Validate a requested range against the horizon
    pub fn range(&self, start_year: i32, end_year: i32) -> Result<YearRange, EngineError> {
        let invalid = || EngineError::InvalidYearRange {
            start_year,
            end_year,
            min_year: self.min_year,
            max_year: self.max_year,
        };
        if start_year < self.min_year || end_year > self.max_year {
            return Err(invalid());
        }
        YearRange::new(start_year, end_year).ok_or_else(invalid)
    }

    /// The full horizon as a range
    #[must_use]
    pub fn full(&self) -> Option<YearRange> {
        YearRange::new(self.min_year, self.max_year)
    }
}

/// Configuration consumed by the scenario orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub horizon: Horizon,

    /// Per-model deadline in milliseconds; a model exceeding it is treated as failed.
    ///
    /// The late model's thread is not cancelled. It keeps running until its
    /// `forecast` returns, so a model that never returns holds a thread for
    /// the life of the process.
    #[serde(default = "default_model_timeout_ms")]
    pub model_timeout_ms: u64,

    #[serde(default)]
    pub ensemble: EnsembleConfig,

    #[serde(default)]
    pub adoption: AdoptionConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

fn default_model_timeout_ms() -> u64 {
    30_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon: Horizon::default(),
            model_timeout_ms: default_model_timeout_ms(),
            ensemble: EnsembleConfig::default(),
            adoption: AdoptionConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.horizon.full().is_none() {
            return Err(EngineError::Config(format!(
                "horizon min_year {} is after max_year {}",
                self.horizon.min_year, self.horizon.max_year
            )));
        }
        if self.model_timeout_ms == 0 {
            return Err(EngineError::Config(
                "model_timeout_ms must be greater than 0".to_string(),
            ));
        }
        self.ensemble.validate()?;
        self.adoption.validate()?;
        self.analytics.validate()
    }
}
