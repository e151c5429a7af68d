//! Nuclear share scenario forecasting engine
//!
//! Projects the nuclear share of electricity generation per scenario and year
//! and layers a microreactor adoption estimate on top. It provides:
//! - Pluggable forecasting models behind the [`forecast::ForecastingModel`] trait
//! - A logistic growth model fitted by exhaustive grid search
//! - A linear trend extrapolation model
//! - A weighted ensemble over all successful models
//! - A capped logistic microreactor adoption overlay
//! - Idempotent persistence through [`storage::PersistenceSink`]
//! - Market insights and a performance check over the same history
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nuclearcast_core::{EngineConfig, ScenarioOrchestrator};
//! use nuclearcast_core::storage::{MemorySink, StaticHistory};
//!
//! let orchestrator = ScenarioOrchestrator::with_default_models(
//!     Arc::new(StaticHistory::new(observations)),
//!     Arc::new(MemorySink::new()),
//!     EngineConfig::default(),
//! )?;
//! let rows = orchestrator.generate(&["base".into()], 2025, 2050, true)?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod adoption;
pub mod analytics;
pub mod ensemble;
pub mod error;
pub mod forecast;
pub mod orchestrator;
pub mod storage;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use analytics::{AnalyticsService, MarketInsight, PerformanceMetrics};
pub use config::{EngineConfig, Horizon};
pub use error::{EngineError, ModelError, ModelFailure, StorageError};
pub use model::{HistoricalObservation, ScenarioProjection};
pub use orchestrator::{GenerationOutcome, GenerationRequest, RetrainReport, ScenarioOrchestrator};
