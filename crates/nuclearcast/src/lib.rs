//! Nuclear share scenario forecasting application
//!
//! Wraps the `nuclearcast_core` engine with:
//! - A SQLite store that serves history and persists projections
//! - YAML settings in the data directory
//! - File logging with size-based rotation
//! - A background retraining worker
//! - Stored market insights and performance evaluations

pub mod commands;
pub mod db;
pub mod error;
pub mod logging;
pub mod settings;
pub mod worker;

pub use commands::{DEFAULT_SCENARIOS, GenerateOptions, Workspace, to_json};
pub use db::{PerformanceRecord, ProjectionFilter, SqliteStore};
pub use error::{AppError, AppResult};
pub use logging::{LogRotation, init_logging};
pub use settings::Settings;
pub use worker::{RetrainWorker, WorkerResponse};
