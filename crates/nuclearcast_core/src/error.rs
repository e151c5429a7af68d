use std::fmt;

use crate::model::ModelId;

/// Errors raised by a single forecasting model.
///
/// A model error never aborts a generation run: the orchestrator logs it and
/// drops the model from that run's ensemble input.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The snapshot holds too few usable observations for this model
    InsufficientHistory { required: usize, available: usize },
    /// A projected value came out NaN or infinite
    NonFinite { scenario: String, year: i32 },
    /// The model did not report back before the per-model deadline
    TimedOut,
    /// The model thread panicked
    Panicked,
    /// Any other model-specific failure
    Failed(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InsufficientHistory {
                required,
                available,
            } => write!(
                f,
                "insufficient history: need {required} observation(s), have {available}"
            ),
            ModelError::NonFinite { scenario, year } => {
                write!(f, "non-finite projection for {scenario}/{year}")
            }
            ModelError::TimedOut => write!(f, "model timed out"),
            ModelError::Panicked => write!(f, "model panicked"),
            ModelError::Failed(msg) => write!(f, "model failed: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

/// Errors surfaced by the external collaborators (history source, sink)
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// The backing store could not be reached or opened
    Unavailable(String),
    /// A read or write against the store failed
    Query(String),
    /// A stored value could not be decoded
    Decode(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
            StorageError::Query(msg) => write!(f, "storage query failed: {msg}"),
            StorageError::Decode(msg) => write!(f, "could not decode stored value: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors returned to the caller of the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// History is empty (or has no usable share values)
    NoHistoricalData,
    /// Requested years fall outside the supported horizon or are reversed
    InvalidYearRange {
        start_year: i32,
        end_year: i32,
        min_year: i32,
        max_year: i32,
    },
    /// Rejected engine configuration
    Config(String),
    Storage(StorageError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NoHistoricalData => write!(f, "no historical data available"),
            EngineError::InvalidYearRange {
                start_year,
                end_year,
                min_year,
                max_year,
            } => write!(
                f,
                "invalid year range {start_year}..={end_year} (supported {min_year}..={max_year})"
            ),
            EngineError::Config(msg) => write!(f, "configuration error: {msg}"),
            EngineError::Storage(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        EngineError::Storage(err)
    }
}

/// A model failure tagged with the model that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFailure {
    pub model: ModelId,
    pub error: ModelError,
}

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.error)
    }
}

impl std::error::Error for ModelFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
