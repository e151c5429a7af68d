//! Settings stored in the data directory
//!
//! ```text
//! ~/.nuclearcast/
//!   config.yaml        # Settings (optional, defaults when absent)
//!   nuclearcast.db     # History and stored projections
//!   nuclearcast.log
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nuclearcast_core::EngineConfig;
use nuclearcast_core::forecast::{
    ForecastingModel, LinearPlaceholderModel, LogisticConfig, LogisticGrowthModel, TrendConfig,
    TrendExtrapolationModel,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::logging::LogRotation;

const CONFIG_FILE: &str = "config.yaml";

/// Forecasting model tunables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default)]
    pub logistic: LogisticConfig,
    #[serde(default)]
    pub trend: TrendConfig,
}

impl ModelSettings {
    /// The model registry in ensemble order
    #[must_use]
    pub fn registry(&self) -> Vec<Arc<dyn ForecastingModel>> {
        vec![
            Arc::new(LogisticGrowthModel::new(self.logistic.clone())),
            Arc::new(TrendExtrapolationModel::new(self.trend.clone())),
            Arc::new(LinearPlaceholderModel::structural_stub()),
            Arc::new(LinearPlaceholderModel::autoregressive_stub()),
        ]
    }
}

/// Contents of `config.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite database file, relative paths resolve against the data directory
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Seconds between background retraining cycles
    #[serde(default = "default_retrain_interval_secs")]
    pub retrain_interval_secs: u64,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub models: ModelSettings,

    #[serde(default)]
    pub logging: LogRotation,
}

fn default_database() -> PathBuf {
    PathBuf::from("nuclearcast.db")
}

fn default_retrain_interval_secs() -> u64 {
    24 * 60 * 60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database(),
            retrain_interval_secs: default_retrain_interval_secs(),
            engine: EngineConfig::default(),
            models: ModelSettings::default(),
            logging: LogRotation::default(),
        }
    }
}

impl Settings {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Load `config.yaml`, falling back to defaults when it does not exist
    pub fn load(data_dir: &Path) -> AppResult<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| AppError::io(&path, e))?;
        let settings: Settings =
            serde_saphyr::from_str(&content).map_err(|e| AppError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
        settings.engine.validate()?;
        settings.logging.validate()?;

        tracing::info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Write the default settings unless a file already exists
    pub fn write_default(data_dir: &Path) -> AppResult<PathBuf> {
        let path = Self::path(data_dir);
        if path.exists() {
            return Ok(path);
        }

        fs::create_dir_all(data_dir).map_err(|e| AppError::io(data_dir, e))?;
        let yaml = serde_saphyr::to_string(&Self::default())
            .map_err(|e| AppError::Serialization(e.to_string()))?;

        // Write-then-rename so a partial file is never left behind
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, yaml).map_err(|e| AppError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| AppError::io(&path, e))?;

        Ok(path)
    }

    #[must_use]
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            data_dir.join(&self.database)
        }
    }

    #[must_use]
    pub fn retrain_interval(&self) -> Duration {
        Duration::from_secs(self.retrain_interval_secs)
    }
}
