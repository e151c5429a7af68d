//! Ensemble weighting configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::forecast::{AUTOREGRESSIVE_STUB_ID, LOGISTIC_ID, STRUCTURAL_STUB_ID, TREND_ID};
use crate::model::ModelId;

/// Version string stamped on every combined row
pub const ENSEMBLE_MODEL_VERSION: &str = "ensemble-v1.0";

/// Model identifier -> ensemble weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelWeights(pub BTreeMap<ModelId, f64>);

impl Default for ModelWeights {
    fn default() -> Self {
        Self::from_pairs([
            (LOGISTIC_ID, 0.30),
            (TREND_ID, 0.25),
            (STRUCTURAL_STUB_ID, 0.25),
            (AUTOREGRESSIVE_STUB_ID, 0.20),
        ])
    }
}

impl ModelWeights {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(id, w)| (ModelId::from(id), w))
                .collect(),
        )
    }

    /// Weight of a model, 0 when the model has no entry
    #[must_use]
    pub fn weight(&self, model: &ModelId) -> f64 {
        self.0.get(model).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

/// How a cell is combined when some weighted models produced no value for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingModelPolicy {
    /// Sum the contributing `value * weight` terms as-is. Missing models
    /// contribute nothing, so the cell is understated relative to a full
    /// ensemble. This is the established numeric scale downstream relies on.
    #[default]
    NoRedistribution,
    /// Divide each cell by the total weight of the models that contributed
    Renormalize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub weights: ModelWeights,

    #[serde(default = "default_model_version")]
    pub model_version: String,

    #[serde(default)]
    pub missing_model_policy: MissingModelPolicy,
}

fn default_model_version() -> String {
    ENSEMBLE_MODEL_VERSION.to_string()
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            weights: ModelWeights::default(),
            model_version: default_model_version(),
            missing_model_policy: MissingModelPolicy::default(),
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if let Some((id, w)) = self
            .weights
            .0
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(EngineError::Config(format!(
                "weight for model {id} must be a finite non-negative number, got {w}"
            )));
        }
        if self.model_version.trim().is_empty() {
            return Err(EngineError::Config(
                "ensemble model_version cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
