//! Microreactor adoption overlay configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Per-scenario adoption limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdoptionParams {
    /// Deployed units reached at the curve's saturation year
    pub max_units: u32,
    /// Upper bound of microreactor generation as a fraction of nuclear generation
    pub max_share_of_nuclear: f64,
}

/// Shape of the adoption S-curve and per-unit output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdoptionCurve {
    /// No units exist before this year
    pub start_year: i32,
    pub inflection_year: i32,
    pub growth_rate: f64,
    /// Year at which the scaled curve equals `max_units`
    pub saturation_year: i32,
    pub unit_capacity_mw: f64,
    pub capacity_factor: f64,
    pub hours_per_year: f64,
}

impl Default for AdoptionCurve {
    fn default() -> Self {
        Self {
            start_year: 2028,
            inflection_year: 2035,
            growth_rate: 0.35,
            saturation_year: 2050,
            unit_capacity_mw: 1.5,
            capacity_factor: 0.9,
            hours_per_year: 8760.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdoptionConfig {
    #[serde(default)]
    pub curve: AdoptionCurve,
    #[serde(default = "default_scenarios")]
    pub scenarios: BTreeMap<String, AdoptionParams>,
}

fn default_scenarios() -> BTreeMap<String, AdoptionParams> {
    BTreeMap::from([
        (
            "conservative".to_string(),
            AdoptionParams {
                max_units: 3_000,
                max_share_of_nuclear: 0.10,
            },
        ),
        (
            "base".to_string(),
            AdoptionParams {
                max_units: 12_000,
                max_share_of_nuclear: 0.20,
            },
        ),
        (
            "aggressive".to_string(),
            AdoptionParams {
                max_units: 40_000,
                max_share_of_nuclear: 0.30,
            },
        ),
    ])
}

impl Default for AdoptionConfig {
    fn default() -> Self {
        Self {
            curve: AdoptionCurve::default(),
            scenarios: default_scenarios(),
        }
    }
}

impl AdoptionConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, params) in &self.scenarios {
            if !(0.0..=1.0).contains(&params.max_share_of_nuclear) {
                return Err(EngineError::Config(format!(
                    "scenario {name}: max_share_of_nuclear must be within [0, 1], got {}",
                    params.max_share_of_nuclear
                )));
            }
        }

        let curve = &self.curve;
        if !(curve.growth_rate.is_finite() && curve.growth_rate > 0.0) {
            return Err(EngineError::Config(format!(
                "adoption growth_rate must be positive, got {}",
                curve.growth_rate
            )));
        }
        if curve.saturation_year < curve.start_year {
            return Err(EngineError::Config(format!(
                "adoption saturation_year {} precedes start_year {}",
                curve.saturation_year, curve.start_year
            )));
        }
        if [
            curve.unit_capacity_mw,
            curve.capacity_factor,
            curve.hours_per_year,
        ]
        .iter()
        .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(EngineError::Config(
                "adoption unit output figures must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
