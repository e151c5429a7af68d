use serde::{Deserialize, Serialize};

/// Projected nuclear outlook for one scenario and year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioProjection {
    pub scenario_name: String,
    pub year: i32,
    pub nuclear_share: f64,
    pub nuclear_generation_twh: f64,
    pub urban_demand_twh: f64,
    pub microreactor_units: u32,
    pub microreactor_generation_twh: f64,
    /// Microreactor generation over nuclear generation, 0 when the latter is not positive
    pub microreactor_share_of_nuclear: f64,
    pub model_version: String,
}

/// Upsert key of a stored projection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectionKey {
    pub scenario_name: String,
    pub year: i32,
    pub model_version: String,
}

impl ScenarioProjection {
    /// A projection with no microreactor contribution
    #[must_use]
    pub fn new(
        scenario_name: impl Into<String>,
        year: i32,
        nuclear_share: f64,
        nuclear_generation_twh: f64,
        urban_demand_twh: f64,
        model_version: impl Into<String>,
    ) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            year,
            nuclear_share,
            nuclear_generation_twh,
            urban_demand_twh,
            microreactor_units: 0,
            microreactor_generation_twh: 0.0,
            microreactor_share_of_nuclear: 0.0,
            model_version: model_version.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> ProjectionKey {
        ProjectionKey {
            scenario_name: self.scenario_name.clone(),
            year: self.year,
            model_version: self.model_version.clone(),
        }
    }

    /// True when every numeric field is finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [
            self.nuclear_share,
            self.nuclear_generation_twh,
            self.urban_demand_twh,
            self.microreactor_generation_twh,
            self.microreactor_share_of_nuclear,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}
