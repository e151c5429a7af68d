use super::{
    AUTOREGRESSIVE_STUB_ID, ForecastingModel, REFERENCE_DEMAND_TWH, Readiness, STRUCTURAL_STUB_ID,
};
use crate::error::ModelError;
use crate::model::{HistorySnapshot, ModelId, ScenarioProjection, YearRange};

/// Fixed linear share trajectory, identical for every scenario.
///
/// Stand-in for statistical models that are not built yet. It exists to give
/// the ensemble more than two inputs; its numbers are not a forecast.
#[derive(Debug)]
pub struct LinearPlaceholderModel {
    id: ModelId,
    version: String,
    intercept: f64,
    slope: f64,
    anchor_year: i32,
    reference_demand_twh: f64,
    trained: Readiness,
}

impl LinearPlaceholderModel {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        intercept: f64,
        slope: f64,
        anchor_year: i32,
    ) -> Self {
        Self {
            id: ModelId::new(id),
            version: version.into(),
            intercept,
            slope,
            anchor_year,
            reference_demand_twh: REFERENCE_DEMAND_TWH,
            trained: Readiness::default(),
        }
    }

    /// Placeholder for a Bayesian structural time-series model
    #[must_use]
    pub fn structural_stub() -> Self {
        Self::new(STRUCTURAL_STUB_ID, "structural-stub-v1.0", 0.20, 0.010, 2025)
    }

    /// Placeholder for an autoregressive model
    #[must_use]
    pub fn autoregressive_stub() -> Self {
        Self::new(
            AUTOREGRESSIVE_STUB_ID,
            "autoregressive-stub-v1.0",
            0.18,
            0.008,
            2025,
        )
    }

    fn share(&self, year: i32) -> f64 {
        self.intercept + self.slope * f64::from(year - self.anchor_year)
    }
}

impl ForecastingModel for LinearPlaceholderModel {
    fn id(&self) -> &ModelId {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn forecast(
        &self,
        _history: &HistorySnapshot,
        years: YearRange,
        scenarios: &[String],
    ) -> Result<Vec<ScenarioProjection>, ModelError> {
        let demand = self.reference_demand_twh;
        Ok(scenarios
            .iter()
            .flat_map(|scenario| {
                years.years().map(move |year| {
                    let share = self.share(year);
                    ScenarioProjection::new(
                        scenario.as_str(),
                        year,
                        share,
                        share * demand,
                        demand,
                        self.version.as_str(),
                    )
                })
            })
            .collect())
    }

    fn retrain(&self, _history: &HistorySnapshot) -> Result<(), ModelError> {
        self.trained.mark_trained();
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.trained.is_trained()
    }
}
