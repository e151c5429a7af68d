//! Microreactor adoption overlay
//!
//! Adds a logistic deployment curve on top of the combined projection. The
//! curve is scaled so it reaches `max_units` exactly in the saturation year,
//! and the resulting generation is capped at a fraction of the projected
//! nuclear generation.

use crate::config::{AdoptionConfig, AdoptionCurve, AdoptionParams};
use crate::model::ScenarioProjection;

/// MWh per TWh
const MWH_PER_TWH: f64 = 1_000_000.0;

impl AdoptionCurve {
    fn logistic(&self, year: i32) -> f64 {
        let t = f64::from(year - self.inflection_year);
        1.0 / (1.0 + (-self.growth_rate * t).exp())
    }

    /// Continuous deployed-unit count for `year`.
    ///
    /// Zero before `start_year`. At `saturation_year` the ratio below is
    /// `x / x == 1.0`, so the result is exactly `max_units`.
    #[must_use]
    pub fn units(&self, year: i32, max_units: u32) -> f64 {
        if year < self.start_year {
            return 0.0;
        }
        f64::from(max_units) * (self.logistic(year) / self.logistic(self.saturation_year))
    }

    /// Annual generation in TWh of `units` reactors
    #[must_use]
    pub fn generation_twh(&self, units: f64) -> f64 {
        units * self.unit_capacity_mw * self.capacity_factor * self.hours_per_year / MWH_PER_TWH
    }
}

/// Fill the microreactor fields of one projection
pub fn overlay_row(row: &mut ScenarioProjection, curve: &AdoptionCurve, params: &AdoptionParams) {
    let units = curve.units(row.year, params.max_units);
    let cap = row.nuclear_generation_twh.max(0.0) * params.max_share_of_nuclear;
    let generation = curve.generation_twh(units).min(cap).max(0.0);

    row.microreactor_units = units.floor() as u32;
    row.microreactor_generation_twh = generation;
    row.microreactor_share_of_nuclear = if row.nuclear_generation_twh > 0.0 {
        generation / row.nuclear_generation_twh
    } else {
        0.0
    };
}

/// Apply the overlay in place.
///
/// Rows whose scenario has no adoption parameters are left untouched.
/// Returns the number of rows updated.
pub fn apply(projections: &mut [ScenarioProjection], config: &AdoptionConfig) -> usize {
    let mut updated = 0;
    for row in projections.iter_mut() {
        match config.scenarios.get(&row.scenario_name) {
            Some(params) => {
                overlay_row(row, &config.curve, params);
                updated += 1;
            }
            None => {
                tracing::debug!(scenario = %row.scenario_name, "no adoption parameters for scenario");
            }
        }
    }
    updated
}
