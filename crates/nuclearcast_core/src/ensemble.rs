//! Weighted combination of per-model projections
//!
//! Each (scenario, year) cell of the output is the weighted sum of the values
//! the models produced for that cell. Under the default
//! [`MissingModelPolicy::NoRedistribution`] a model that produced nothing for a
//! cell simply contributes nothing, so such cells come out understated; the
//! [`CombineReport`] counts them so callers can see it happened.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::{EnsembleConfig, MissingModelPolicy};
use crate::model::{ModelId, ScenarioProjection, YearRange};

/// Rows produced by one model in a run
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub model: ModelId,
    pub rows: Vec<ScenarioProjection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombineReport {
    /// Distinct (scenario, year) cells combined
    pub cells: usize,
    /// Cells missing at least one positively weighted model
    pub partial_cells: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Combined {
    pub rows: Vec<ScenarioProjection>,
    pub report: CombineReport,
}

#[derive(Debug)]
struct Cell {
    scenario: String,
    year: i32,
    share: f64,
    generation: f64,
    demand: f64,
    weight: f64,
}

/// Drop rows the ensemble must not see.
///
/// Removes cells with non-finite values, cells outside the requested years
/// or scenarios, and repeated (scenario, year) cells after the first.
pub fn sanitize(
    model: &ModelId,
    rows: Vec<ScenarioProjection>,
    years: YearRange,
    scenarios: &[String],
) -> Vec<ScenarioProjection> {
    let mut seen: FxHashSet<(String, i32)> = FxHashSet::default();
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows {
        if !row.is_finite() {
            tracing::warn!(
                model = %model,
                scenario = %row.scenario_name,
                year = row.year,
                "dropping non-finite projection cell"
            );
            continue;
        }
        if !years.contains(row.year) || !scenarios.contains(&row.scenario_name) {
            tracing::warn!(
                model = %model,
                scenario = %row.scenario_name,
                year = row.year,
                "dropping projection outside the requested cells"
            );
            continue;
        }
        if !seen.insert((row.scenario_name.clone(), row.year)) {
            tracing::warn!(
                model = %model,
                scenario = %row.scenario_name,
                year = row.year,
                "dropping duplicate projection cell"
            );
            continue;
        }
        kept.push(row);
    }

    kept
}

/// Combine model outputs into one row per distinct (scenario, year).
///
/// Rows come out in first-seen order across `outputs`. Microreactor fields
/// are zero; the adoption overlay fills them in.
#[must_use]
pub fn combine(outputs: &[ModelOutput], config: &EnsembleConfig) -> Combined {
    let weights = &config.weights;
    let mut index: FxHashMap<(String, i32), usize> = FxHashMap::default();
    let mut cells: Vec<Cell> = Vec::new();

    for output in outputs {
        let weight = weights.weight(&output.model);
        if !weights.0.contains_key(&output.model) {
            tracing::debug!(model = %output.model, "model has no ensemble weight");
        }

        for row in &output.rows {
            let slot = *index
                .entry((row.scenario_name.clone(), row.year))
                .or_insert_with(|| {
                    cells.push(Cell {
                        scenario: row.scenario_name.clone(),
                        year: row.year,
                        share: 0.0,
                        generation: 0.0,
                        demand: 0.0,
                        weight: 0.0,
                    });
                    cells.len() - 1
                });

            let cell = &mut cells[slot];
            cell.share += row.nuclear_share * weight;
            cell.generation += row.nuclear_generation_twh * weight;
            cell.demand += row.urban_demand_twh * weight;
            cell.weight += weight;
        }
    }

    let full_weight: f64 = weights.0.values().filter(|w| **w > 0.0).sum();
    let partial_cells = cells
        .iter()
        .filter(|c| c.weight + 1e-12 < full_weight)
        .count();

    let rows = cells
        .into_iter()
        .map(|cell| {
            let scale = match config.missing_model_policy {
                MissingModelPolicy::NoRedistribution => 1.0,
                MissingModelPolicy::Renormalize if cell.weight > 0.0 => 1.0 / cell.weight,
                MissingModelPolicy::Renormalize => 0.0,
            };
            ScenarioProjection::new(
                cell.scenario,
                cell.year,
                cell.share * scale,
                cell.generation * scale,
                cell.demand * scale,
                config.model_version.as_str(),
            )
        })
        .collect::<Vec<_>>();

    Combined {
        report: CombineReport {
            cells: rows.len(),
            partial_cells,
        },
        rows,
    }
}
