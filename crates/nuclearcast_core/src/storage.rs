//! Collaborator interfaces for history input and projection output.
//!
//! The engine only talks to a [`HistoricalSeriesProvider`] and a
//! [`PersistenceSink`]. In-memory implementations live here; the application
//! crate provides SQLite-backed ones.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::StorageError;
use crate::model::{HistoricalObservation, ProjectionKey, ScenarioProjection};

/// Source of the historical electricity series
pub trait HistoricalSeriesProvider: Send + Sync {
    /// All available observations, ascending by date
    fn fetch(&self) -> Result<Vec<HistoricalObservation>, StorageError>;
}

/// Destination for generated projections
pub trait PersistenceSink: Send + Sync {
    /// Insert or replace rows keyed by (scenario_name, year, model_version).
    ///
    /// The batch is applied atomically: either every row is written or none.
    fn upsert(&self, projections: &[ScenarioProjection]) -> Result<(), StorageError>;
}

/// Fixed in-memory history
#[derive(Debug, Clone, Default)]
pub struct StaticHistory {
    observations: Vec<HistoricalObservation>,
}

impl StaticHistory {
    #[must_use]
    pub fn new(mut observations: Vec<HistoricalObservation>) -> Self {
        observations.sort_by_key(|o| o.date);
        Self { observations }
    }
}

impl HistoricalSeriesProvider for StaticHistory {
    fn fetch(&self) -> Result<Vec<HistoricalObservation>, StorageError> {
        Ok(self.observations.clone())
    }
}

/// In-memory upsert store
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<BTreeMap<ProjectionKey, ScenarioProjection>>,
    upserts: AtomicUsize,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored rows ordered by key
    pub fn rows(&self) -> Result<Vec<ScenarioProjection>, StorageError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| StorageError::Unavailable("memory sink lock poisoned".to_string()))?;
        Ok(rows.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        self.rows().map(|rows| rows.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        self.len().map(|n| n == 0)
    }

    /// Number of `upsert` calls received
    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

impl PersistenceSink for MemorySink {
    fn upsert(&self, projections: &[ScenarioProjection]) -> Result<(), StorageError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StorageError::Unavailable("memory sink lock poisoned".to_string()))?;
        for projection in projections {
            rows.insert(projection.key(), projection.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection(scenario: &str, year: i32, share: f64) -> ScenarioProjection {
        ScenarioProjection::new(scenario, year, share, share * 4000.0, 4000.0, "ensemble-v1.0")
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let sink = MemorySink::new();
        let batch = vec![projection("base", 2030, 0.2), projection("base", 2031, 0.21)];

        sink.upsert(&batch).unwrap();
        let first = sink.rows().unwrap();
        sink.upsert(&batch).unwrap();

        assert_eq!(sink.len().unwrap(), 2);
        assert_eq!(sink.rows().unwrap(), first);
        assert_eq!(sink.upsert_calls(), 2);
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let sink = MemorySink::new();
        sink.upsert(&[projection("base", 2030, 0.2)]).unwrap();
        sink.upsert(&[projection("base", 2030, 0.3)]).unwrap();

        let rows = sink.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].nuclear_share, 0.3);
    }

    #[test]
    fn test_static_history_sorted() {
        let obs = |year: i16| HistoricalObservation {
            date: jiff::civil::date(year, 1, 1),
            nuclear_share: Some(0.2),
            nuclear_generation_gwh: 1.0,
            urban_electricity_demand_gwh: 1.0,
            urban_population_percent: 80.0,
        };
        let history = StaticHistory::new(vec![obs(2024), obs(2020), obs(2022)]);
        let years: Vec<i32> = history.fetch().unwrap().iter().map(|o| o.year()).collect();
        assert_eq!(years, vec![2020, 2022, 2024]);
    }
}
