//! SQLite store backing both engine collaborators
//!
//! `electricity_summary` holds the processed history (GWh, nullable share);
//! `nuclear_scenarios` holds generated projections keyed by
//! (scenario_name, year, model_version). `market_insights` and
//! `model_performance` hold analytics output, one row per insight and per
//! metric.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use jiff::civil::Date;
use nuclearcast_core::analytics::{ImpactLevel, InsightKind};
use nuclearcast_core::storage::{HistoricalSeriesProvider, PersistenceSink};
use nuclearcast_core::{
    HistoricalObservation, MarketInsight, PerformanceMetrics, ScenarioProjection, StorageError,
};
use rusqlite::{Connection, Row, params};
use serde::Serialize;

use crate::error::{AppError, AppResult};

pub fn init_db(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS electricity_summary (
            date TEXT PRIMARY KEY,
            nuclear_share REAL,
            nuclear_generation_gwh REAL NOT NULL,
            urban_electricity_demand_gwh REAL NOT NULL,
            urban_population_percent REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS nuclear_scenarios (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scenario_name TEXT NOT NULL,
            year INTEGER NOT NULL,
            nuclear_share REAL NOT NULL,
            nuclear_generation_twh REAL NOT NULL,
            urban_demand_twh REAL NOT NULL,
            microreactor_units INTEGER NOT NULL,
            microreactor_generation_twh REAL NOT NULL,
            microreactor_share_of_nuclear REAL NOT NULL,
            model_version TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (scenario_name, year, model_version)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS market_insights (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            insight_type TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            confidence_score REAL NOT NULL,
            impact_level TEXT NOT NULL,
            generated_on TEXT NOT NULL,
            expires_on TEXT NOT NULL,
            UNIQUE (insight_type, title, generated_on)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS model_performance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model_name TEXT NOT NULL,
            metric_name TEXT NOT NULL,
            metric_value REAL NOT NULL,
            evaluation_date TEXT NOT NULL,
            UNIQUE (model_name, metric_name, evaluation_date)
        )",
        [],
    )?;

    Ok(())
}

/// One stored metric value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRecord {
    pub model_name: String,
    pub metric_name: String,
    pub metric_value: f64,
    pub evaluation_date: Date,
}

/// Filter for reading stored projections; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionFilter {
    pub scenario: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub model_version: Option<String>,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database file and its schema
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace observations by date, in one transaction
    pub fn import_history(&self, observations: &[HistoricalObservation]) -> AppResult<usize> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO electricity_summary (
                    date, nuclear_share, nuclear_generation_gwh,
                    urban_electricity_demand_gwh, urban_population_percent
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(date) DO UPDATE SET
                    nuclear_share = excluded.nuclear_share,
                    nuclear_generation_gwh = excluded.nuclear_generation_gwh,
                    urban_electricity_demand_gwh = excluded.urban_electricity_demand_gwh,
                    urban_population_percent = excluded.urban_population_percent",
            )?;
            for obs in observations {
                stmt.execute(params![
                    obs.date.to_string(),
                    obs.nuclear_share,
                    obs.nuclear_generation_gwh,
                    obs.urban_electricity_demand_gwh,
                    obs.urban_population_percent,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(rows = observations.len(), "imported historical observations");
        Ok(observations.len())
    }

    /// Stored projections matching `filter`, ordered by scenario, year, version
    pub fn query_projections(&self, filter: &ProjectionFilter) -> AppResult<Vec<ScenarioProjection>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT scenario_name, year, nuclear_share, nuclear_generation_twh,
                    urban_demand_twh, microreactor_units, microreactor_generation_twh,
                    microreactor_share_of_nuclear, model_version
             FROM nuclear_scenarios
             WHERE (?1 IS NULL OR scenario_name = ?1)
               AND (?2 IS NULL OR year >= ?2)
               AND (?3 IS NULL OR year <= ?3)
               AND (?4 IS NULL OR model_version = ?4)
             ORDER BY scenario_name, year, model_version",
        )?;

        let rows = stmt
            .query_map(
                params![
                    filter.scenario,
                    filter.start_year,
                    filter.end_year,
                    filter.model_version
                ],
                projection_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Store insights; a rerun on the same day replaces same-titled insights
    pub fn save_insights(&self, insights: &[MarketInsight]) -> AppResult<usize> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO market_insights (
                    insight_type, title, description, confidence_score,
                    impact_level, generated_on, expires_on
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(insight_type, title, generated_on) DO UPDATE SET
                    description = excluded.description,
                    confidence_score = excluded.confidence_score,
                    impact_level = excluded.impact_level,
                    expires_on = excluded.expires_on",
            )?;
            for insight in insights {
                stmt.execute(params![
                    insight.insight_type.as_str(),
                    insight.title,
                    insight.description,
                    insight.confidence_score,
                    insight.impact_level.as_str(),
                    insight.generated_on.to_string(),
                    insight.expires_on.to_string(),
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(count = insights.len(), "stored insights");
        Ok(insights.len())
    }

    /// Insights not yet expired on `today`, newest first
    pub fn active_insights(&self, today: Date) -> AppResult<Vec<MarketInsight>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT insight_type, title, description, confidence_score,
                    impact_level, generated_on, expires_on
             FROM market_insights
             WHERE expires_on >= ?1
             ORDER BY generated_on DESC, id",
        )?;

        let raw = stmt
            .query_map(params![today.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let insights = raw
            .into_iter()
            .map(
                |(kind, title, description, confidence, impact, generated, expires)| {
                    Ok(MarketInsight {
                        insight_type: InsightKind::parse(&kind).ok_or_else(|| {
                            StorageError::Decode(format!("insight type {kind:?}"))
                        })?,
                        title,
                        description,
                        confidence_score: confidence,
                        impact_level: ImpactLevel::parse(&impact).ok_or_else(|| {
                            StorageError::Decode(format!("impact level {impact:?}"))
                        })?,
                        generated_on: decode_date(&generated)?,
                        expires_on: decode_date(&expires)?,
                    })
                },
            )
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(insights)
    }

    /// Store each metric; re-evaluating on the same date replaces the values
    pub fn save_performance(&self, metrics: &PerformanceMetrics) -> AppResult<()> {
        let evaluation_date = metrics.evaluation_date.to_string();
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO model_performance (
                    model_name, metric_name, metric_value, evaluation_date
                ) VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(model_name, metric_name, evaluation_date) DO UPDATE SET
                    metric_value = excluded.metric_value",
            )?;
            for (name, value) in metrics.entries() {
                stmt.execute(params![metrics.model_name, name, value, evaluation_date])?;
            }
        }
        tx.commit()?;

        tracing::debug!(model = %metrics.model_name, "stored performance metrics");
        Ok(())
    }

    /// Stored metrics, optionally for one model, oldest evaluation first
    pub fn performance_history(&self, model_name: Option<&str>) -> AppResult<Vec<PerformanceRecord>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT model_name, metric_name, metric_value, evaluation_date
             FROM model_performance
             WHERE (?1 IS NULL OR model_name = ?1)
             ORDER BY evaluation_date, model_name, id",
        )?;

        let raw = stmt
            .query_map(params![model_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let records = raw
            .into_iter()
            .map(|(model_name, metric_name, metric_value, date)| {
                Ok(PerformanceRecord {
                    model_name,
                    metric_name,
                    metric_value,
                    evaluation_date: decode_date(&date)?,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(records)
    }

    pub fn count_projections(&self) -> AppResult<usize> {
        let conn = self.conn.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM nuclear_scenarios", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn projection_from_row(row: &Row<'_>) -> rusqlite::Result<ScenarioProjection> {
    Ok(ScenarioProjection {
        scenario_name: row.get(0)?,
        year: row.get(1)?,
        nuclear_share: row.get(2)?,
        nuclear_generation_twh: row.get(3)?,
        urban_demand_twh: row.get(4)?,
        microreactor_units: row.get(5)?,
        microreactor_generation_twh: row.get(6)?,
        microreactor_share_of_nuclear: row.get(7)?,
        model_version: row.get(8)?,
    })
}

fn decode_date(text: &str) -> Result<Date, StorageError> {
    text.parse()
        .map_err(|e| StorageError::Decode(format!("date {text:?}: {e}")))
}

fn query_error(err: rusqlite::Error) -> StorageError {
    StorageError::Query(err.to_string())
}

fn lock_error<T>(_: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Unavailable("database connection lock poisoned".to_string())
}

impl HistoricalSeriesProvider for SqliteStore {
    fn fetch(&self) -> Result<Vec<HistoricalObservation>, StorageError> {
        let conn = self.conn.lock().map_err(lock_error)?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT date, nuclear_share, nuclear_generation_gwh,
                        urban_electricity_demand_gwh, urban_population_percent
                 FROM electricity_summary
                 ORDER BY date",
            )
            .map_err(query_error)?;

        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        raw.into_iter()
            .map(|(date, share, generation, demand, urban)| {
                Ok(HistoricalObservation {
                    date: decode_date(&date)?,
                    nuclear_share: share,
                    nuclear_generation_gwh: generation,
                    urban_electricity_demand_gwh: demand,
                    urban_population_percent: urban,
                })
            })
            .collect()
    }
}

impl PersistenceSink for SqliteStore {
    fn upsert(&self, projections: &[ScenarioProjection]) -> Result<(), StorageError> {
        let updated_at = jiff::Timestamp::now().to_string();
        let mut conn = self.conn.lock().map_err(lock_error)?;
        let tx = conn.transaction().map_err(query_error)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO nuclear_scenarios (
                        scenario_name, year, nuclear_share, nuclear_generation_twh,
                        urban_demand_twh, microreactor_units, microreactor_generation_twh,
                        microreactor_share_of_nuclear, model_version, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(scenario_name, year, model_version) DO UPDATE SET
                        nuclear_share = excluded.nuclear_share,
                        nuclear_generation_twh = excluded.nuclear_generation_twh,
                        urban_demand_twh = excluded.urban_demand_twh,
                        microreactor_units = excluded.microreactor_units,
                        microreactor_generation_twh = excluded.microreactor_generation_twh,
                        microreactor_share_of_nuclear = excluded.microreactor_share_of_nuclear,
                        updated_at = excluded.updated_at",
                )
                .map_err(query_error)?;

            for p in projections {
                stmt.execute(params![
                    p.scenario_name,
                    p.year,
                    p.nuclear_share,
                    p.nuclear_generation_twh,
                    p.urban_demand_twh,
                    p.microreactor_units,
                    p.microreactor_generation_twh,
                    p.microreactor_share_of_nuclear,
                    p.model_version,
                    updated_at,
                ])
                .map_err(query_error)?;
            }
        }
        // Dropping an uncommitted transaction rolls it back
        tx.commit().map_err(query_error)?;

        tracing::debug!(rows = projections.len(), "upserted projections");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn observation(year: i16, share: Option<f64>) -> HistoricalObservation {
        HistoricalObservation {
            date: jiff::civil::date(year, 12, 31),
            nuclear_share: share,
            nuclear_generation_gwh: 780_000.0,
            urban_electricity_demand_gwh: 4_000_000.0,
            urban_population_percent: 82.0,
        }
    }

    fn projection(scenario: &str, year: i32, share: f64, version: &str) -> ScenarioProjection {
        let mut p = ScenarioProjection::new(scenario, year, share, share * 4000.0, 4000.0, version);
        p.microreactor_units = 1_234;
        p.microreactor_generation_twh = 14.6;
        p.microreactor_share_of_nuclear = 14.6 / (share * 4000.0);
        p
    }

    #[test]
    fn test_history_round_trip_sorted_with_null_share() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .import_history(&[
                observation(2023, Some(0.186)),
                observation(2021, None),
                observation(2022, Some(0.182)),
            ])
            .unwrap();

        let history = store.fetch().unwrap();
        let years: Vec<i32> = history.iter().map(|o| o.year()).collect();
        assert_eq!(years, vec![2021, 2022, 2023]);
        assert_eq!(history[0].nuclear_share, None);
        assert_eq!(history[2], observation(2023, Some(0.186)));
    }

    #[test]
    fn test_reimport_replaces_by_date() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.import_history(&[observation(2023, Some(0.18))]).unwrap();
        store.import_history(&[observation(2023, Some(0.19))]).unwrap();

        let history = store.fetch().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].nuclear_share, Some(0.19));
    }

    #[test]
    fn test_upsert_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let batch = vec![
            projection("base", 2030, 0.2, "ensemble-v1.0"),
            projection("base", 2031, 0.21, "ensemble-v1.0"),
        ];

        store.upsert(&batch).unwrap();
        let first = store.query_projections(&ProjectionFilter::default()).unwrap();
        store.upsert(&batch).unwrap();
        let second = store.query_projections(&ProjectionFilter::default()).unwrap();

        assert_eq!(store.count_projections().unwrap(), 2);
        assert_eq!(first, second);
        assert_eq!(first, batch);
    }

    #[test]
    fn test_upsert_updates_existing_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert(&[projection("base", 2030, 0.2, "ensemble-v1.0")])
            .unwrap();
        store
            .upsert(&[projection("base", 2030, 0.25, "ensemble-v1.0")])
            .unwrap();
        store
            .upsert(&[projection("base", 2030, 0.3, "ensemble-v2.0")])
            .unwrap();

        let rows = store.query_projections(&ProjectionFilter::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].nuclear_share, 0.25);
        assert_eq!(rows[1].model_version, "ensemble-v2.0");
    }

    #[test]
    fn test_query_filters() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut batch = Vec::new();
        for scenario in ["aggressive", "base"] {
            for year in 2025..=2030 {
                batch.push(projection(scenario, year, 0.2, "ensemble-v1.0"));
            }
        }
        batch.push(projection("base", 2026, 0.2, "ensemble-v0.9"));
        store.upsert(&batch).unwrap();

        let base_mid = store
            .query_projections(&ProjectionFilter {
                scenario: Some("base".to_string()),
                start_year: Some(2026),
                end_year: Some(2028),
                model_version: Some("ensemble-v1.0".to_string()),
            })
            .unwrap();
        let years: Vec<i32> = base_mid.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2026, 2027, 2028]);

        let all = store.query_projections(&ProjectionFilter::default()).unwrap();
        assert_eq!(all.len(), 13);
        assert_eq!(all[0].scenario_name, "aggressive");
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("nuclearcast.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.import_history(&[observation(2023, Some(0.186))]).unwrap();
            store
                .upsert(&[projection("base", 2030, 0.2, "ensemble-v1.0")])
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.fetch().unwrap().len(), 1);
        assert_eq!(store.count_projections().unwrap(), 1);
    }

    #[test]
    fn test_bad_stored_date_is_a_decode_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO electricity_summary VALUES ('not-a-date', 0.2, 1.0, 1.0, 80.0)",
                [],
            )
            .unwrap();

        assert!(matches!(store.fetch(), Err(StorageError::Decode(_))));
    }

    fn insight(kind: InsightKind, title: &str, generated: Date, expires: Date) -> MarketInsight {
        MarketInsight {
            insight_type: kind,
            title: title.to_string(),
            description: format!("{title} details"),
            confidence_score: 0.7,
            impact_level: ImpactLevel::Medium,
            generated_on: generated,
            expires_on: expires,
        }
    }

    #[test]
    fn test_active_insights_skip_expired() {
        let store = SqliteStore::open_in_memory().unwrap();
        let jan = jiff::civil::date(2025, 1, 1);
        let kept = insight(
            InsightKind::RiskAssessment,
            "Regulatory Risk Monitoring",
            jan,
            jiff::civil::date(2025, 3, 2),
        );
        let expired = insight(
            InsightKind::PerformanceAnalysis,
            "Data Freshness Alert",
            jan,
            jiff::civil::date(2025, 1, 2),
        );
        assert_eq!(store.save_insights(&[kept.clone(), expired]).unwrap(), 2);

        let active = store.active_insights(jiff::civil::date(2025, 1, 3)).unwrap();
        assert_eq!(active, vec![kept]);

        // Expiry day itself is still active
        let on_expiry = store.active_insights(jiff::civil::date(2025, 1, 2)).unwrap();
        assert_eq!(on_expiry.len(), 2);
    }

    #[test]
    fn test_same_day_insight_rerun_replaces() {
        let store = SqliteStore::open_in_memory().unwrap();
        let day = jiff::civil::date(2025, 1, 1);
        let mut first = insight(InsightKind::MarketOpportunity, "Growth", day, day);
        store.save_insights(&[first.clone()]).unwrap();
        first.confidence_score = 0.9;
        store.save_insights(&[first.clone()]).unwrap();

        let active = store.active_insights(day).unwrap();
        assert_eq!(active, vec![first]);
    }

    #[test]
    fn test_unknown_insight_type_is_a_decode_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO market_insights (insight_type, title, description, confidence_score,
                    impact_level, generated_on, expires_on)
                 VALUES ('weather', 't', 'd', 0.5, 'low', '2025-01-01', '2025-12-31')",
                [],
            )
            .unwrap();

        let err = store.active_insights(jiff::civil::date(2025, 1, 1)).unwrap_err();
        assert!(matches!(
            err,
            AppError::Engine(nuclearcast_core::EngineError::Storage(StorageError::Decode(_)))
        ));
    }

    #[test]
    fn test_performance_upserts_per_metric_and_date() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut metrics = PerformanceMetrics {
            model_name: "ensemble-v1.0".to_string(),
            evaluation_date: jiff::civil::date(2025, 1, 1),
            trend_accuracy: 0.99,
            volatility_prediction: 0.1,
            overall_accuracy: 0.545,
        };
        store.save_performance(&metrics).unwrap();
        metrics.overall_accuracy = 0.6;
        store.save_performance(&metrics).unwrap();

        metrics.model_name = "ensemble-v0.9".to_string();
        store.save_performance(&metrics).unwrap();

        let records = store.performance_history(Some("ensemble-v1.0")).unwrap();
        assert_eq!(records.len(), 3);
        let overall = records
            .iter()
            .find(|r| r.metric_name == "overall_accuracy")
            .unwrap();
        assert_eq!(overall.metric_value, 0.6);
        assert_eq!(overall.evaluation_date, jiff::civil::date(2025, 1, 1));

        assert_eq!(store.performance_history(None).unwrap().len(), 6);
    }
}
