//! Historical electricity observations and the immutable snapshot models read
//!
//! Observations arrive from the history provider in GWh with a nullable
//! nuclear share. A [`HistorySnapshot`] keeps only the observations with a
//! usable share, ordered by date, with energy figures converted to TWh.
//! The share filter does not apply to demand: the newest reported demand and
//! the newest observation date are kept even when that row has no share.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

/// One row of the processed electricity summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalObservation {
    pub date: Date,
    /// Fraction of generation from nuclear, `None` when not reported
    #[serde(default)]
    pub nuclear_share: Option<f64>,
    pub nuclear_generation_gwh: f64,
    pub urban_electricity_demand_gwh: f64,
    pub urban_population_percent: f64,
}

impl HistoricalObservation {
    #[must_use]
    pub fn year(&self) -> i32 {
        i32::from(self.date.year())
    }
}

#[must_use]
pub fn gwh_to_twh(gwh: f64) -> f64 {
    gwh / 1000.0
}

/// A usable observation: share present and finite, energy in TWh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: Date,
    pub share: f64,
    pub generation_twh: f64,
    pub demand_twh: f64,
}

impl SeriesPoint {
    #[must_use]
    pub fn year(&self) -> i32 {
        i32::from(self.date.year())
    }
}

/// Newest observed urban demand, regardless of whether a share was reported
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandPoint {
    pub date: Date,
    pub demand_twh: f64,
}

impl DemandPoint {
    #[must_use]
    pub fn year(&self) -> i32 {
        i32::from(self.date.year())
    }
}

/// Ascending, filtered history shared read-only by every model in a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    points: Vec<SeriesPoint>,
    dropped: usize,
    latest_date: Option<Date>,
    latest_demand: Option<DemandPoint>,
}

impl HistorySnapshot {
    /// Build a snapshot, discarding observations without a finite share.
    ///
    /// Input order is not trusted; points are stably sorted by date.
    #[must_use]
    pub fn from_observations(observations: Vec<HistoricalObservation>) -> Self {
        let total = observations.len();
        let latest_date = observations.iter().map(|obs| obs.date).max();
        let latest_demand = observations
            .iter()
            .filter(|obs| obs.urban_electricity_demand_gwh.is_finite())
            .max_by_key(|obs| obs.date)
            .map(|obs| DemandPoint {
                date: obs.date,
                demand_twh: gwh_to_twh(obs.urban_electricity_demand_gwh),
            });

        let mut points: Vec<SeriesPoint> = observations
            .into_iter()
            .filter_map(|obs| {
                let share = obs.nuclear_share.filter(|s| s.is_finite())?;
                Some(SeriesPoint {
                    date: obs.date,
                    share,
                    generation_twh: gwh_to_twh(obs.nuclear_generation_gwh),
                    demand_twh: gwh_to_twh(obs.urban_electricity_demand_gwh),
                })
            })
            .collect();
        points.sort_by_key(|p| p.date);

        let dropped = total - points.len();
        Self {
            points,
            dropped,
            latest_date,
            latest_demand,
        }
    }

    #[must_use]
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of input observations discarded for a missing share
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    #[must_use]
    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Latest calendar year with a usable share
    #[must_use]
    pub fn last_year(&self) -> Option<i32> {
        self.points.last().map(SeriesPoint::year)
    }

    /// Latest calendar year of any observation, share or not
    #[must_use]
    pub fn last_observed_year(&self) -> Option<i32> {
        self.latest_date.map(|date| i32::from(date.year()))
    }

    /// Demand compounding starts here
    #[must_use]
    pub fn last_demand_point(&self) -> Option<DemandPoint> {
        self.latest_demand
    }

    pub fn shares(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(year: i16, share: Option<f64>) -> HistoricalObservation {
        HistoricalObservation {
            date: jiff::civil::date(year, 1, 1),
            nuclear_share: share,
            nuclear_generation_gwh: 780_000.0,
            urban_electricity_demand_gwh: 3_900_000.0,
            urban_population_percent: 83.0,
        }
    }

    #[test]
    fn test_null_shares_are_filtered_not_zeroed() {
        let snapshot = HistorySnapshot::from_observations(vec![
            obs(2021, Some(0.19)),
            obs(2022, None),
            obs(2023, Some(0.18)),
        ]);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.dropped(), 1);
        assert!(snapshot.shares().all(|s| s > 0.0));
    }

    #[test]
    fn test_snapshot_sorted_and_converted() {
        let snapshot =
            HistorySnapshot::from_observations(vec![obs(2024, Some(0.19)), obs(2020, Some(0.2))]);

        assert_eq!(snapshot.points()[0].year(), 2020);
        assert_eq!(snapshot.last_year(), Some(2024));
        assert!((snapshot.points()[0].demand_twh - 3900.0).abs() < 1e-9);
        assert!((snapshot.points()[0].generation_twh - 780.0).abs() < 1e-9);
    }

    #[test]
    fn test_latest_demand_kept_when_share_missing() {
        let mut newest = obs(2024, None);
        newest.urban_electricity_demand_gwh = 5_000_000.0;
        let snapshot = HistorySnapshot::from_observations(vec![
            obs(2022, Some(0.19)),
            newest,
            obs(2023, Some(0.18)),
        ]);

        assert_eq!(snapshot.last_year(), Some(2023));
        assert_eq!(snapshot.last_observed_year(), Some(2024));
        let demand = snapshot.last_demand_point().unwrap();
        assert_eq!(demand.year(), 2024);
        assert!((demand.demand_twh - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_demand_skipped_for_anchor() {
        let mut newest = obs(2024, Some(0.2));
        newest.urban_electricity_demand_gwh = f64::NAN;
        let snapshot = HistorySnapshot::from_observations(vec![obs(2023, Some(0.18)), newest]);

        assert_eq!(snapshot.last_observed_year(), Some(2024));
        assert_eq!(snapshot.last_demand_point().map(|d| d.year()), Some(2023));
    }

    #[test]
    fn test_non_finite_share_dropped() {
        let snapshot = HistorySnapshot::from_observations(vec![obs(2020, Some(f64::NAN))]);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.last_year(), None);
    }
}
