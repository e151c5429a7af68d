use jiff::civil::Date;

use super::{ImpactLevel, InsightAnalyzer, InsightKind, MarketInsight};
use crate::model::HistoricalObservation;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compares the mean share of the newest observations with the ones before.
///
/// Rows without a share are skipped; when every share in the window is
/// "recent" there is nothing to compare against and no insight is raised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NuclearTrendAnalyzer {
    window: usize,
    recent: usize,
    threshold: f64,
}

impl NuclearTrendAnalyzer {
    #[must_use]
    pub fn new(window: usize, recent: usize, threshold: f64) -> Self {
        Self {
            window,
            recent,
            threshold,
        }
    }
}

impl InsightAnalyzer for NuclearTrendAnalyzer {
    fn kind(&self) -> InsightKind {
        InsightKind::NuclearTrend
    }

    fn analyze(&self, history: &[HistoricalObservation], today: Date) -> Vec<MarketInsight> {
        let window = &history[history.len().saturating_sub(self.window)..];
        if window.len() < self.recent {
            return Vec::new();
        }

        // Newest first
        let shares: Vec<f64> = window
            .iter()
            .rev()
            .filter_map(|obs| obs.nuclear_share.filter(|s| s.is_finite()))
            .collect();
        if shares.len() <= self.recent {
            return Vec::new();
        }

        let (recent, older) = shares.split_at(self.recent);
        let change = mean(recent) - mean(older);
        let confidence = (change.abs() * 10.0).min(0.9);

        if change > self.threshold {
            vec![MarketInsight::new(
                self.kind(),
                "Nuclear Share Showing Positive Trend",
                format!(
                    "Nuclear share has increased by {change:.3} over the last {} observations, indicating growing adoption.",
                    self.recent
                ),
                confidence,
                ImpactLevel::Medium,
                today,
                30,
            )]
        } else if change < -self.threshold {
            vec![MarketInsight::new(
                self.kind(),
                "Nuclear Share Declining",
                format!(
                    "Nuclear share has decreased by {:.3} over the last {} observations, requiring attention.",
                    change.abs(),
                    self.recent
                ),
                confidence,
                ImpactLevel::High,
                today,
                7,
            )]
        } else {
            Vec::new()
        }
    }
}

/// Flags headroom when the latest reported share is below a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketOpportunityAnalyzer {
    share_below: f64,
}

impl MarketOpportunityAnalyzer {
    #[must_use]
    pub fn new(share_below: f64) -> Self {
        Self { share_below }
    }
}

impl InsightAnalyzer for MarketOpportunityAnalyzer {
    fn kind(&self) -> InsightKind {
        InsightKind::MarketOpportunity
    }

    fn analyze(&self, history: &[HistoricalObservation], today: Date) -> Vec<MarketInsight> {
        let Some(latest) = history.last() else {
            return Vec::new();
        };
        // A latest row without a share says nothing about the current market
        let Some(share) = latest.nuclear_share.filter(|s| s.is_finite()) else {
            tracing::debug!(date = %latest.date, "latest observation has no share");
            return Vec::new();
        };
        if share >= self.share_below {
            return Vec::new();
        }

        vec![MarketInsight::new(
            self.kind(),
            "Significant Nuclear Growth Opportunity",
            format!(
                "Current nuclear share of {:.1}% represents significant growth potential in urban electricity markets.",
                share * 100.0
            ),
            0.8,
            ImpactLevel::High,
            today,
            90,
        )]
    }
}

/// Standing reminder to watch regulation; raised on every run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RiskAssessmentAnalyzer;

impl InsightAnalyzer for RiskAssessmentAnalyzer {
    fn kind(&self) -> InsightKind {
        InsightKind::RiskAssessment
    }

    fn analyze(&self, _history: &[HistoricalObservation], today: Date) -> Vec<MarketInsight> {
        vec![MarketInsight::new(
            self.kind(),
            "Regulatory Risk Monitoring",
            "Monitor regulatory changes that could impact nuclear deployment timelines and costs."
                .to_string(),
            0.7,
            ImpactLevel::Medium,
            today,
            60,
        )]
    }
}

/// Alerts when the newest observation is older than `stale_after_days`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFreshnessAnalyzer {
    stale_after_days: i32,
}

impl DataFreshnessAnalyzer {
    #[must_use]
    pub fn new(stale_after_days: i32) -> Self {
        Self { stale_after_days }
    }
}

impl InsightAnalyzer for DataFreshnessAnalyzer {
    fn kind(&self) -> InsightKind {
        InsightKind::PerformanceAnalysis
    }

    fn analyze(&self, history: &[HistoricalObservation], today: Date) -> Vec<MarketInsight> {
        let Some(latest) = history.last() else {
            return Vec::new();
        };
        let Ok(age) = latest.date.until(today) else {
            return Vec::new();
        };
        let days_old = age.get_days();
        if days_old <= self.stale_after_days {
            return Vec::new();
        }

        vec![MarketInsight::new(
            self.kind(),
            "Data Freshness Alert",
            format!(
                "Latest electricity data is {days_old} days old. Consider refreshing data sources."
            ),
            1.0,
            ImpactLevel::Medium,
            today,
            1,
        )]
    }
}
