//! Market insights and performance checks over the historical series
//!
//! Insights are short, expiring findings produced by a set of
//! [`InsightAnalyzer`]s. The performance check scores how well the history
//! matches the ensemble's baseline assumptions about drift and volatility.
//! Both read the same provider as the orchestrator and never touch
//! projections.

mod insights;
mod performance;

pub use insights::{
    DataFreshnessAnalyzer, MarketOpportunityAnalyzer, NuclearTrendAnalyzer,
    RiskAssessmentAnalyzer,
};
pub use performance::{PerformanceMetrics, evaluate_performance};

use std::fmt;
use std::sync::Arc;

use jiff::Span;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::model::HistoricalObservation;
use crate::storage::HistoricalSeriesProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    NuclearTrend,
    MarketOpportunity,
    RiskAssessment,
    PerformanceAnalysis,
}

impl InsightKind {
    pub const ALL: [InsightKind; 4] = [
        InsightKind::NuclearTrend,
        InsightKind::MarketOpportunity,
        InsightKind::RiskAssessment,
        InsightKind::PerformanceAnalysis,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InsightKind::NuclearTrend => "nuclear_trend",
            InsightKind::MarketOpportunity => "market_opportunity",
            InsightKind::RiskAssessment => "risk_assessment",
            InsightKind::PerformanceAnalysis => "performance_analysis",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        [ImpactLevel::Low, ImpactLevel::Medium, ImpactLevel::High]
            .into_iter()
            .find(|level| level.as_str() == s)
    }
}

/// One finding, valid from `generated_on` through `expires_on`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInsight {
    pub insight_type: InsightKind,
    pub title: String,
    pub description: String,
    /// In [0, 1]
    pub confidence_score: f64,
    pub impact_level: ImpactLevel,
    pub generated_on: Date,
    pub expires_on: Date,
}

impl MarketInsight {
    pub(crate) fn new(
        insight_type: InsightKind,
        title: &str,
        description: String,
        confidence_score: f64,
        impact_level: ImpactLevel,
        today: Date,
        valid_days: i32,
    ) -> Self {
        Self {
            insight_type,
            title: title.to_string(),
            description,
            confidence_score: confidence_score.clamp(0.0, 1.0),
            impact_level,
            generated_on: today,
            expires_on: today.saturating_add(Span::new().days(valid_days)),
        }
    }

    #[must_use]
    pub fn is_active(&self, today: Date) -> bool {
        today <= self.expires_on
    }
}

/// A rule that turns the history into zero or more insights
pub trait InsightAnalyzer: Send + Sync {
    fn kind(&self) -> InsightKind;

    /// `history` is ascending by date and may contain rows without a share
    fn analyze(&self, history: &[HistoricalObservation], today: Date) -> Vec<MarketInsight>;
}

/// Trend, opportunity, risk and freshness analyzers, in that order
#[must_use]
pub fn default_analyzers(config: &AnalyticsConfig) -> Vec<Box<dyn InsightAnalyzer>> {
    vec![
        Box::new(NuclearTrendAnalyzer::new(
            config.trend_window,
            config.trend_recent,
            config.trend_threshold,
        )),
        Box::new(MarketOpportunityAnalyzer::new(config.opportunity_share_below)),
        Box::new(RiskAssessmentAnalyzer),
        Box::new(DataFreshnessAnalyzer::new(config.stale_after_days)),
    ]
}

/// Run every analyzer over one copy of the history, sorted by date
#[must_use]
pub fn generate_insights(
    analyzers: &[Box<dyn InsightAnalyzer>],
    history: &[HistoricalObservation],
    today: Date,
) -> Vec<MarketInsight> {
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|obs| obs.date);

    let mut insights = Vec::new();
    for analyzer in analyzers {
        let found = analyzer.analyze(&sorted, today);
        tracing::info!(kind = %analyzer.kind(), count = found.len(), "generated insights");
        insights.extend(found);
    }
    insights
}

/// Insights and performance checks against a history provider
pub struct AnalyticsService {
    history: Arc<dyn HistoricalSeriesProvider>,
    analyzers: Vec<Box<dyn InsightAnalyzer>>,
    config: AnalyticsConfig,
}

impl fmt::Debug for AnalyticsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsService")
            .field(
                "analyzers",
                &self.analyzers.iter().map(|a| a.kind()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AnalyticsService {
    /// Validates `config` and registers the default analyzers
    pub fn new(history: Arc<dyn HistoricalSeriesProvider>, config: AnalyticsConfig) -> Result<Self> {
        let analyzers = default_analyzers(&config);
        Self::with_analyzers(history, analyzers, config)
    }

    pub fn with_analyzers(
        history: Arc<dyn HistoricalSeriesProvider>,
        analyzers: Vec<Box<dyn InsightAnalyzer>>,
        config: AnalyticsConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            history,
            analyzers,
            config,
        })
    }

    pub fn insights(&self, today: Date) -> Result<Vec<MarketInsight>> {
        let history = self.history.fetch()?;
        let insights = generate_insights(&self.analyzers, &history, today);
        tracing::info!(count = insights.len(), "insight generation completed");
        Ok(insights)
    }

    /// Score the history for `model_name`; `None` with fewer than two shares
    pub fn evaluate(&self, model_name: &str, today: Date) -> Result<Option<PerformanceMetrics>> {
        let history = self.history.fetch()?;
        let metrics = evaluate_performance(&history, model_name, today, &self.config);
        match &metrics {
            Some(m) => tracing::info!(
                model = model_name,
                overall_accuracy = m.overall_accuracy,
                "evaluated model performance"
            ),
            None => tracing::warn!(model = model_name, "not enough history to evaluate"),
        }
        Ok(metrics)
    }
}
