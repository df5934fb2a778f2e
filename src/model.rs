//! Data models for the dashboard API.
//!
//! Overview and comparison types are entirely derived from upstream data; they
//! have no identity of their own and are recomputed on every cache miss.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::{
    FALLBACK_AVG_SESSION_DURATION, FALLBACK_COMPLETION_RATE, FAILURE_SATISFACTION_SCORE,
};
use crate::upstream::SortOrder;

/// Headline KPIs of an overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiMetrics {
    pub total_interactions: i64,
    pub unique_users: i64,
    /// Mean session duration in seconds.
    pub avg_session_duration: f64,
    /// Fraction of transcripts marked resolved, `0.0..=1.0`.
    pub completion_rate: f64,
    /// Mean customer sentiment on the 1-5 scale.
    pub satisfaction_score: f64,
}

impl KpiMetrics {
    /// Names of the metrics compared between periods, in output order.
    pub const COMPARED: [&'static str; 5] = [
        "total_interactions",
        "unique_users",
        "avg_session_duration",
        "completion_rate",
        "satisfaction_score",
    ];

    /// Look up a compared metric by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "total_interactions" => Some(self.total_interactions as f64),
            "unique_users" => Some(self.unique_users as f64),
            "avg_session_duration" => Some(self.avg_session_duration),
            "completion_rate" => Some(self.completion_rate),
            "satisfaction_score" => Some(self.satisfaction_score),
            _ => None,
        }
    }
}

/// One point of the interactions chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: String,
    pub interactions: i64,
}

/// An intent with its share of all interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentShare {
    pub intent: String,
    pub count: i64,
    pub percentage: f64,
}

/// Transcript counts bucketed by customer sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

impl SentimentDistribution {
    /// Illustrative distribution shown when there is nothing to bucket.
    pub const FALLBACK: SentimentDistribution = SentimentDistribution {
        positive: 60,
        neutral: 30,
        negative: 10,
    };

    pub fn total(&self) -> u64 {
        self.positive + self.neutral + self.negative
    }
}

/// Overview snapshot for one project and window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewMetrics {
    pub metrics: KpiMetrics,
    pub interactions_chart: Vec<ChartPoint>,
    pub top_intents: Vec<IntentShare>,
    pub sentiment_distribution: SentimentDistribution,

    /// Present only when the snapshot is the failure fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OverviewMetrics {
    /// The snapshot served when upstream data could not be fetched at all.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            metrics: KpiMetrics {
                total_interactions: 0,
                unique_users: 0,
                avg_session_duration: FALLBACK_AVG_SESSION_DURATION,
                completion_rate: FALLBACK_COMPLETION_RATE,
                satisfaction_score: FAILURE_SATISFACTION_SCORE,
            },
            interactions_chart: Vec::new(),
            top_intents: Vec::new(),
            sentiment_distribution: SentimentDistribution::FALLBACK,
            error: Some(reason.into()),
        }
    }
}

/// Result of computing an overview: real data, or the fallback snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum OverviewOutcome {
    Fresh(OverviewMetrics),
    /// Fallback snapshot; the failure is carried in its `error` field.
    Degraded(OverviewMetrics),
}

impl OverviewOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, OverviewOutcome::Degraded(_))
    }

    /// The snapshot to present; degraded snapshots carry their `error` note.
    pub fn into_metrics(self) -> OverviewMetrics {
        match self {
            OverviewOutcome::Fresh(metrics) | OverviewOutcome::Degraded(metrics) => metrics,
        }
    }
}

/// Current window versus the equally long window right before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub current: OverviewMetrics,
    pub previous: OverviewMetrics,
    /// Percent change per metric name.
    pub changes: BTreeMap<String, f64>,
}

/// A transcript as returned by the transcript listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub id: String,
    pub session_id: Option<String>,
    pub created_at: Option<String>,
    pub ended_at: Option<String>,
    /// Session duration in seconds, when the transcript reports one.
    pub duration: Option<i64>,
    /// Customer sentiment on the 1-5 scale, when evaluated.
    pub sentiment: Option<i64>,
    pub resolved: bool,
    pub properties: HashMap<String, Value>,
    pub evaluations: HashMap<String, Value>,
}

/// A busy period of the interactions series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakPeriod {
    pub period: String,
    pub count: i64,
    /// Percentage of all interactions in the window.
    pub share: f64,
}

/// Interactions series plus its busiest periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeaksReport {
    pub series: Vec<ChartPoint>,
    pub top: Vec<PeakPeriod>,
}

// ============================================================================
// Request and query types
// ============================================================================

/// Request body for the overview and compare endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowRequest {
    pub project_id: String,
    pub start: String,
    pub end: String,
}

/// Request body for the export endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub project_id: String,
    pub start: String,
    pub end: String,
    /// `"csv"` or `"pdf"`.
    pub format: String,
}

/// Query parameters for the transcript listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptsQuery {
    pub project_id: String,
    pub start: Option<String>,
    pub end: Option<String>,

    /// Page size (default: 100).
    #[serde(default = "default_transcript_limit")]
    pub limit: u32,

    /// Offset (default: 0).
    #[serde(default)]
    pub skip: u32,

    /// Sort order, `ASC` or `DESC` (default: `DESC`).
    #[serde(default)]
    pub order: SortOrder,
}

fn default_transcript_limit() -> u32 {
    100
}

/// Query parameters for the intents endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowQuery {
    pub project_id: String,
    pub start: String,
    pub end: String,
}

/// Query parameters for the peaks endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PeaksQuery {
    pub project_id: String,
    pub start: String,
    pub end: String,

    /// Number of busiest periods to return (default: 5).
    #[serde(default = "default_peaks_limit")]
    pub limit: usize,
}

fn default_peaks_limit() -> usize {
    5
}

/// Query parameters for cache invalidation.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateQuery {
    /// Glob pattern over cache keys, e.g. `overview:proj-1:*`.
    pub pattern: String,
}
