//! Derivation of dashboard metrics from raw upstream records.
//!
//! Everything here is pure. Malformed or missing sub-fields are skipped per
//! record; a metric with no usable input falls back to a fixed constant so the
//! dashboard always renders.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::{
    ChartPoint, IntentShare, KpiMetrics, OverviewMetrics, PeakPeriod, SentimentDistribution,
    TranscriptSummary,
};
use crate::upstream::lenient::coerce_int;
use crate::upstream::types::NamedValue;
use crate::upstream::{IntentRecord, TranscriptRecord, UsageRecord};

/// Transcript property holding the session length in seconds.
pub const DURATION_PROPERTY: &str = "duration";

/// Evaluation holding the 1-5 customer sentiment score.
pub const SENTIMENT_EVALUATION: &str = "Customer sentiment";

/// Evaluation flagging whether the customer's issue was resolved.
pub const RESOLUTION_EVALUATION: &str = "Resolution achieved";

/// Used when no transcript reports a usable duration.
pub const FALLBACK_AVG_SESSION_DURATION: f64 = 180.5;

/// Used when there are no transcripts.
pub const FALLBACK_COMPLETION_RATE: f64 = 0.75;

/// Used when no transcript carries a sentiment score.
pub const FALLBACK_SATISFACTION_SCORE: f64 = 3.0;

/// Satisfaction reported by the failure fallback overview.
pub const FAILURE_SATISFACTION_SCORE: f64 = 4.2;

/// Number of intents kept in an overview.
pub const TOP_INTENTS: usize = 10;

/// Raw inputs of one overview computation.
#[derive(Debug, Clone, Default)]
pub struct OverviewInputs {
    pub interactions: Vec<UsageRecord>,
    pub unique_users: Vec<UsageRecord>,
    pub intents: Vec<IntentRecord>,
    pub transcripts: Vec<TranscriptRecord>,
}

/// Build an overview snapshot from raw records.
pub fn derive_overview(inputs: &OverviewInputs) -> OverviewMetrics {
    let total_interactions = sum_counts(&inputs.interactions);

    OverviewMetrics {
        metrics: KpiMetrics {
            total_interactions,
            unique_users: sum_counts(&inputs.unique_users),
            avg_session_duration: avg_session_duration(&inputs.transcripts),
            completion_rate: completion_rate(&inputs.transcripts),
            satisfaction_score: satisfaction_score(&inputs.transcripts),
        },
        interactions_chart: interactions_chart(&inputs.interactions),
        top_intents: top_intents(&inputs.intents, total_interactions, TOP_INTENTS),
        sentiment_distribution: sentiment_distribution(&inputs.transcripts),
        error: None,
    }
}

pub fn sum_counts(records: &[UsageRecord]) -> i64 {
    records.iter().map(|r| r.count).sum()
}

pub fn interactions_chart(records: &[UsageRecord]) -> Vec<ChartPoint> {
    records
        .iter()
        .map(|r| ChartPoint {
            date: r.period.clone(),
            interactions: r.count,
        })
        .collect()
}

pub fn avg_session_duration(transcripts: &[TranscriptRecord]) -> f64 {
    let durations: Vec<i64> = transcripts
        .iter()
        .filter_map(|t| t.property(DURATION_PROPERTY).and_then(coerce_int))
        .collect();
    mean(&durations).unwrap_or(FALLBACK_AVG_SESSION_DURATION)
}

pub fn completion_rate(transcripts: &[TranscriptRecord]) -> f64 {
    if transcripts.is_empty() {
        return FALLBACK_COMPLETION_RATE;
    }
    let resolved = transcripts.iter().filter(|t| is_resolved(t)).count();
    resolved as f64 / transcripts.len() as f64
}

pub fn satisfaction_score(transcripts: &[TranscriptRecord]) -> f64 {
    let scores: Vec<i64> = transcripts.iter().filter_map(sentiment_of).collect();
    mean(&scores).unwrap_or(FALLBACK_SATISFACTION_SCORE)
}

/// Bucket transcripts by sentiment: `>= 4` positive, `<= 2` negative.
///
/// Transcripts without a score count as neutral, so the buckets always sum to
/// the number of transcripts.
pub fn sentiment_distribution(transcripts: &[TranscriptRecord]) -> SentimentDistribution {
    if transcripts.is_empty() {
        return SentimentDistribution::FALLBACK;
    }

    let mut positive = 0;
    let mut negative = 0;
    for score in transcripts.iter().filter_map(sentiment_of) {
        if score >= 4 {
            positive += 1;
        } else if score <= 2 {
            negative += 1;
        }
    }

    SentimentDistribution {
        positive,
        negative,
        neutral: transcripts.len() as u64 - positive - negative,
    }
}

/// Annotate the first `limit` ranked intents with their share of interactions.
pub fn top_intents(
    intents: &[IntentRecord],
    total_interactions: i64,
    limit: usize,
) -> Vec<IntentShare> {
    intents
        .iter()
        .take(limit)
        .map(|intent| IntentShare {
            intent: intent.name.clone(),
            count: intent.count,
            percentage: share_of(intent.count, total_interactions),
        })
        .collect()
}

/// Busiest periods of a series, highest count first.
pub fn peak_periods(records: &[UsageRecord], limit: usize) -> Vec<PeakPeriod> {
    let total = sum_counts(records);
    let mut ranked: Vec<&UsageRecord> = records.iter().collect();
    // Stable sort keeps upstream order among equal counts.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));

    ranked
        .into_iter()
        .take(limit)
        .map(|r| PeakPeriod {
            period: r.period.clone(),
            count: r.count,
            share: share_of(r.count, total),
        })
        .collect()
}

/// Percent change from `previous` to `current`; 0 when `previous` is 0.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Percent changes of every compared KPI.
pub fn kpi_changes(current: &KpiMetrics, previous: &KpiMetrics) -> Vec<(&'static str, f64)> {
    KpiMetrics::COMPARED
        .iter()
        .filter_map(|&name| {
            let now = current.get(name)?;
            let before = previous.get(name)?;
            Some((name, percent_change(now, before)))
        })
        .collect()
}

/// Flatten a transcript for presentation.
pub fn summarize_transcript(record: &TranscriptRecord) -> TranscriptSummary {
    TranscriptSummary {
        id: record.id.clone(),
        session_id: record.session_id.clone(),
        created_at: record.created_at.clone(),
        ended_at: record.ended_at.clone(),
        duration: record.property(DURATION_PROPERTY).and_then(coerce_int),
        sentiment: sentiment_of(record),
        resolved: is_resolved(record),
        properties: flatten(&record.properties),
        evaluations: flatten(&record.evaluations),
    }
}

fn flatten(entries: &[NamedValue]) -> HashMap<String, Value> {
    // Inserting in order makes the last entry for a name win.
    let mut map = HashMap::new();
    for entry in entries {
        map.insert(entry.name.clone(), entry.value.clone());
    }
    map
}

fn sentiment_of(record: &TranscriptRecord) -> Option<i64> {
    record.evaluation(SENTIMENT_EVALUATION).and_then(coerce_int)
}

fn is_resolved(record: &TranscriptRecord) -> bool {
    match record.evaluation(RESOLUTION_EVALUATION) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn mean(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<i64>() as f64 / values.len() as f64)
    }
}

fn share_of(count: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to_tenth(count as f64 / total as f64 * 100.0)
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
