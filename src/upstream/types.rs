//! Response shapes returned by the upstream analytics API.
//!
//! The upstream serves the same logical data in a few envelope styles depending
//! on endpoint version. Each style is its own variant and is decoded once,
//! explicitly, instead of probing keys at runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient::{int_or_zero, skip_invalid, string_or_default, string_or_none};

// ============================================================================
// Transcripts
// ============================================================================

/// A `name -> value` entry attached to a transcript (property or evaluation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedValue {
    #[serde(default, deserialize_with = "string_or_default")]
    pub name: String,

    #[serde(default)]
    pub value: Value,
}

/// A recorded conversation session as listed by the upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    #[serde(default, alias = "_id", deserialize_with = "string_or_default")]
    pub id: String,

    #[serde(default, rename = "sessionID", deserialize_with = "string_or_none")]
    pub session_id: Option<String>,

    #[serde(default, rename = "createdAt", deserialize_with = "string_or_none")]
    pub created_at: Option<String>,

    #[serde(default, rename = "endedAt", deserialize_with = "string_or_none")]
    pub ended_at: Option<String>,

    #[serde(default, deserialize_with = "skip_invalid")]
    pub properties: Vec<NamedValue>,

    #[serde(default, deserialize_with = "skip_invalid")]
    pub evaluations: Vec<NamedValue>,
}

impl TranscriptRecord {
    /// Value of a property. Later entries with the same name win.
    pub fn property(&self, name: &str) -> Option<&Value> {
        last_named(&self.properties, name)
    }

    /// Value of an evaluation. Later entries with the same name win.
    pub fn evaluation(&self, name: &str) -> Option<&Value> {
        last_named(&self.evaluations, name)
    }
}

fn last_named<'a>(entries: &'a [NamedValue], name: &str) -> Option<&'a Value> {
    entries
        .iter()
        .rev()
        .find(|entry| entry.name == name)
        .map(|entry| &entry.value)
}

/// Inner page of a cursor-style transcript listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptPage {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub items: Vec<TranscriptRecord>,

    #[serde(default)]
    pub cursor: Option<Value>,
}

/// Envelope of `POST /v1/transcript/project/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TranscriptListResponse {
    /// Offset/limit style: `{transcripts: [...]}`.
    Transcripts {
        #[serde(deserialize_with = "skip_invalid")]
        transcripts: Vec<TranscriptRecord>,
    },

    /// Cursor style with top-level items: `{items: [...], cursor?}`.
    Items {
        #[serde(deserialize_with = "skip_invalid")]
        items: Vec<TranscriptRecord>,
        #[serde(default)]
        cursor: Option<Value>,
    },

    /// Cursor style wrapped in a result: `{result: {items: [...], cursor?}}`.
    Wrapped { result: TranscriptPage },
}

impl TranscriptListResponse {
    /// Split into the records of this page and the cursor for the next one.
    pub fn into_page(self) -> (Vec<TranscriptRecord>, Option<Value>) {
        match self {
            TranscriptListResponse::Transcripts { transcripts } => (transcripts, None),
            TranscriptListResponse::Items { items, cursor } => (items, non_empty_cursor(cursor)),
            TranscriptListResponse::Wrapped { result } => {
                (result.items, non_empty_cursor(result.cursor))
            }
        }
    }
}

/// Envelope of `GET /v1/transcript/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptDetailResponse {
    pub transcript: TranscriptDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptDetail {
    #[serde(default, deserialize_with = "skip_invalid")]
    pub logs: Vec<TranscriptLog>,
}

/// One event in a transcript's log.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptLog {
    /// Event family, e.g. `action` (user input) or `trace` (assistant output).
    #[serde(default, rename = "type", deserialize_with = "string_or_default")]
    pub kind: String,

    #[serde(default)]
    pub data: Option<LogData>,

    #[serde(default, rename = "createdAt", deserialize_with = "string_or_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogData {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub payload: Option<LogPayload>,
}

/// Known payload spellings that can carry human-readable text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LogPayload {
    Text(String),
    Message { message: String },
    Query { query: String },
    Label { label: String },
    Other(Value),
}

impl LogPayload {
    /// The text carried by this payload, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            LogPayload::Text(text)
            | LogPayload::Message { message: text }
            | LogPayload::Query { query: text }
            | LogPayload::Label { label: text } => Some(text.as_str()),
            LogPayload::Other(_) => None,
        }
    }
}

// ============================================================================
// Usage queries
// ============================================================================

/// Metric names understood by `POST /v2/query/usage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageMetric {
    Interactions,
    UniqueUsers,
    TopIntents,
}

impl UsageMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageMetric::Interactions => "interactions",
            UsageMetric::UniqueUsers => "unique_users",
            UsageMetric::TopIntents => "top_intents",
        }
    }
}

/// A `(period, count)` point of a usage time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(default, deserialize_with = "string_or_default")]
    pub period: String,

    #[serde(default, deserialize_with = "int_or_zero")]
    pub count: i64,
}

/// One entry of the upstream intent ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRecord {
    #[serde(default, deserialize_with = "string_or_default")]
    pub name: String,

    #[serde(default, deserialize_with = "int_or_zero")]
    pub count: i64,
}

/// Envelope of `POST /v2/query/usage`.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageResponse {
    pub result: UsageResult,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UsageResult {
    /// Shape returned for `top_intents`.
    Intents {
        #[serde(deserialize_with = "skip_invalid")]
        intents: Vec<IntentRecord>,
    },

    /// Shape returned for time-series metrics.
    Series {
        #[serde(default, deserialize_with = "skip_invalid")]
        items: Vec<UsageRecord>,
        #[serde(default)]
        cursor: Option<Value>,
    },
}

/// One decoded page of a usage query.
#[derive(Debug, Clone, PartialEq)]
pub enum UsagePage {
    Series {
        items: Vec<UsageRecord>,
        cursor: Option<Value>,
    },
    Intents(Vec<IntentRecord>),
}

impl From<UsageResult> for UsagePage {
    fn from(result: UsageResult) -> Self {
        match result {
            UsageResult::Intents { intents } => UsagePage::Intents(intents),
            UsageResult::Series { items, cursor } => UsagePage::Series {
                items,
                cursor: non_empty_cursor(cursor),
            },
        }
    }
}

/// Null and empty-string cursors mean "no further pages".
pub fn non_empty_cursor(cursor: Option<Value>) -> Option<Value> {
    match cursor {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transcript_list_shapes() {
        let offset: TranscriptListResponse =
            serde_json::from_value(json!({"transcripts": [{"id": "t1"}]})).unwrap();
        let (items, cursor) = offset.into_page();
        assert_eq!(items[0].id, "t1");
        assert!(cursor.is_none());

        let flat: TranscriptListResponse =
            serde_json::from_value(json!({"items": [{"_id": "t2"}], "cursor": "c1"})).unwrap();
        let (items, cursor) = flat.into_page();
        assert_eq!(items[0].id, "t2");
        assert_eq!(cursor, Some(json!("c1")));

        let wrapped: TranscriptListResponse = serde_json::from_value(
            json!({"result": {"items": [{"id": "t3"}], "cursor": ""}}),
        )
        .unwrap();
        let (items, cursor) = wrapped.into_page();
        assert_eq!(items[0].id, "t3");
        assert!(cursor.is_none());
    }

    #[test]
    fn test_usage_result_shapes() {
        let series: UsageResponse = serde_json::from_value(json!({
            "result": {"items": [{"period": "2025-09-01", "count": 4}], "cursor": 2}
        }))
        .unwrap();
        assert_eq!(
            UsagePage::from(series.result),
            UsagePage::Series {
                items: vec![UsageRecord {
                    period: "2025-09-01".to_string(),
                    count: 4
                }],
                cursor: Some(json!(2)),
            }
        );

        let intents: UsageResponse = serde_json::from_value(json!({
            "result": {"intents": [{"name": "billing", "count": 9}]}
        }))
        .unwrap();
        assert!(matches!(UsagePage::from(intents.result), UsagePage::Intents(ref v) if v.len() == 1));
    }

    #[test]
    fn test_malformed_usage_records_do_not_sink_the_page() {
        let series: UsageResponse = serde_json::from_value(json!({
            "result": {"items": [
                {"period": "d1", "count": 40},
                {"period": "d2", "count": 2.0},
                {"period": null, "count": null},
                "junk"
            ]}
        }))
        .unwrap();

        let UsagePage::Series { items, .. } = UsagePage::from(series.result) else {
            panic!("expected a series page");
        };
        let counts: Vec<i64> = items.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![40, 2, 0]);
        assert_eq!(items[2].period, "");

        let intents: UsageResponse = serde_json::from_value(json!({
            "result": {"intents": [{"name": "billing", "count": "7"}, {"name": 3, "count": 1}, []]}
        }))
        .unwrap();
        let UsagePage::Intents(intents) = UsagePage::from(intents.result) else {
            panic!("expected an intent ranking");
        };
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].count, 7);
        assert_eq!(intents[1].name, "3");
    }

    #[test]
    fn test_malformed_transcript_fields_tolerated() {
        let listing: TranscriptListResponse = serde_json::from_value(json!({
            "transcripts": [
                {"id": "t1", "sessionID": 12345,
                 "properties": [{"name": null, "value": 1}, {"name": "duration", "value": 30}, 5],
                 "evaluations": null},
                {"id": 99, "createdAt": false},
                "not a transcript"
            ]
        }))
        .unwrap();

        let (items, _) = listing.into_page();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].session_id.as_deref(), Some("12345"));
        assert_eq!(items[0].properties.len(), 2);
        assert_eq!(items[0].property("duration"), Some(&json!(30)));
        assert!(items[0].evaluations.is_empty());
        assert_eq!(items[1].id, "99");
        assert_eq!(items[1].created_at, None);
    }

    #[test]
    fn test_last_named_value_wins() {
        let record: TranscriptRecord = serde_json::from_value(json!({
            "id": "t1",
            "properties": [
                {"name": "duration", "value": 10},
                {"name": "duration", "value": 25}
            ]
        }))
        .unwrap();

        assert_eq!(record.property("duration"), Some(&json!(25)));
        assert_eq!(record.evaluation("Customer sentiment"), None);
    }

    #[test]
    fn test_log_payload_text() {
        let payloads: Vec<LogPayload> = serde_json::from_value(json!([
            "hello",
            {"message": "hi there"},
            {"query": "reset password", "intent": {"name": "reset"}},
            {"label": "Yes"},
            {"slate": {}}
        ]))
        .unwrap();

        let texts: Vec<Option<&str>> = payloads.iter().map(LogPayload::text).collect();
        assert_eq!(
            texts,
            vec![
                Some("hello"),
                Some("hi there"),
                Some("reset password"),
                Some("Yes"),
                None
            ]
        );
    }
}
