//! Client for the upstream conversational-analytics API.
//!
//! # Endpoints used
//!
//! - `POST /v1/transcript/project/{id}` - transcript listing (offset or cursor style)
//! - `GET /v1/transcript/{id}` - a transcript with its event log
//! - `POST /v2/query/usage` - usage time series and intent ranking
//!
//! The upstream is the source of truth; nothing here verifies its data.

pub mod client;
pub mod lenient;
pub mod messages;
pub mod pagination;
pub mod types;

pub use client::{AnalyticsClient, SortOrder, TranscriptSlice};
pub use messages::{ChatMessage, MessageRole};
pub use pagination::{Page, paginate};
pub use types::{IntentRecord, TranscriptRecord, UsageMetric, UsagePage, UsageRecord};
