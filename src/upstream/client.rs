//! HTTP client for the upstream conversational-analytics API.
//!
//! # Retry policy
//!
//! Every call is attempted up to [`MAX_ATTEMPTS`] times. Only 5xx responses are
//! retried, sleeping `backoff × attempt` between attempts (0.8s, then 1.6s by
//! default). A 4xx fails immediately. Any status >= 400 left after the budget is
//! spent becomes [`UpstreamError::Status`].
//!
//! # Authentication
//!
//! Every request carries `Authorization: <api_key>` (no scheme prefix).

use std::time::Duration;

use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use super::messages::{ChatMessage, project_messages};
use super::pagination::{Page, paginate, paginate_up_to};
use super::types::{
    IntentRecord, TranscriptDetailResponse, TranscriptListResponse, TranscriptRecord, UsageMetric,
    UsagePage, UsageRecord, UsageResponse,
};
use crate::error::UpstreamError;
use crate::window::TimeWindow;

/// Default base URL of the upstream analytics API.
pub const DEFAULT_API_BASE: &str = "https://analytics-api.voiceflow.com";

/// Total attempts per call, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Base backoff between attempts; multiplied by the attempt number.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(800);

/// Per-call HTTP timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sort order for transcript listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[serde(alias = "asc")]
    Asc,
    #[default]
    #[serde(alias = "desc")]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Offset/limit selection of a transcript listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptSlice {
    pub take: u32,
    pub skip: u32,
    pub order: SortOrder,
}

impl Default for TranscriptSlice {
    fn default() -> Self {
        Self {
            take: 100,
            skip: 0,
            order: SortOrder::Desc,
        }
    }
}

/// Client for the upstream analytics API.
#[derive(Clone)]
pub struct AnalyticsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry_backoff: Duration,
}

impl std::fmt::Debug for AnalyticsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsClient")
            .field("base_url", &self.base_url)
            .field("retry_backoff", &self.retry_backoff)
            .finish_non_exhaustive()
    }
}

impl AnalyticsClient {
    /// Create a client against the default upstream.
    pub fn new(api_key: &str) -> Result<Self, UpstreamError> {
        Self::with_base_url(DEFAULT_API_BASE, api_key)
    }

    /// Create a client with a custom base URL (self-hosted upstream or tests).
    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Override the base retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Issue one authenticated call with retry.
    ///
    /// Returns `Ok(None)` for a successful response with an empty body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Option<Value>, UpstreamError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 1;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, self.api_key.as_str());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_server_error() && attempt < MAX_ATTEMPTS {
                let delay = self.retry_backoff * attempt;
                warn!(
                    %method,
                    path,
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Upstream server error; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let text = response.text().await?;
            if status.as_u16() >= 400 {
                return Err(UpstreamError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }

            debug!(%method, path, status = status.as_u16(), "Upstream call succeeded");
            if text.trim().is_empty() {
                return Ok(None);
            }
            return Ok(Some(serde_json::from_str(&text)?));
        }
    }

    async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<Option<T>, UpstreamError> {
        match self.request(method, path, body, query).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// List transcripts of a project.
    ///
    /// Offset-style responses are returned as-is; cursor-style responses are
    /// followed until `slice.take` records are collected or the cursors run out.
    #[instrument(skip(self))]
    pub async fn list_transcripts(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
        slice: TranscriptSlice,
    ) -> Result<Vec<TranscriptRecord>, UpstreamError> {
        let path = format!(
            "/v1/transcript/project/{}",
            urlencoding::encode(project_id)
        );
        let limit = slice.take as usize;

        paginate_up_to(limit, |cursor| {
            // The offset applies to the first page only; cursors carry it after that.
            let mut query = vec![("take", slice.take.to_string())];
            if cursor.is_none() {
                query.push(("skip", slice.skip.to_string()));
            }
            query.push(("order", slice.order.as_str().to_string()));

            let mut body = Map::new();
            if let Some(window) = window {
                body.insert("startDate".to_string(), json!(window.start_iso()));
                body.insert("endDate".to_string(), json!(window.end_iso()));
            }
            if let Some(cursor) = cursor {
                body.insert("cursor".to_string(), cursor);
            }
            let body = Value::Object(body);
            let path = path.as_str();

            async move {
                let response: Option<TranscriptListResponse> = self
                    .request_as(Method::POST, path, Some(&body), &query)
                    .await?;
                let (items, cursor) = response.map(|r| r.into_page()).unwrap_or_default();
                Ok::<_, UpstreamError>(Page::new(items, cursor))
            }
        })
        .await
    }

    /// Query one page of a usage metric.
    #[instrument(skip(self, metric, cursor), fields(metric = metric.as_str()))]
    pub async fn query_usage(
        &self,
        metric: UsageMetric,
        project_id: &str,
        window: Option<&TimeWindow>,
        limit: Option<u32>,
        cursor: Option<Value>,
    ) -> Result<UsagePage, UpstreamError> {
        let mut filter = Map::new();
        filter.insert("projectID".to_string(), json!(project_id));
        if let Some(window) = window {
            filter.insert("startTime".to_string(), json!(window.start_iso()));
            filter.insert("endTime".to_string(), json!(window.end_iso()));
        }
        if let Some(limit) = limit {
            filter.insert("limit".to_string(), json!(limit));
        }
        if let Some(cursor) = cursor {
            filter.insert("cursor".to_string(), cursor);
        }
        let body = json!({ "data": { "name": metric.as_str(), "filter": filter } });

        let response: Option<UsageResponse> = self
            .request_as(Method::POST, "/v2/query/usage", Some(&body), &[])
            .await?;

        Ok(match response {
            Some(response) => response.result.into(),
            None => UsagePage::Series {
                items: Vec::new(),
                cursor: None,
            },
        })
    }

    /// Every point of a usage time series, following cursors.
    pub async fn usage_series(
        &self,
        metric: UsageMetric,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<UsageRecord>, UpstreamError> {
        paginate(|cursor| async move {
            let page = self
                .query_usage(metric, project_id, window, None, cursor)
                .await?;
            let page = match page {
                UsagePage::Series { items, cursor } => Page::new(items, cursor),
                UsagePage::Intents(_) => Page::new(Vec::new(), None),
            };
            Ok::<_, UpstreamError>(page)
        })
        .await
    }

    /// The upstream intent ranking, best first.
    pub async fn top_intents(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
        limit: u32,
    ) -> Result<Vec<IntentRecord>, UpstreamError> {
        let page = self
            .query_usage(UsageMetric::TopIntents, project_id, window, Some(limit), None)
            .await?;
        Ok(match page {
            UsagePage::Intents(intents) => intents,
            UsagePage::Series { .. } => Vec::new(),
        })
    }

    /// Fetch a transcript's event log and project it into chat messages.
    #[instrument(skip(self))]
    pub async fn get_chat_messages(
        &self,
        transcript_id: &str,
    ) -> Result<Vec<ChatMessage>, UpstreamError> {
        let path = format!("/v1/transcript/{}", urlencoding::encode(transcript_id));
        let response: Option<TranscriptDetailResponse> =
            self.request_as(Method::GET, &path, None, &[]).await?;

        Ok(response
            .map(|r| project_messages(&r.transcript.logs))
            .unwrap_or_default())
    }
}
