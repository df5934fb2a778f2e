//! Dashboard orchestration over the upstream analytics API.
//!
//! This module ties the upstream client, metric derivation and the cache
//! together. Each operation builds a cache key from its normalized parameters
//! and computes on a miss:
//!
//! - Overview: four concurrent upstream fetches, derived into KPIs
//! - Comparison: two overviews, current and the equally long previous window
//! - Transcripts, intents and chat messages: cached passthroughs
//! - Peaks: busiest periods of the interactions series
//!
//! # Usage
//!
//! ```ignore
//! let dashboard = Dashboard::new(client, cache);
//! let overview = dashboard.get_overview("project-id", &window).await;
//! ```

use std::collections::BTreeMap;

use tracing::{info, instrument, warn};

use crate::cache::{CacheService, cache_key};
use crate::error::UpstreamError;
use crate::export::{self, ExportDocument, ExportFormat};
use crate::metrics::{self, OverviewInputs, TOP_INTENTS};
use crate::model::{ComparisonResult, OverviewMetrics, OverviewOutcome, PeaksReport, TranscriptSummary};
use crate::upstream::{
    AnalyticsClient, ChatMessage, IntentRecord, SortOrder, TranscriptSlice, UsageMetric,
};
use crate::window::TimeWindow;

/// Transcripts sampled per overview for duration, resolution and sentiment.
pub const OVERVIEW_TRANSCRIPT_SAMPLE: u32 = 250;

/// Intents requested by the intent ranking endpoint.
pub const INTENTS_LIMIT: u32 = 50;

/// Aggregates upstream data into dashboard views.
#[derive(Debug, Clone)]
pub struct Dashboard {
    client: AnalyticsClient,
    cache: CacheService,
}

impl Dashboard {
    pub fn new(client: AnalyticsClient, cache: CacheService) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// Overview for a project and window.
    ///
    /// Never fails: when any upstream fetch fails the fallback snapshot is
    /// returned as [`OverviewOutcome::Degraded`]. Degraded snapshots are not
    /// cached, so the next request retries upstream.
    #[instrument(skip(self, window), fields(start = %window.start_iso(), end = %window.end_iso()))]
    pub async fn get_overview(&self, project_id: &str, window: &TimeWindow) -> OverviewOutcome {
        match self.cached_overview(project_id, window).await {
            Ok(metrics) => OverviewOutcome::Fresh(metrics),
            Err(e) => {
                warn!(error = %e, "Overview degraded to fallback");
                OverviewOutcome::Degraded(OverviewMetrics::fallback(e.to_string()))
            }
        }
    }

    /// Compare a window with the equally long window ending at its start.
    ///
    /// The two overviews are fetched concurrently and degrade independently.
    #[instrument(skip(self, window), fields(start = %window.start_iso(), end = %window.end_iso()))]
    pub async fn get_comparison(&self, project_id: &str, window: &TimeWindow) -> ComparisonResult {
        let previous_window = window.previous();

        let (current, previous) = tokio::join!(
            self.get_overview(project_id, window),
            self.get_overview(project_id, &previous_window),
        );
        let current = current.into_metrics();
        let previous = previous.into_metrics();

        let changes: BTreeMap<String, f64> = metrics::kpi_changes(&current.metrics, &previous.metrics)
            .into_iter()
            .map(|(name, change)| (name.to_string(), change))
            .collect();

        ComparisonResult {
            current,
            previous,
            changes,
        }
    }

    /// A page of processed transcripts.
    pub async fn get_transcripts(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
        slice: TranscriptSlice,
    ) -> Result<Vec<TranscriptSummary>, UpstreamError> {
        let take = slice.take.to_string();
        let skip = slice.skip.to_string();
        let key = cache_key(
            "transcripts",
            project_id,
            window,
            &[&take, &skip, slice.order.as_str()],
        );

        self.cache
            .get_or_compute(&key, || async {
                let records = self.client.list_transcripts(project_id, window, slice).await?;
                Ok::<_, UpstreamError>(records.iter().map(metrics::summarize_transcript).collect())
            })
            .await
    }

    /// The upstream intent ranking for a window.
    pub async fn get_top_intents(
        &self,
        project_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<IntentRecord>, UpstreamError> {
        let key = cache_key("intents", project_id, Some(window), &[]);
        self.cache
            .get_or_compute(&key, || {
                self.client.top_intents(project_id, Some(window), INTENTS_LIMIT)
            })
            .await
    }

    /// Chat messages of one transcript.
    pub async fn get_transcript_messages(
        &self,
        transcript_id: &str,
    ) -> Result<Vec<ChatMessage>, UpstreamError> {
        let key = format!("transcript_messages:{transcript_id}");
        self.cache
            .get_or_compute(&key, || self.client.get_chat_messages(transcript_id))
            .await
    }

    /// The interactions series with its `limit` busiest periods.
    pub async fn get_peaks(
        &self,
        project_id: &str,
        window: &TimeWindow,
        limit: usize,
    ) -> Result<PeaksReport, UpstreamError> {
        let limit_part = limit.to_string();
        let key = cache_key("peaks", project_id, Some(window), &[&limit_part]);

        self.cache
            .get_or_compute(&key, || async {
                let series = self
                    .client
                    .usage_series(UsageMetric::Interactions, project_id, Some(window))
                    .await?;
                Ok::<_, UpstreamError>(PeaksReport {
                    series: metrics::interactions_chart(&series),
                    top: metrics::peak_periods(&series, limit),
                })
            })
            .await
    }

    /// Render the overview KPIs of a window as a report.
    ///
    /// Unlike [`Dashboard::get_overview`], upstream failures are returned.
    pub async fn export(
        &self,
        project_id: &str,
        window: &TimeWindow,
        format: ExportFormat,
    ) -> Result<ExportDocument, UpstreamError> {
        let overview = self.cached_overview(project_id, window).await?;
        Ok(export::render(format, &overview.metrics, window))
    }

    /// Drop cached entries matching a glob pattern.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let deleted = self.cache.invalidate(pattern).await;
        info!(pattern, deleted, "Cache entries invalidated");
        deleted
    }

    async fn cached_overview(
        &self,
        project_id: &str,
        window: &TimeWindow,
    ) -> Result<OverviewMetrics, UpstreamError> {
        let key = cache_key("overview", project_id, Some(window), &[]);
        self.cache
            .get_or_compute(&key, || self.compute_overview(project_id, window))
            .await
    }

    async fn compute_overview(
        &self,
        project_id: &str,
        window: &TimeWindow,
    ) -> Result<OverviewMetrics, UpstreamError> {
        let sample = TranscriptSlice {
            take: OVERVIEW_TRANSCRIPT_SAMPLE,
            skip: 0,
            order: SortOrder::Desc,
        };

        // All four fetches run to completion; the first error in this order wins.
        let (interactions, unique_users, intents, transcripts) = tokio::join!(
            self.client.usage_series(UsageMetric::Interactions, project_id, Some(window)),
            self.client.usage_series(UsageMetric::UniqueUsers, project_id, Some(window)),
            self.client.top_intents(project_id, Some(window), TOP_INTENTS as u32),
            self.client.list_transcripts(project_id, Some(window), sample),
        );

        let inputs = OverviewInputs {
            interactions: interactions?,
            unique_users: unique_users?,
            intents: intents?,
            transcripts: transcripts?,
        };

        info!(
            interactions = inputs.interactions.len(),
            transcripts = inputs.transcripts.len(),
            "Overview computed"
        );

        Ok(metrics::derive_overview(&inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DEFAULT_TTL, SqliteCacheBackend};
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn window() -> TimeWindow {
        TimeWindow::parse("2025-09-08", "2025-09-15").unwrap()
    }

    async fn dashboard_for(server: &mockito::ServerGuard, cached: bool) -> Dashboard {
        let client = AnalyticsClient::with_base_url(&server.url(), "test-key")
            .unwrap()
            .with_retry_backoff(Duration::from_millis(1));
        let cache = if cached {
            let backend = SqliteCacheBackend::connect("sqlite::memory:").await.unwrap();
            CacheService::new(Arc::new(backend), DEFAULT_TTL)
        } else {
            CacheService::disabled()
        };
        Dashboard::new(client, cache)
    }

    async fn mock_usage(
        server: &mut mockito::ServerGuard,
        name: &str,
        result: serde_json::Value,
    ) -> mockito::Mock {
        server
            .mock("POST", "/v2/query/usage")
            .match_body(Matcher::PartialJson(json!({"data": {"name": name}})))
            .with_status(200)
            .with_body(json!({ "result": result }).to_string())
            .create_async()
            .await
    }

    async fn mock_healthy_upstream(server: &mut mockito::ServerGuard) -> Vec<mockito::Mock> {
        vec![
            mock_usage(
                server,
                "interactions",
                json!({"items": [{"period": "2025-09-08", "count": 30}, {"period": "2025-09-09", "count": 70}]}),
            )
            .await,
            mock_usage(server, "unique_users", json!({"items": [{"period": "2025-09-08", "count": 12}]})).await,
            mock_usage(server, "top_intents", json!({"intents": [{"name": "billing", "count": 25}]})).await,
            server
                .mock("POST", "/v1/transcript/project/p1")
                .match_query(Matcher::Any)
                .with_status(200)
                .with_body(
                    json!({"transcripts": [
                        {"id": "t1", "properties": [{"name": "duration", "value": 100}],
                         "evaluations": [{"name": "Customer sentiment", "value": 5},
                                         {"name": "Resolution achieved", "value": true}]},
                        {"id": "t2", "properties": [{"name": "duration", "value": 200}],
                         "evaluations": [{"name": "Customer sentiment", "value": 1}]}
                    ]})
                    .to_string(),
                )
                .create_async()
                .await,
        ]
    }

    #[tokio::test]
    async fn test_overview_derives_from_upstream() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_healthy_upstream(&mut server).await;
        let dashboard = dashboard_for(&server, false).await;

        let outcome = dashboard.get_overview("p1", &window()).await;
        assert!(!outcome.is_degraded());

        let overview = outcome.into_metrics();
        assert_eq!(overview.metrics.total_interactions, 100);
        assert_eq!(overview.metrics.unique_users, 12);
        assert_eq!(overview.metrics.avg_session_duration, 150.0);
        assert_eq!(overview.metrics.completion_rate, 0.5);
        assert_eq!(overview.metrics.satisfaction_score, 3.0);
        assert_eq!(overview.top_intents[0].percentage, 25.0);
        assert_eq!(overview.sentiment_distribution.positive, 1);
        assert_eq!(overview.sentiment_distribution.negative, 1);
        assert!(overview.error.is_none());
    }

    #[tokio::test]
    async fn test_malformed_records_do_not_degrade_overview() {
        let mut server = mockito::Server::new_async().await;
        let _interactions = mock_usage(
            &mut server,
            "interactions",
            json!({"items": [{"period": "2025-09-08", "count": 30}, "junk", {"period": 7, "count": "70"}]}),
        )
        .await;
        let _users = mock_usage(&mut server, "unique_users", json!({"items": [{"count": null}]})).await;
        let _intents = mock_usage(
            &mut server,
            "top_intents",
            json!({"intents": [{"name": "billing", "count": 25}, {"name": null, "count": []}]}),
        )
        .await;
        let _transcripts = server
            .mock("POST", "/v1/transcript/project/p1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"transcripts": [
                    {"id": "t1", "sessionID": 42, "properties": [{"name": "duration", "value": 100}, 3]},
                    "not a transcript"
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        let dashboard = dashboard_for(&server, false).await;

        let outcome = dashboard.get_overview("p1", &window()).await;
        assert!(!outcome.is_degraded());

        let overview = outcome.into_metrics();
        assert_eq!(overview.metrics.total_interactions, 100);
        assert_eq!(overview.metrics.unique_users, 0);
        assert_eq!(overview.metrics.avg_session_duration, 100.0);
        assert!(overview.error.is_none());
    }

    #[tokio::test]
    async fn test_overview_falls_back_when_upstream_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        let dashboard = dashboard_for(&server, true).await;

        let outcome = dashboard.get_overview("p1", &window()).await;
        assert!(outcome.is_degraded());

        let overview = outcome.into_metrics();
        assert_eq!(overview.metrics.total_interactions, 0);
        assert_eq!(overview.metrics.avg_session_duration, 180.5);
        assert_eq!(overview.metrics.satisfaction_score, 4.2);
        assert!(overview.error.unwrap().contains("500"));

        // The fallback must not be served from cache.
        let key = cache_key("overview", "p1", Some(&window()), &[]);
        let cached: Result<serde_json::Value, ()> = dashboard
            .cache()
            .get_or_compute(&key, || async { Ok(json!("recomputed")) })
            .await;
        assert_eq!(cached, Ok(json!("recomputed")));
    }

    #[tokio::test]
    async fn test_overview_served_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let mocks = mock_healthy_upstream(&mut server).await;
        let dashboard = dashboard_for(&server, true).await;

        let first = dashboard.get_overview("p1", &window()).await.into_metrics();
        let same_window = TimeWindow::parse("2025-09-08T00:00:00Z", "2025-09-15T00:00").unwrap();
        let second = dashboard.get_overview("p1", &same_window).await.into_metrics();

        assert_eq!(first, second);
        for mock in mocks {
            // Exactly one call each: the second request was a cache hit.
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_comparison_changes() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_healthy_upstream(&mut server).await;
        let dashboard = dashboard_for(&server, false).await;

        let comparison = dashboard.get_comparison("p1", &window()).await;

        // Both windows see the same fixture, so nothing changed.
        assert_eq!(comparison.changes.len(), 5);
        assert!(comparison.changes.values().all(|change| *change == 0.0));
        assert_eq!(comparison.current, comparison.previous);
    }

    #[tokio::test]
    async fn test_comparison_queries_previous_window() {
        let mut server = mockito::Server::new_async().await;
        let previous = server
            .mock("POST", "/v2/query/usage")
            .match_body(Matcher::PartialJson(json!({"data": {
                "name": "interactions",
                "filter": {
                    "startTime": "2025-09-01T00:00:00.000Z",
                    "endTime": "2025-09-08T00:00:00.000Z"
                }
            }})))
            .with_status(200)
            .with_body(json!({"result": {"items": [{"period": "2025-09-01", "count": 100}]}}).to_string())
            .create_async()
            .await;
        let current = server
            .mock("POST", "/v2/query/usage")
            .match_body(Matcher::PartialJson(json!({"data": {
                "name": "interactions",
                "filter": {
                    "startTime": "2025-09-08T00:00:00.000Z",
                    "endTime": "2025-09-15T00:00:00.000Z"
                }
            }})))
            .with_status(200)
            .with_body(json!({"result": {"items": [{"period": "2025-09-08", "count": 150}]}}).to_string())
            .create_async()
            .await;
        let _users = mock_usage(&mut server, "unique_users", json!({"items": [{"count": 12}]})).await;
        let _intents = mock_usage(&mut server, "top_intents", json!({"intents": []})).await;
        let _transcripts = server
            .mock("POST", "/v1/transcript/project/p1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"transcripts": []}).to_string())
            .create_async()
            .await;
        let dashboard = dashboard_for(&server, false).await;

        let comparison = dashboard.get_comparison("p1", &window()).await;

        assert_eq!(comparison.current.metrics.total_interactions, 150);
        assert_eq!(comparison.previous.metrics.total_interactions, 100);
        assert_eq!(comparison.changes["total_interactions"], 50.0);
        assert_eq!(comparison.changes["unique_users"], 0.0);
        previous.assert_async().await;
        current.assert_async().await;
    }

    #[tokio::test]
    async fn test_peaks_rank_busiest_periods() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_healthy_upstream(&mut server).await;
        let dashboard = dashboard_for(&server, false).await;

        let peaks = dashboard.get_peaks("p1", &window(), 1).await.unwrap();

        assert_eq!(peaks.series.len(), 2);
        assert_eq!(peaks.top.len(), 1);
        assert_eq!(peaks.top[0].period, "2025-09-09");
        assert_eq!(peaks.top[0].share, 70.0);
    }

    #[tokio::test]
    async fn test_export_propagates_upstream_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;
        let dashboard = dashboard_for(&server, false).await;

        let err = dashboard
            .export("p1", &window(), ExportFormat::Csv)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}
