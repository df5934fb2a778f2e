//! HTTP API handlers for the helpdesk dashboard.
//!
//! Status mapping:
//!
//! - Malformed windows and unsupported export formats are `400 Bad Request`.
//! - Upstream failures are `500 Internal Server Error`, except for the overview
//!   and compare endpoints which always answer with a (possibly fallback) body.
//!
//! The API key is never logged.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::dashboard::Dashboard;
use crate::error::{UpstreamError, ValidationError};
use crate::export::ExportFormat;
use crate::model::{
    ComparisonResult, ExportRequest, InvalidateQuery, OverviewMetrics, PeaksQuery, PeaksReport,
    TranscriptSummary, TranscriptsQuery, WindowQuery, WindowRequest,
};
use crate::upstream::{ChatMessage, IntentRecord, TranscriptSlice};
use crate::window::TimeWindow;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Dashboard,
}

/// All routes, without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/analytics/overview", post(post_overview))
        .route("/api/analytics/compare", post(post_compare))
        .route("/api/analytics/transcripts", get(get_transcripts))
        .route(
            "/api/analytics/transcripts/:transcript_id/messages",
            get(get_transcript_messages),
        )
        .route("/api/analytics/intents", get(get_intents))
        .route("/api/analytics/peaks", get(get_peaks))
        .route("/api/export", post(post_export))
        .route("/api/cache", delete(delete_cache))
        .with_state(state)
}

fn parse_window(start: &str, end: &str) -> Result<TimeWindow, StatusCode> {
    TimeWindow::parse(start, end).map_err(|e| reject(&e))
}

fn reject(e: &ValidationError) -> StatusCode {
    warn!(error = %e, "Rejected request");
    StatusCode::BAD_REQUEST
}

fn upstream_failure(operation: &str, e: &UpstreamError) -> StatusCode {
    warn!(operation, error = %e, upstream_status = ?e.status(), "Upstream request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

/// POST /api/analytics/overview - KPIs, charts and distributions for a window.
///
/// # Request Body
///
/// ```json
/// {
///     "project_id": "abc123",
///     "start": "2025-09-01",
///     "end": "2025-09-08"
/// }
/// ```
///
/// When the upstream is unavailable the body is the fallback snapshot with an
/// `error` field; the status is still `200 OK`.
#[instrument(skip(state, request), fields(project_id = %request.project_id))]
pub async fn post_overview(
    State(state): State<AppState>,
    Json(request): Json<WindowRequest>,
) -> Result<Json<OverviewMetrics>, StatusCode> {
    let window = parse_window(&request.start, &request.end)?;

    let outcome = state.dashboard.get_overview(&request.project_id, &window).await;
    info!(degraded = outcome.is_degraded(), "Overview queried");

    Ok(Json(outcome.into_metrics()))
}

/// POST /api/analytics/compare - Current window against the previous one.
///
/// # Response
///
/// ```json
/// {
///     "current": { "metrics": { ... }, ... },
///     "previous": { "metrics": { ... }, ... },
///     "changes": { "total_interactions": 12.5, ... }
/// }
/// ```
#[instrument(skip(state, request), fields(project_id = %request.project_id))]
pub async fn post_compare(
    State(state): State<AppState>,
    Json(request): Json<WindowRequest>,
) -> Result<Json<ComparisonResult>, StatusCode> {
    let window = parse_window(&request.start, &request.end)?;

    let comparison = state.dashboard.get_comparison(&request.project_id, &window).await;
    info!(
        current_degraded = comparison.current.error.is_some(),
        previous_degraded = comparison.previous.error.is_some(),
        "Comparison queried"
    );

    Ok(Json(comparison))
}

/// GET /api/analytics/transcripts - A page of processed transcripts.
///
/// # Query Parameters
///
/// - `project_id` (required)
/// - `start`, `end` (optional, together): window filter
/// - `limit` (optional): page size (default: 100)
/// - `skip` (optional): offset (default: 0)
/// - `order` (optional): `ASC` or `DESC` (default: `DESC`)
#[instrument(skip(state))]
pub async fn get_transcripts(
    State(state): State<AppState>,
    Query(query): Query<TranscriptsQuery>,
) -> Result<Json<Vec<TranscriptSummary>>, StatusCode> {
    let window = TimeWindow::parse_optional(query.start.as_deref(), query.end.as_deref())
        .map_err(|e| reject(&e))?;
    let slice = TranscriptSlice {
        take: query.limit,
        skip: query.skip,
        order: query.order,
    };

    match state
        .dashboard
        .get_transcripts(&query.project_id, window.as_ref(), slice)
        .await
    {
        Ok(transcripts) => {
            info!(count = transcripts.len(), "Transcripts queried");
            Ok(Json(transcripts))
        }
        Err(e) => Err(upstream_failure("transcripts", &e)),
    }
}

/// GET /api/analytics/transcripts/:transcript_id/messages - Chat messages of a transcript.
#[instrument(skip(state))]
pub async fn get_transcript_messages(
    State(state): State<AppState>,
    Path(transcript_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    match state.dashboard.get_transcript_messages(&transcript_id).await {
        Ok(messages) => {
            info!(count = messages.len(), "Transcript messages queried");
            Ok(Json(messages))
        }
        Err(e) => Err(upstream_failure("transcript_messages", &e)),
    }
}

/// GET /api/analytics/intents - Upstream intent ranking for a window.
#[instrument(skip(state))]
pub async fn get_intents(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<IntentRecord>>, StatusCode> {
    let window = parse_window(&query.start, &query.end)?;

    match state.dashboard.get_top_intents(&query.project_id, &window).await {
        Ok(intents) => {
            info!(count = intents.len(), "Intents queried");
            Ok(Json(intents))
        }
        Err(e) => Err(upstream_failure("intents", &e)),
    }
}

/// GET /api/analytics/peaks - Busiest periods of the interactions series.
///
/// # Query Parameters
///
/// - `project_id`, `start`, `end` (required)
/// - `limit` (optional): number of periods (default: 5)
#[instrument(skip(state))]
pub async fn get_peaks(
    State(state): State<AppState>,
    Query(query): Query<PeaksQuery>,
) -> Result<Json<PeaksReport>, StatusCode> {
    let window = parse_window(&query.start, &query.end)?;

    match state
        .dashboard
        .get_peaks(&query.project_id, &window, query.limit)
        .await
    {
        Ok(report) => {
            info!(points = report.series.len(), "Peaks queried");
            Ok(Json(report))
        }
        Err(e) => Err(upstream_failure("peaks", &e)),
    }
}

/// POST /api/export - Download the overview KPIs as CSV or PDF.
///
/// # Request Body
///
/// ```json
/// {
///     "project_id": "abc123",
///     "start": "2025-09-01",
///     "end": "2025-09-08",
///     "format": "csv"
/// }
/// ```
#[instrument(skip(state, request), fields(project_id = %request.project_id, format = %request.format))]
pub async fn post_export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, StatusCode> {
    let format: ExportFormat = request.format.parse().map_err(|e| reject(&e))?;
    let window = parse_window(&request.start, &request.end)?;

    match state
        .dashboard
        .export(&request.project_id, &window, format)
        .await
    {
        Ok(document) => {
            info!(bytes = document.bytes.len(), "Report exported");
            let disposition = format!("attachment; filename={}", format.file_name());
            Ok((
                [
                    (header::CONTENT_TYPE, format.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                document.bytes,
            )
                .into_response())
        }
        Err(e) => Err(upstream_failure("export", &e)),
    }
}

/// DELETE /api/cache?pattern=... - Drop cached entries matching a glob.
///
/// # Response
///
/// ```json
/// { "deleted": 3 }
/// ```
#[instrument(skip(state))]
pub async fn delete_cache(
    State(state): State<AppState>,
    Query(query): Query<InvalidateQuery>,
) -> Json<Value> {
    let deleted = state.dashboard.invalidate(&query.pattern).await;
    Json(json!({ "deleted": deleted }))
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// GET / - Service banner.
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "AI Helpdesk Dashboard API" }))
}
