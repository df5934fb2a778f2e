//! Helpdesk Dashboard API server.
//!
//! # API Endpoints
//!
//! - `POST /api/analytics/overview` - Overview KPIs for a window
//! - `POST /api/analytics/compare` - Current vs previous window
//! - `GET /api/analytics/transcripts` - Processed transcript listing
//! - `GET /api/analytics/transcripts/:id/messages` - Chat messages of a transcript
//! - `GET /api/analytics/intents` - Intent ranking
//! - `GET /api/analytics/peaks` - Busiest periods
//! - `POST /api/export` - CSV or PDF report
//! - `DELETE /api/cache` - Cache invalidation
//! - `GET /health` - Health check

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use helpdesk_dashboard::api::{AppState, router};
use helpdesk_dashboard::cache::{CacheService, SqliteCacheBackend};
use helpdesk_dashboard::config::Config;
use helpdesk_dashboard::dashboard::Dashboard;
use helpdesk_dashboard::upstream::AnalyticsClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("helpdesk_dashboard=info".parse()?))
        .init();

    let config = Config::from_env();
    info!(
        port = config.port,
        api_url = %config.api_url,
        cache = config.cache_url.is_some(),
        "Starting Helpdesk Dashboard server"
    );

    let client = AnalyticsClient::with_base_url(&config.api_url, &config.api_key)?;

    // A cache that cannot be opened only costs latency, so the server still starts.
    let cache = match config.cache_url.as_deref() {
        Some(url) => match SqliteCacheBackend::connect(url).await {
            Ok(backend) => {
                info!(ttl_secs = config.cache_ttl.as_secs(), "Cache initialized");
                CacheService::new(Arc::new(backend), config.cache_ttl)
            }
            Err(e) => {
                warn!(error = %e, "Cache unavailable; continuing without caching");
                CacheService::disabled()
            }
        },
        None => {
            info!("No cache configured");
            CacheService::disabled()
        }
    };

    let state = AppState {
        dashboard: Dashboard::new(client, cache),
    };

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let app = router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Helpdesk Dashboard is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
