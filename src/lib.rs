//! Helpdesk Dashboard - an aggregation and caching layer over a
//! conversational-analytics API.
//!
//! # Overview
//!
//! The service answers dashboard-oriented questions (overview KPIs, period
//! comparisons, transcript listings, intent rankings, report exports) by
//! calling the upstream analytics API, deriving metrics from the raw records
//! and caching the results.
//!
//! The upstream is the source of truth. This layer owns no data of its own:
//! everything it returns is either a passthrough or derived on demand.
//!
//! # Modules
//!
//! - [`upstream`]: Upstream HTTP client, response shapes and pagination
//! - [`window`]: Time window parsing and canonical timestamps
//! - [`metrics`]: Pure derivation of KPIs from raw records
//! - [`cache`]: Best-effort cache-aside layer with an SQLite backend
//! - [`dashboard`]: Orchestration of the above per dashboard operation
//! - [`export`]: CSV and PDF report rendering
//! - [`api`]: HTTP API handlers
//! - [`config`]: Environment configuration

pub mod api;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod metrics;
pub mod model;
pub mod upstream;
pub mod window;
