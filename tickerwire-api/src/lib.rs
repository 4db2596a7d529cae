//! Tickerwire API - REST API Layer
//!
//! This crate provides the HTTP layer for the Tickerwire news aggregation
//! backend: Axum route handlers for sources, articles, stock mentions,
//! categories, users, and roles, plus the middleware stack (API key auth,
//! sliding-window throttling, response caching) and the background job
//! scheduler that keeps the article corpus fresh.
//!
//! Storage and caching go through the trait seams in tickerwire-storage;
//! article enrichment goes through the [`providers::MlProvider`] seam.

pub mod config;
pub mod error;
pub mod ingest;
pub mod jobs;
pub mod middleware;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod providers;
pub mod routes;
pub mod state;

// Re-export commonly used types
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use ingest::{IngestReport, IngestService};
pub use jobs::{background_jobs_task, JobDeps, JobMetrics, JobMetricsSnapshot};
pub use middleware::{
    auth_middleware, http_cache_middleware, throttle_middleware, AuthContext, AuthState,
    HttpCacheState, ThrottleState,
};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use providers::{LexiconAnalyzer, MlProvider};
pub use routes::{create_api_router, TaskAck};
pub use state::AppState;
