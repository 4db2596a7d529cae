//! Sliding-Window Throttle Middleware
//!
//! Each request is charged against a scope (named scopes for the expensive
//! ingest/process actions, "default" for everything else) and an identity
//! (user id or "anonymous"). Request timestamps are kept per bucket; a
//! request is rejected with 429 and a Retry-After header once the window
//! holds the full quota. Buckets idle past the longest configured window
//! are swept periodically so one-off callers do not accumulate.
//!
//! The resolved rate for a scope is memoized in the cache backend, so a
//! fleet of API pods sharing a cache converges on one rate per scope.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use tickerwire_core::config::{RateSpec, ThrottleConfig};
use tickerwire_storage::{rate_limit_key, KeyValueCache};

use super::auth::AuthContext;
use crate::error::ApiError;

/// How long a memoized rate lives in the cache backend.
const RATE_MEMO_TTL: Duration = Duration::from_secs(3600);

/// Idle history buckets are swept once per this many requests.
const EVICT_EVERY: u64 = 1024;

/// Scope charged for triggering a source ingestion.
pub const SCOPE_INGESTION: &str = "news_ingestion";
/// Scope charged for triggering article processing.
pub const SCOPE_PROCESSING: &str = "article_processing";
/// Scope charged for everything else.
pub const SCOPE_DEFAULT: &str = "default";

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

#[derive(Clone)]
pub struct ThrottleState {
    config: Arc<ThrottleConfig>,
    cache: Arc<dyn KeyValueCache>,
    key_prefix: String,
    history: Arc<DashMap<String, VecDeque<Instant>>>,
    requests_seen: Arc<AtomicU64>,
}

impl ThrottleState {
    pub fn new(
        config: Arc<ThrottleConfig>,
        cache: Arc<dyn KeyValueCache>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            config,
            cache,
            key_prefix: key_prefix.into(),
            history: Arc::new(DashMap::new()),
            requests_seen: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Drop history buckets whose newest entry has aged out of every
    /// configured window. Without this, one-off anonymous callers leave
    /// empty buckets behind forever.
    pub fn evict_idle_buckets(&self) {
        let horizon = self
            .config
            .rates
            .values()
            .map(|rate| rate.period)
            .fold(self.config.default_rate.period, Duration::max);
        let now = Instant::now();
        self.history.retain(|_, window| {
            window
                .back()
                .is_some_and(|last| now.duration_since(*last) < horizon)
        });
    }

    /// Rate for a scope, read through the cache memo.
    async fn resolve_rate(&self, scope: &str) -> RateSpec {
        let key = rate_limit_key(&self.key_prefix, scope);
        if let Some(raw) = self.cache.get(&key).await {
            if let Ok(rate) = raw.parse::<RateSpec>() {
                return rate;
            }
        }
        let rate = self.config.rate_for(scope);
        self.cache.set(&key, rate.to_string(), RATE_MEMO_TTL).await;
        rate
    }
}

/// Identity a request is charged against: the resolved user id when one is
/// present, else the first hop in `X-Forwarded-For`, else the peer address.
fn client_identity(context: &AuthContext, request: &Request) -> String {
    if let Some(id) = context.user_id {
        return id.to_string();
    }
    if let Some(ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }
    request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Scope a request path maps to.
pub fn scope_for_path(path: &str) -> &'static str {
    let path = path.trim_end_matches('/');
    if path.ends_with("/ingest") {
        SCOPE_INGESTION
    } else if path.ends_with("/process") {
        SCOPE_PROCESSING
    } else {
        SCOPE_DEFAULT
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

pub async fn throttle_middleware(
    State(state): State<ThrottleState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.enabled {
        return next.run(request).await;
    }

    let context = request
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .unwrap_or_default();
    if context.is_staff {
        return next.run(request).await;
    }

    let scope = scope_for_path(request.uri().path());
    let rate = state.resolve_rate(scope).await;

    let identity = client_identity(&context, &request);
    let bucket = format!("{scope}:{identity}");

    let now = Instant::now();
    let mut window = state.history.entry(bucket).or_default();
    while window
        .front()
        .is_some_and(|t| now.duration_since(*t) >= rate.period)
    {
        window.pop_front();
    }

    if window.len() >= rate.quota as usize {
        let oldest = window.front().copied().unwrap_or(now);
        let in_window = window.len();
        drop(window);

        let remaining = rate.period.saturating_sub(now.duration_since(oldest));
        // Remaining window spread evenly over the requests already in it.
        let wait = remaining.as_secs_f64() / in_window.max(1) as f64;
        let wait_secs = wait.ceil() as u64;

        tracing::debug!(scope, wait_secs, "Request throttled");
        let mut response = ApiError::too_many_requests(Some(wait_secs)).into_response();
        response
            .headers_mut()
            .insert("retry-after", HeaderValue::from(wait_secs));
        return response;
    }

    window.push_back(now);
    drop(window);

    if state.requests_seen.fetch_add(1, Ordering::Relaxed) % EVICT_EVERY == EVICT_EVERY - 1 {
        state.evict_idle_buckets();
    }

    next.run(request).await
}
