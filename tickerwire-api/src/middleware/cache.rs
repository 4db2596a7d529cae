//! HTTP Response Cache Middleware
//!
//! GET responses with status 200 are cached under a key built from the
//! method, path, sorted query string, and requesting identity. Successful
//! write methods (200, 201, 204) invalidate every cached GET whose key
//! starts with the same collection path, across all users and query
//! variants.
//!
//! Cache failures are invisible to clients: a degraded backend only costs
//! the caching.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{OriginalUri, Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use tickerwire_core::config::CacheConfig;
use tickerwire_storage::{response_cache_key, KeyValueCache};

use super::auth::AuthContext;

/// Largest response body the cache will buffer, 4 MiB.
const MAX_CACHED_BODY: usize = 4 * 1024 * 1024;

/// Serialized form of a cached response.
#[derive(Debug, Serialize, Deserialize)]
struct CachedResponse {
    status: u16,
    body: String,
}

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

#[derive(Clone)]
pub struct HttpCacheState {
    pub cache: Arc<dyn KeyValueCache>,
    pub config: CacheConfig,
}

impl HttpCacheState {
    pub fn new(cache: Arc<dyn KeyValueCache>, config: CacheConfig) -> Self {
        Self { cache, config }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

pub async fn http_cache_middleware(
    State(state): State<HttpCacheState>,
    request: Request,
    next: Next,
) -> Response {
    match *request.method() {
        Method::GET => serve_cached(state, request, next).await,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE => {
            let path = effective_uri(&request).path().to_string();
            let response = next.run(request).await;
            if matches!(response.status().as_u16(), 200 | 201 | 204) {
                invalidate_collection(&state, &path).await;
            }
            response
        }
        _ => next.run(request).await,
    }
}

/// Nested routers see the request with the mount prefix stripped; cache
/// keys are built from the original URI so they stay stable no matter
/// where the middleware sits.
fn effective_uri(request: &Request) -> Uri {
    request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone())
}

/// Sources and categories change rarely and cache with the long timeout.
fn ttl_for_path(config: &CacheConfig, path: &str) -> Duration {
    let long_lived = path
        .split('/')
        .filter(|s| !s.is_empty())
        .take(3)
        .any(|segment| segment == "sources" || segment == "categories");
    if long_lived {
        config.long_timeout
    } else {
        config.default_timeout
    }
}

async fn serve_cached(state: HttpCacheState, request: Request, next: Next) -> Response {
    let identity = request
        .extensions()
        .get::<AuthContext>()
        .and_then(|ctx| ctx.user_id);
    let uri = effective_uri(&request);
    let key = response_cache_key(
        &state.config.key_prefix,
        request.method().as_str(),
        uri.path(),
        uri.query(),
        identity,
    );

    if let Some(raw) = state.cache.get(&key).await {
        if let Ok(cached) = serde_json::from_str::<CachedResponse>(&raw) {
            return rebuild(cached, "hit");
        }
        // Unreadable entry: fall through and let the handler refill it.
        tracing::warn!(key = %key, "Discarding undecodable cache entry");
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Response too large to cache");
            return Response::from_parts(parts, Body::empty());
        }
    };

    if let Ok(body_text) = std::str::from_utf8(&bytes) {
        let entry = CachedResponse {
            status: parts.status.as_u16(),
            body: body_text.to_string(),
        };
        if let Ok(serialized) = serde_json::to_string(&entry) {
            let ttl = ttl_for_path(&state.config, uri.path());
            state.cache.set(&key, serialized, ttl).await;
        }
    }

    let mut response = Response::from_parts(parts, Body::from(bytes));
    response
        .headers_mut()
        .insert("x-cache", HeaderValue::from_static("miss"));
    response
}

fn rebuild(cached: CachedResponse, verdict: &'static str) -> Response {
    let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK);
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
        .headers_mut()
        .insert("x-cache", HeaderValue::from_static(verdict));
    response
}

/// Drop every cached GET under the collection the written path belongs to.
///
/// `/api/v1/articles/{id}/process` invalidates `GET /api/v1/articles*` for
/// every user and query-string variant.
async fn invalidate_collection(state: &HttpCacheState, path: &str) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).take(3).collect();
    if segments.is_empty() {
        return;
    }
    let pattern = format!(
        "{}:GET:/{}*",
        state.config.key_prefix,
        segments.join("/")
    );

    let keys = state.cache.keys(&pattern).await;
    if keys.is_empty() {
        return;
    }
    let removed = state.cache.delete_many(&keys).await;
    tracing::debug!(pattern = %pattern, removed, "Invalidated cached responses");
}
