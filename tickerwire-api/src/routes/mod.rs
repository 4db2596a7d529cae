//! REST API Routes Module
//!
//! Route handlers organized by entity type, plus router assembly. The
//! `/api/v1` tree carries the full middleware stack (auth outermost, then
//! throttling, then response caching); health endpoints and the OpenAPI
//! document sit outside it.

pub mod article;
pub mod article_category;
pub mod category;
pub mod health;
pub mod role;
pub mod source;
pub mod stock_mention;
pub mod user;

use axum::{middleware::from_fn_with_state, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::middleware::{
    auth_middleware, http_cache_middleware, throttle_middleware, AuthState, HttpCacheState,
    ThrottleState,
};
use crate::state::AppState;

// Re-export route creation functions for convenience
pub use article::create_router as article_router;
pub use article_category::create_router as article_category_router;
pub use category::create_router as category_router;
pub use health::create_router as health_router;
pub use role::create_assignment_router as assignment_router;
pub use role::create_router as role_router;
pub use source::create_router as source_router;
pub use stock_mention::create_router as mention_router;
pub use user::create_router as user_router;

// ============================================================================
// SHARED TYPES
// ============================================================================

/// Acknowledgement returned by endpoints that queue background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TaskAck {
    /// Task kind, e.g. "ingest_source".
    pub task: String,
    /// Entity the task was queued for.
    pub entity_id: Uuid,
    /// Always "queued".
    pub status: String,
}

impl TaskAck {
    pub fn queued(task: &str, entity_id: Uuid) -> Self {
        Self {
            task: task.to_string(),
            entity_id,
            status: "queued".to_string(),
        }
    }
}

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
#[cfg(feature = "openapi")]
async fn openapi_json() -> impl axum::response::IntoResponse {
    use utoipa::OpenApi;
    axum::Json(crate::openapi::ApiDoc::openapi())
}

// ============================================================================
// ROUTER ASSEMBLY
// ============================================================================

/// Build the complete application router.
pub fn create_api_router(state: AppState) -> Router {
    let auth_state = AuthState::new(state.api_config.clone(), state.store.clone());
    let cache_state = HttpCacheState::new(state.cache.clone(), state.cache_config.clone());
    let throttle_state = ThrottleState::new(
        state.throttle_config.clone(),
        state.cache.clone(),
        state.cache_config.key_prefix.clone(),
    );

    let api_v1 = Router::new()
        .nest(
            "/sources",
            source_router(state.store.clone(), state.ingest.clone()),
        )
        .nest(
            "/articles",
            article_router(state.store.clone(), state.ml.clone()),
        )
        .nest("/stock-mentions", mention_router(state.store.clone()))
        .nest("/categories", category_router(state.store.clone()))
        .nest(
            "/article-categories",
            article_category_router(state.store.clone()),
        )
        .nest("/users", user_router(state.store.clone()))
        .nest("/roles", role_router(state.store.clone()))
        .nest("/role-assignments", assignment_router(state.store.clone()))
        // Innermost first: cache sees authenticated, throttle-passed
        // requests.
        .layer(from_fn_with_state(cache_state, http_cache_middleware))
        .layer(from_fn_with_state(throttle_state, throttle_middleware))
        .layer(from_fn_with_state(auth_state, auth_middleware));

    let router = Router::new()
        .nest(
            "/health",
            health_router(state.store.clone(), state.cache.clone()),
        )
        .nest("/api/v1", api_v1)
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http());

    #[cfg(feature = "openapi")]
    let router = router.route("/openapi.json", axum::routing::get(openapi_json));

    router
}

fn cors_layer(state: &AppState) -> CorsLayer {
    if state.api_config.cors_allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = state
            .api_config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tickerwire_storage::KeyValueCache;
    use tower::ServiceExt;

    fn app() -> Router {
        create_api_router(AppState::from_env())
    }

    #[tokio::test]
    async fn test_health_is_reachable_without_auth() {
        let response = app()
            .oneshot(Request::get("/health/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_v1_routes_are_mounted() {
        let response = app()
            .oneshot(Request::get("/api/v1/sources").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_end_to_end_create_then_cached_list() {
        let state = AppState::from_env();
        let cache = state.cache.clone();
        let app = create_api_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/sources")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"name": "Example", "url": "https://news.example"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let first = app
            .clone()
            .oneshot(Request::get("/api/v1/sources").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.headers()["x-cache"], "miss");

        let second = app
            .oneshot(Request::get("/api/v1/sources").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.headers()["x-cache"], "hit");

        // Keys carry the full mount path, which the background jobs match
        // when they sweep stale entries.
        let keys = cache.keys("tickerwire:GET:/api/v1/sources*").await;
        assert_eq!(keys.len(), 1);
    }

    #[cfg(feature = "openapi")]
    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let response = app()
            .oneshot(Request::get("/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(doc["paths"]["/api/v1/articles"].is_object());
    }
}
