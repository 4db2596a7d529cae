//! News Source Routes
//!
//! CRUD for news sources plus the ingestion trigger. Triggering returns
//! 202 immediately; the crawl runs on a spawned task.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use tickerwire_core::validate::{validate_source_data, validate_url, SourceInput};
use tickerwire_storage::{NewSource, NewsStore, SourceUpdate};

use crate::error::{ApiError, ApiResult};
use crate::ingest::IngestService;
use crate::routes::TaskAck;

// ============================================================================
// TYPES
// ============================================================================

/// Request body for creating a news source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateSourceRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to true.
    #[serde(default)]
    pub active: Option<bool>,
}

/// Request body for updating a news source. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateSourceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Query parameters for listing sources.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct SourceListQuery {
    /// Restrict to active (true) or inactive (false) sources.
    pub active: Option<bool>,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct SourceState {
    pub store: Arc<dyn NewsStore>,
    pub ingest: Arc<IngestService>,
}

impl SourceState {
    pub fn new(store: Arc<dyn NewsStore>, ingest: Arc<IngestService>) -> Self {
        Self { store, ingest }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/sources - Create a news source
#[utoipa::path(
    post,
    path = "/api/v1/sources",
    tag = "Sources",
    request_body = CreateSourceRequest,
    responses(
        (status = 201, description = "Source created", body = tickerwire_core::entities::NewsSource),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Source URL already exists", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn create_source(
    State(state): State<Arc<SourceState>>,
    Json(request): Json<CreateSourceRequest>,
) -> ApiResult<impl IntoResponse> {
    let validated = validate_source_data(&SourceInput {
        name: request.name,
        url: request.url,
        description: request.description,
        active: request.active,
    })?;

    let source = state
        .store
        .source_create(NewSource {
            name: validated.name,
            url: validated.url,
            description: validated.description,
            active: validated.active,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(source)))
}

/// GET /api/v1/sources - List news sources
#[utoipa::path(
    get,
    path = "/api/v1/sources",
    tag = "Sources",
    params(SourceListQuery),
    responses(
        (status = 200, description = "Sources", body = Vec<tickerwire_core::entities::NewsSource>),
    ),
    security(("api_key" = [])),
)]
pub async fn list_sources(
    State(state): State<Arc<SourceState>>,
    Query(query): Query<SourceListQuery>,
) -> ApiResult<impl IntoResponse> {
    let sources = state.store.source_list(query.active).await?;
    Ok(Json(sources))
}

/// GET /api/v1/sources/:id - Get a news source
#[utoipa::path(
    get,
    path = "/api/v1/sources/{id}",
    tag = "Sources",
    params(("id" = Uuid, Path, description = "Source ID")),
    responses(
        (status = 200, description = "Source", body = tickerwire_core::entities::NewsSource),
        (status = 404, description = "Source not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn get_source(
    State(state): State<Arc<SourceState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let source = state.store.source_get(id).await?;
    Ok(Json(source))
}

/// PUT /api/v1/sources/:id - Update a news source
#[utoipa::path(
    put,
    path = "/api/v1/sources/{id}",
    tag = "Sources",
    params(("id" = Uuid, Path, description = "Source ID")),
    request_body = UpdateSourceRequest,
    responses(
        (status = 200, description = "Updated source", body = tickerwire_core::entities::NewsSource),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Source not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn update_source(
    State(state): State<Arc<SourceState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSourceRequest>,
) -> ApiResult<impl IntoResponse> {
    let url = match request.url {
        Some(url) => Some(validate_url(&url)?),
        None => None,
    };
    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return Err(ApiError::missing_field("name"));
        }
    }

    let update = SourceUpdate {
        name: request.name,
        url,
        description: request.description,
        active: request.active,
    };
    if update.is_empty() {
        return Err(ApiError::invalid_input("No fields to update"));
    }

    let source = state.store.source_update(id, update).await?;
    Ok(Json(source))
}

/// DELETE /api/v1/sources/:id - Delete a news source
#[utoipa::path(
    delete,
    path = "/api/v1/sources/{id}",
    tag = "Sources",
    params(("id" = Uuid, Path, description = "Source ID")),
    responses(
        (status = 204, description = "Source deleted"),
        (status = 404, description = "Source not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn delete_source(
    State(state): State<Arc<SourceState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.source_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sources/:id/ingest - Trigger ingestion for a source
#[utoipa::path(
    post,
    path = "/api/v1/sources/{id}/ingest",
    tag = "Sources",
    params(("id" = Uuid, Path, description = "Source ID")),
    responses(
        (status = 202, description = "Ingestion queued", body = TaskAck),
        (status = 404, description = "Source not found", body = ApiError),
        (status = 409, description = "Source is inactive", body = ApiError),
        (status = 429, description = "Rate limit exceeded", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn trigger_ingest(
    State(state): State<Arc<SourceState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let source = state.store.source_get(id).await?;
    if !source.active {
        return Err(ApiError::state_conflict("Source is inactive"));
    }

    let ingest = state.ingest.clone();
    tokio::spawn(async move {
        if let Err(e) = ingest.ingest_source(&source).await {
            tracing::error!(source_id = %source.source_id, error = %e, "Queued ingestion failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TaskAck::queued("ingest_source", id)),
    ))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(store: Arc<dyn NewsStore>, ingest: Arc<IngestService>) -> Router {
    let state = Arc::new(SourceState::new(store, ingest));

    Router::new()
        .route("/", post(create_source).get(list_sources))
        .route(
            "/:id",
            get(get_source).put(update_source).delete(delete_source),
        )
        .route("/:id/ingest", post(trigger_ingest))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tickerwire_core::config::IngestConfig;
    use tickerwire_core::entities::NewsSource;
    use tickerwire_storage::MemoryStore;
    use tower::ServiceExt;

    use crate::ingest::HttpFetcher;

    fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ingest = Arc::new(IngestService::new(
            store.clone(),
            Arc::new(HttpFetcher::default()),
            IngestConfig::default(),
        ));
        (create_router(store.clone(), ingest), store)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_source_returns_201() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({"name": "Example", "url": "https://news.example"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let source: NewsSource = body_json(response).await;
        assert_eq!(source.name, "Example");
        assert!(source.active);
    }

    #[tokio::test]
    async fn test_create_source_rejects_bad_url() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({"name": "Example", "url": "not a url"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_sources_filters_by_active() {
        let (app, store) = app();
        store
            .source_create(NewSource {
                name: "Active".into(),
                url: "https://a.example".into(),
                description: None,
                active: true,
            })
            .await
            .unwrap();
        store
            .source_create(NewSource {
                name: "Dormant".into(),
                url: "https://b.example".into(),
                description: None,
                active: false,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/?active=true").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let sources: Vec<NewsSource> = body_json(response).await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Active");
    }

    #[tokio::test]
    async fn test_get_missing_source_is_404() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::get(format!("/{}", Uuid::now_v7()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_source_empty_body_is_400() {
        let (app, store) = app();
        let source = store
            .source_create(NewSource {
                name: "Example".into(),
                url: "https://a.example".into(),
                description: None,
                active: true,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::put(format!("/{}", source.source_id))
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_source_returns_204() {
        let (app, store) = app();
        let source = store
            .source_create(NewSource {
                name: "Example".into(),
                url: "https://a.example".into(),
                description: None,
                active: true,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::delete(format!("/{}", source.source_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.source_get(source.source_id).await.is_err());
    }

    #[tokio::test]
    async fn test_trigger_ingest_inactive_source_is_409() {
        let (app, store) = app();
        let source = store
            .source_create(NewSource {
                name: "Dormant".into(),
                url: "https://a.example".into(),
                description: None,
                active: false,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::post(format!("/{}/ingest", source.source_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_trigger_ingest_returns_202_ack() {
        let (app, store) = app();
        let source = store
            .source_create(NewSource {
                name: "Example".into(),
                url: "https://a.example".into(),
                description: None,
                active: true,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::post(format!("/{}/ingest", source.source_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let ack: TaskAck = body_json(response).await;
        assert_eq!(ack.task, "ingest_source");
        assert_eq!(ack.status, "queued");
    }
}
