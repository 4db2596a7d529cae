//! Article-Category Link Routes
//!
//! CRUD over the article/category join records carrying classifier
//! confidence. One link per (article, category) pair.

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

use tickerwire_storage::NewsStore;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// TYPES
// ============================================================================

/// Request body for linking an article to a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateLinkRequest {
    pub article_id: Uuid,
    pub category_id: Uuid,
    /// Classifier confidence in (0.0, 1.0].
    pub confidence: f32,
}

/// Request body for updating a link's confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateLinkRequest {
    pub confidence: f32,
}

/// Query parameters for listing links.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct LinkListQuery {
    pub article_id: Option<Uuid>,
}

fn check_confidence(confidence: f32) -> ApiResult<()> {
    if !(0.0..=1.0).contains(&confidence) || confidence == 0.0 {
        return Err(ApiError::validation_failed(
            "Field 'confidence' must be greater than 0.0 and at most 1.0",
        ));
    }
    Ok(())
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct LinkState {
    pub store: Arc<dyn NewsStore>,
}

impl LinkState {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self { store }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/article-categories - Link an article to a category
#[utoipa::path(
    post,
    path = "/api/v1/article-categories",
    tag = "ArticleCategories",
    request_body = CreateLinkRequest,
    responses(
        (status = 201, description = "Link created", body = tickerwire_core::entities::ArticleCategory),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Link already exists", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn create_link(
    State(state): State<Arc<LinkState>>,
    Json(request): Json<CreateLinkRequest>,
) -> ApiResult<impl IntoResponse> {
    check_confidence(request.confidence)?;
    let link = state
        .store
        .link_create(request.article_id, request.category_id, request.confidence)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// GET /api/v1/article-categories - List links
#[utoipa::path(
    get,
    path = "/api/v1/article-categories",
    tag = "ArticleCategories",
    params(LinkListQuery),
    responses(
        (status = 200, description = "Links, highest confidence first", body = Vec<tickerwire_core::entities::ArticleCategory>),
    ),
    security(("api_key" = [])),
)]
pub async fn list_links(
    State(state): State<Arc<LinkState>>,
    Query(query): Query<LinkListQuery>,
) -> ApiResult<impl IntoResponse> {
    let links = state.store.link_list(query.article_id).await?;
    Ok(Json(links))
}

/// GET /api/v1/article-categories/:id - Get a link
#[utoipa::path(
    get,
    path = "/api/v1/article-categories/{id}",
    tag = "ArticleCategories",
    params(("id" = Uuid, Path, description = "Link ID")),
    responses(
        (status = 200, description = "Link", body = tickerwire_core::entities::ArticleCategory),
        (status = 404, description = "Link not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn get_link(
    State(state): State<Arc<LinkState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let link = state.store.link_get(id).await?;
    Ok(Json(link))
}

/// PUT /api/v1/article-categories/:id - Update a link's confidence
#[utoipa::path(
    put,
    path = "/api/v1/article-categories/{id}",
    tag = "ArticleCategories",
    params(("id" = Uuid, Path, description = "Link ID")),
    request_body = UpdateLinkRequest,
    responses(
        (status = 200, description = "Updated link", body = tickerwire_core::entities::ArticleCategory),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Link not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn update_link(
    State(state): State<Arc<LinkState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLinkRequest>,
) -> ApiResult<impl IntoResponse> {
    check_confidence(request.confidence)?;
    let link = state.store.link_update(id, request.confidence).await?;
    Ok(Json(link))
}

/// DELETE /api/v1/article-categories/:id - Delete a link
#[utoipa::path(
    delete,
    path = "/api/v1/article-categories/{id}",
    tag = "ArticleCategories",
    params(("id" = Uuid, Path, description = "Link ID")),
    responses(
        (status = 204, description = "Link deleted"),
        (status = 404, description = "Link not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn delete_link(
    State(state): State<Arc<LinkState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.link_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(store: Arc<dyn NewsStore>) -> Router {
    let state = Arc::new(LinkState::new(store));

    Router::new()
        .route("/", post(create_link).get(list_links))
        .route("/:id", get(get_link).put(update_link).delete(delete_link))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use tickerwire_core::entities::ArticleCategory;
    use tickerwire_storage::{MemoryStore, NewArticle, NewCategory, NewSource};
    use tower::ServiceExt;

    async fn app() -> (Router, Arc<MemoryStore>, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let source = store
            .source_create(NewSource {
                name: "Example".into(),
                url: "https://news.example".into(),
                description: None,
                active: true,
            })
            .await
            .unwrap();
        let article = store
            .article_create(NewArticle {
                source_id: source.source_id,
                title: "Story".into(),
                content: "body".into(),
                url: "https://news.example/story".into(),
                author: None,
                published_at: Utc::now(),
            })
            .await
            .unwrap();
        let category = store
            .category_create(NewCategory {
                name: "Earnings".into(),
                description: None,
            })
            .await
            .unwrap();
        (
            create_router(store.clone()),
            store,
            article.article_id,
            category.category_id,
        )
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
    async fn test_create_link() {
        let (app, _, article_id, category_id) = app().await;
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({
                    "article_id": article_id,
                    "category_id": category_id,
                    "confidence": 0.9,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let link: ArticleCategory = body_json(response).await;
        assert_eq!(link.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_create_link_zero_confidence_is_400() {
        let (app, _, article_id, category_id) = app().await;
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({
                    "article_id": article_id,
                    "category_id": category_id,
                    "confidence": 0.0,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_pair_is_409() {
        let (app, _, article_id, category_id) = app().await;
        let payload = serde_json::json!({
            "article_id": article_id,
            "category_id": category_id,
            "confidence": 0.5,
        });
        app.clone()
            .oneshot(post_json("/", payload.clone()))
            .await
            .unwrap();
        let response = app.oneshot(post_json("/", payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_list_links_for_article_ordered_by_confidence() {
        let (app, store, article_id, category_id) = app().await;
        let other = store
            .category_create(NewCategory {
                name: "Markets".into(),
                description: None,
            })
            .await
            .unwrap();
        store
            .link_create(article_id, category_id, 0.4)
            .await
            .unwrap();
        store
            .link_create(article_id, other.category_id, 0.8)
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::get(format!("/?article_id={}", article_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let links: Vec<ArticleCategory> = body_json(response).await;
        assert_eq!(links.len(), 2);
        assert!(links[0].confidence >= links[1].confidence);
    }

    #[tokio::test]
    async fn test_update_link_confidence() {
        let (app, store, article_id, category_id) = app().await;
        let link = store
            .link_create(article_id, category_id, 0.4)
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::put(format!("/{}", link.link_id))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({"confidence": 0.95}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let updated: ArticleCategory = body_json(response).await;
        assert_eq!(updated.confidence, 0.95);
    }
}
