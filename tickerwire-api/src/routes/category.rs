//! Category Routes
//!
//! CRUD over news categories. Names are unique; the processing pipeline
//! creates categories on first sight, so manual creation mostly covers
//! curated taxonomies.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use tickerwire_core::validate::{clean_text, validate_category_data, CategoryInput};
use tickerwire_storage::{CategoryUpdate, NewCategory, NewsStore};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// TYPES
// ============================================================================

/// Request body for creating a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for updating a category. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct CategoryState {
    pub store: Arc<dyn NewsStore>,
}

impl CategoryState {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self { store }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/categories - Create a category
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "Categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = tickerwire_core::entities::NewsCategory),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Category name already exists", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn create_category(
    State(state): State<Arc<CategoryState>>,
    Json(request): Json<CreateCategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let validated = validate_category_data(&CategoryInput {
        name: request.name,
        description: request.description,
    })?;

    let category = state
        .store
        .category_create(NewCategory {
            name: validated.name,
            description: validated.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /api/v1/categories - List categories
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "Categories",
    responses(
        (status = 200, description = "Categories", body = Vec<tickerwire_core::entities::NewsCategory>),
    ),
    security(("api_key" = [])),
)]
pub async fn list_categories(
    State(state): State<Arc<CategoryState>>,
) -> ApiResult<impl IntoResponse> {
    let categories = state.store.category_list().await?;
    Ok(Json(categories))
}

/// GET /api/v1/categories/:id - Get a category
#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = tickerwire_core::entities::NewsCategory),
        (status = 404, description = "Category not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn get_category(
    State(state): State<Arc<CategoryState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let category = state.store.category_get(id).await?;
    Ok(Json(category))
}

/// PUT /api/v1/categories/:id - Update a category
#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated category", body = tickerwire_core::entities::NewsCategory),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Category not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn update_category(
    State(state): State<Arc<CategoryState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = match request.name {
        Some(raw) => {
            let name = clean_text(&raw);
            if name.is_empty() {
                return Err(ApiError::missing_field("name"));
            }
            Some(name)
        }
        None => None,
    };

    let update = CategoryUpdate {
        name,
        description: request.description,
    };
    if update.is_empty() {
        return Err(ApiError::invalid_input("No fields to update"));
    }

    let category = state.store.category_update(id, update).await?;
    Ok(Json(category))
}

/// DELETE /api/v1/categories/:id - Delete a category
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    tag = "Categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn delete_category(
    State(state): State<Arc<CategoryState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.category_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(store: Arc<dyn NewsStore>) -> Router {
    let state = Arc::new(CategoryState::new(store));

    Router::new()
        .route("/", post(create_category).get(list_categories))
        .route(
            "/:id",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tickerwire_core::entities::NewsCategory;
    use tickerwire_storage::MemoryStore;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (create_router(store.clone()), store)
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
    async fn test_create_category() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/", serde_json::json!({"name": "Earnings"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let category: NewsCategory = body_json(response).await;
        assert_eq!(category.name, "Earnings");
    }

    #[tokio::test]
    async fn test_create_category_blank_name_is_400() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/", serde_json::json!({"name": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_409() {
        let (app, _) = app();
        app.clone()
            .oneshot(post_json("/", serde_json::json!({"name": "Earnings"})))
            .await
            .unwrap();
        let response = app
            .oneshot(post_json("/", serde_json::json!({"name": "Earnings"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_update_category_description() {
        let (app, store) = app();
        let category = store
            .category_create(NewCategory {
                name: "Markets".into(),
                description: None,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::put(format!("/{}", category.category_id))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"description": "Broad market coverage"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: NewsCategory = body_json(response).await;
        assert_eq!(updated.description.as_deref(), Some("Broad market coverage"));
    }

    #[tokio::test]
    async fn test_delete_category() {
        let (app, store) = app();
        let category = store
            .category_create(NewCategory {
                name: "Markets".into(),
                description: None,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::delete(format!("/{}", category.category_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.category_get(category.category_id).await.is_err());
    }
}
