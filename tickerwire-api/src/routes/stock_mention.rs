//! Stock Mention Routes
//!
//! CRUD over stock mentions. Symbols are normalized ($aapl becomes AAPL)
//! before storage, and sentiment scores are bounded to [-1, 1].

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

use tickerwire_core::validate::{clean_text, validate_stock_symbol};
use tickerwire_storage::{MentionFilter, MentionUpdate, NewMention, NewsStore};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// TYPES
// ============================================================================

/// Request body for creating a stock mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateMentionRequest {
    pub article_id: Uuid,
    /// Ticker symbol, with or without a leading `$`.
    pub symbol: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub sentiment_score: Option<f32>,
}

/// Request body for updating a stock mention. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateMentionRequest {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub sentiment_score: Option<f32>,
}

/// Query parameters for listing mentions.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct MentionListQuery {
    pub article_id: Option<Uuid>,
    pub symbol: Option<String>,
    pub min_sentiment: Option<f32>,
    pub max_sentiment: Option<f32>,
}

fn check_sentiment(score: f32) -> ApiResult<()> {
    if !(-1.0..=1.0).contains(&score) {
        return Err(ApiError::validation_failed(
            "Field 'sentiment_score' must be between -1.0 and 1.0",
        ));
    }
    Ok(())
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct MentionState {
    pub store: Arc<dyn NewsStore>,
}

impl MentionState {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self { store }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/stock-mentions - Create a stock mention
#[utoipa::path(
    post,
    path = "/api/v1/stock-mentions",
    tag = "Mentions",
    request_body = CreateMentionRequest,
    responses(
        (status = 201, description = "Mention created", body = tickerwire_core::entities::StockMention),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Mention already exists for this article and symbol", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn create_mention(
    State(state): State<Arc<MentionState>>,
    Json(request): Json<CreateMentionRequest>,
) -> ApiResult<impl IntoResponse> {
    let symbol = validate_stock_symbol(&request.symbol)?;
    if let Some(score) = request.sentiment_score {
        check_sentiment(score)?;
    }

    let mention = state
        .store
        .mention_create(NewMention {
            article_id: request.article_id,
            symbol,
            context: request.context.as_deref().map(clean_text),
            sentiment_score: request.sentiment_score,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(mention)))
}

/// GET /api/v1/stock-mentions - List stock mentions
#[utoipa::path(
    get,
    path = "/api/v1/stock-mentions",
    tag = "Mentions",
    params(MentionListQuery),
    responses(
        (status = 200, description = "Mentions, newest first", body = Vec<tickerwire_core::entities::StockMention>),
    ),
    security(("api_key" = [])),
)]
pub async fn list_mentions(
    State(state): State<Arc<MentionState>>,
    Query(query): Query<MentionListQuery>,
) -> ApiResult<impl IntoResponse> {
    let symbol = match query.symbol {
        Some(raw) => Some(validate_stock_symbol(&raw)?),
        None => None,
    };
    let mentions = state
        .store
        .mention_list(&MentionFilter {
            article_id: query.article_id,
            symbol,
            min_sentiment: query.min_sentiment,
            max_sentiment: query.max_sentiment,
        })
        .await?;
    Ok(Json(mentions))
}

/// GET /api/v1/stock-mentions/:id - Get a stock mention
#[utoipa::path(
    get,
    path = "/api/v1/stock-mentions/{id}",
    tag = "Mentions",
    params(("id" = Uuid, Path, description = "Mention ID")),
    responses(
        (status = 200, description = "Mention", body = tickerwire_core::entities::StockMention),
        (status = 404, description = "Mention not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn get_mention(
    State(state): State<Arc<MentionState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let mention = state.store.mention_get(id).await?;
    Ok(Json(mention))
}

/// PUT /api/v1/stock-mentions/:id - Update a stock mention
#[utoipa::path(
    put,
    path = "/api/v1/stock-mentions/{id}",
    tag = "Mentions",
    params(("id" = Uuid, Path, description = "Mention ID")),
    request_body = UpdateMentionRequest,
    responses(
        (status = 200, description = "Updated mention", body = tickerwire_core::entities::StockMention),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Mention not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn update_mention(
    State(state): State<Arc<MentionState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMentionRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(score) = request.sentiment_score {
        check_sentiment(score)?;
    }
    let update = MentionUpdate {
        context: request.context.as_deref().map(clean_text),
        sentiment_score: request.sentiment_score,
    };
    if update.is_empty() {
        return Err(ApiError::invalid_input("No fields to update"));
    }

    let mention = state.store.mention_update(id, update).await?;
    Ok(Json(mention))
}

/// DELETE /api/v1/stock-mentions/:id - Delete a stock mention
#[utoipa::path(
    delete,
    path = "/api/v1/stock-mentions/{id}",
    tag = "Mentions",
    params(("id" = Uuid, Path, description = "Mention ID")),
    responses(
        (status = 204, description = "Mention deleted"),
        (status = 404, description = "Mention not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn delete_mention(
    State(state): State<Arc<MentionState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.mention_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(store: Arc<dyn NewsStore>) -> Router {
    let state = Arc::new(MentionState::new(store));

    Router::new()
        .route("/", post(create_mention).get(list_mentions))
        .route(
            "/:id",
            get(get_mention).put(update_mention).delete(delete_mention),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use tickerwire_core::entities::StockMention;
    use tickerwire_storage::{MemoryStore, NewArticle, NewSource};
    use tower::ServiceExt;

    async fn app() -> (Router, Arc<MemoryStore>, Uuid) {
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
        (create_router(store.clone()), store, article.article_id)
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
    async fn test_create_mention_normalizes_symbol() {
        let (app, _, article_id) = app().await;
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({"article_id": article_id, "symbol": "$aapl"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let mention: StockMention = body_json(response).await;
        assert_eq!(mention.symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_create_mention_invalid_symbol_is_400() {
        let (app, _, article_id) = app().await;
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({"article_id": article_id, "symbol": "TOOLONG"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_mention_out_of_range_sentiment_is_400() {
        let (app, _, article_id) = app().await;
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({
                    "article_id": article_id,
                    "symbol": "AAPL",
                    "sentiment_score": 2.5,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_symbol_for_article_is_409() {
        let (app, _, article_id) = app().await;
        let payload = serde_json::json!({"article_id": article_id, "symbol": "AAPL"});
        app.clone()
            .oneshot(post_json("/", payload.clone()))
            .await
            .unwrap();
        let response = app.oneshot(post_json("/", payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_list_mentions_filters_by_symbol() {
        let (app, store, article_id) = app().await;
        store
            .mention_create(NewMention {
                article_id,
                symbol: "AAPL".into(),
                context: None,
                sentiment_score: None,
            })
            .await
            .unwrap();
        store
            .mention_create(NewMention {
                article_id,
                symbol: "TSLA".into(),
                context: None,
                sentiment_score: None,
            })
            .await
            .unwrap();

        // Lowercase query symbols are normalized before filtering.
        let response = app
            .oneshot(Request::get("/?symbol=aapl").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let mentions: Vec<StockMention> = body_json(response).await;
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_update_mention_sentiment() {
        let (app, store, article_id) = app().await;
        let mention = store
            .mention_create(NewMention {
                article_id,
                symbol: "AAPL".into(),
                context: None,
                sentiment_score: None,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::put(format!("/{}", mention.mention_id))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"sentiment_score": 0.7}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated: StockMention = body_json(response).await;
        assert_eq!(updated.sentiment_score, Some(0.7));
    }

    #[tokio::test]
    async fn test_delete_missing_mention_is_404() {
        let (app, _, _) = app().await;
        let response = app
            .oneshot(
                Request::delete(format!("/{}", Uuid::now_v7()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
