//! Article Routes
//!
//! CRUD over articles plus the processing trigger, similarity lookup, and
//! per-article mention listing. Creating an article runs the same cleaning
//! and symbol-extraction pipeline as ingestion, so manually submitted
//! articles get their stock mentions recorded too.

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

use tickerwire_core::entities::NewsArticle;
use tickerwire_core::validate::{
    clean_text, extract_stock_mentions, validate_article_data, validate_date, ArticleInput,
    MAX_TITLE_LEN, MIN_CONTENT_LEN,
};
use tickerwire_storage::{ArticleFilter, ArticleUpdate, MentionFilter, NewArticle, NewsStore};

use crate::error::{ApiError, ApiResult};
use crate::providers::{cosine_similarity, MlProvider};
use crate::routes::TaskAck;

/// Default number of similar articles returned.
const DEFAULT_SIMILAR_LIMIT: usize = 5;

// ============================================================================
// TYPES
// ============================================================================

/// Request body for creating an article.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateArticleRequest {
    pub source_id: Uuid,
    pub title: String,
    pub content: String,
    pub url: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Publication timestamp in any supported format; defaults to now.
    #[serde(default)]
    pub published_at: Option<String>,
}

/// Request body for updating an article. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateArticleRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

/// Query parameters for listing articles.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct ArticleListQuery {
    pub source_id: Option<Uuid>,
    pub is_processed: Option<bool>,
    /// Only articles mentioning this stock symbol.
    pub symbol: Option<String>,
    /// Only articles linked to this category name.
    pub category: Option<String>,
    pub min_sentiment: Option<f32>,
    pub max_sentiment: Option<f32>,
    pub limit: Option<usize>,
}

/// Query parameters for the similarity lookup.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct SimilarQuery {
    /// Maximum results, default 5.
    pub limit: Option<usize>,
}

/// One similarity result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SimilarArticle {
    pub article: NewsArticle,
    pub similarity: f32,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct ArticleState {
    pub store: Arc<dyn NewsStore>,
    pub ml: Arc<dyn MlProvider>,
}

impl ArticleState {
    pub fn new(store: Arc<dyn NewsStore>, ml: Arc<dyn MlProvider>) -> Self {
        Self { store, ml }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/articles - Create an article
#[utoipa::path(
    post,
    path = "/api/v1/articles",
    tag = "Articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Article created", body = NewsArticle),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Article URL already exists", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn create_article(
    State(state): State<Arc<ArticleState>>,
    Json(request): Json<CreateArticleRequest>,
) -> ApiResult<impl IntoResponse> {
    let validated = validate_article_data(&ArticleInput {
        title: request.title,
        content: request.content,
        url: request.url,
        author: request.author,
        published_at: request.published_at,
    })?;

    let haystack = format!("{} {}", validated.title, validated.content);
    let article = state
        .store
        .article_create(NewArticle {
            source_id: request.source_id,
            title: validated.title,
            content: validated.content,
            url: validated.url,
            author: validated.author,
            published_at: validated.published_at,
        })
        .await?;

    for symbol in extract_stock_mentions(&haystack) {
        state
            .store
            .mention_get_or_create(article.article_id, &symbol, None)
            .await?;
    }

    Ok((StatusCode::CREATED, Json(article)))
}

/// GET /api/v1/articles - List articles
#[utoipa::path(
    get,
    path = "/api/v1/articles",
    tag = "Articles",
    params(ArticleListQuery),
    responses(
        (status = 200, description = "Articles, newest first", body = Vec<NewsArticle>),
    ),
    security(("api_key" = [])),
)]
pub async fn list_articles(
    State(state): State<Arc<ArticleState>>,
    Query(query): Query<ArticleListQuery>,
) -> ApiResult<impl IntoResponse> {
    let articles = state
        .store
        .article_list(&ArticleFilter {
            source_id: query.source_id,
            is_processed: query.is_processed,
            symbol: query.symbol,
            category: query.category,
            min_sentiment: query.min_sentiment,
            max_sentiment: query.max_sentiment,
            limit: query.limit,
        })
        .await?;
    Ok(Json(articles))
}

/// GET /api/v1/articles/:id - Get an article
#[utoipa::path(
    get,
    path = "/api/v1/articles/{id}",
    tag = "Articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article", body = NewsArticle),
        (status = 404, description = "Article not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn get_article(
    State(state): State<Arc<ArticleState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let article = state.store.article_get(id).await?;
    Ok(Json(article))
}

/// PUT /api/v1/articles/:id - Update an article
#[utoipa::path(
    put,
    path = "/api/v1/articles/{id}",
    tag = "Articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Updated article", body = NewsArticle),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Article not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn update_article(
    State(state): State<Arc<ArticleState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateArticleRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = match request.title {
        Some(raw) => {
            let title = clean_text(&raw);
            if title.is_empty() {
                return Err(ApiError::missing_field("title"));
            }
            if title.chars().count() > MAX_TITLE_LEN {
                return Err(ApiError::validation_failed(format!(
                    "Field 'title' exceeds {} characters",
                    MAX_TITLE_LEN
                )));
            }
            Some(title)
        }
        None => None,
    };

    let content = match request.content {
        Some(raw) => {
            let content = clean_text(&raw);
            if content.chars().count() < MIN_CONTENT_LEN {
                return Err(ApiError::validation_failed(format!(
                    "Field 'content' must be at least {} characters",
                    MIN_CONTENT_LEN
                )));
            }
            Some(content)
        }
        None => None,
    };

    let published_at = match request.published_at {
        Some(raw) => Some(validate_date(&raw)?),
        None => None,
    };

    let update = ArticleUpdate {
        title,
        content,
        author: request.author.as_deref().map(clean_text),
        published_at,
    };
    if update.is_empty() {
        return Err(ApiError::invalid_input("No fields to update"));
    }

    let article = state.store.article_update(id, update).await?;
    Ok(Json(article))
}

/// DELETE /api/v1/articles/:id - Delete an article
#[utoipa::path(
    delete,
    path = "/api/v1/articles/{id}",
    tag = "Articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 204, description = "Article deleted"),
        (status = 404, description = "Article not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn delete_article(
    State(state): State<Arc<ArticleState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.article_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/articles/:id/process - Trigger article processing
#[utoipa::path(
    post,
    path = "/api/v1/articles/{id}/process",
    tag = "Articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 202, description = "Processing queued", body = TaskAck),
        (status = 404, description = "Article not found", body = ApiError),
        (status = 429, description = "Rate limit exceeded", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn trigger_process(
    State(state): State<Arc<ArticleState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    // 404 up front; the spawned task only sees articles that exist.
    state.store.article_get(id).await?;

    let store = state.store.clone();
    let ml = state.ml.clone();
    tokio::spawn(async move {
        if let Err(e) = crate::ingest::process_article(store.as_ref(), ml.as_ref(), id).await {
            tracing::error!(article_id = %id, error = %e, "Queued processing failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TaskAck::queued("process_article", id)),
    ))
}

/// GET /api/v1/articles/:id/similar - Most similar processed articles
#[utoipa::path(
    get,
    path = "/api/v1/articles/{id}/similar",
    tag = "Articles",
    params(
        ("id" = Uuid, Path, description = "Article ID"),
        SimilarQuery,
    ),
    responses(
        (status = 200, description = "Similar articles, best match first", body = Vec<SimilarArticle>),
        (status = 400, description = "Article has not been processed", body = ApiError),
        (status = 404, description = "Article not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn similar_articles(
    State(state): State<Arc<ArticleState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<SimilarQuery>,
) -> ApiResult<impl IntoResponse> {
    let article = state.store.article_get(id).await?;
    let Some(embedding) = article.embedding else {
        return Err(ApiError::invalid_input("Article has not been processed yet"));
    };

    let limit = query.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);
    let candidates = state
        .store
        .article_list(&ArticleFilter {
            is_processed: Some(true),
            ..Default::default()
        })
        .await?;

    let mut scored: Vec<SimilarArticle> = candidates
        .into_iter()
        .filter(|candidate| candidate.article_id != id)
        .filter_map(|candidate| {
            let other = candidate.embedding.as_deref()?;
            let similarity = cosine_similarity(&embedding, other);
            Some(SimilarArticle {
                article: candidate,
                similarity,
            })
        })
        .collect();
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);

    Ok(Json(scored))
}

/// GET /api/v1/articles/:id/mentions - Stock mentions in an article
#[utoipa::path(
    get,
    path = "/api/v1/articles/{id}/mentions",
    tag = "Articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Mentions", body = Vec<tickerwire_core::entities::StockMention>),
        (status = 404, description = "Article not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn list_article_mentions(
    State(state): State<Arc<ArticleState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.article_get(id).await?;
    let mentions = state
        .store
        .mention_list(&MentionFilter {
            article_id: Some(id),
            ..Default::default()
        })
        .await?;
    Ok(Json(mentions))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(store: Arc<dyn NewsStore>, ml: Arc<dyn MlProvider>) -> Router {
    let state = Arc::new(ArticleState::new(store, ml));

    Router::new()
        .route("/", post(create_article).get(list_articles))
        .route(
            "/:id",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route("/:id/process", post(trigger_process))
        .route("/:id/similar", get(similar_articles))
        .route("/:id/mentions", get(list_article_mentions))
        .with_state(state)
}
