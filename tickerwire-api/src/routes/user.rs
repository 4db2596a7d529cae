//! User Routes
//!
//! CRUD over users plus their profile sub-resource. Creating a user also
//! creates an empty profile; the profile endpoints read and update it in
//! place.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use tickerwire_core::validate::clean_text;
use tickerwire_storage::{NewUser, NewsStore, ProfileUpdate, UserUpdate};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthContext;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

// ============================================================================
// TYPES
// ============================================================================

/// Request body for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    /// Defaults to true.
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Defaults to false.
    #[serde(default)]
    pub is_staff: Option<bool>,
}

/// Request body for updating a user. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_staff: Option<bool>,
}

/// Request body for updating a profile. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub preferences: Option<serde_json::Value>,
}

fn check_email(email: &str) -> ApiResult<String> {
    let email = email.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(ApiError::invalid_format("email", "an email address"));
    }
    Ok(email)
}

fn check_username(username: &str) -> ApiResult<String> {
    let username = clean_text(username);
    if username.is_empty() {
        return Err(ApiError::missing_field("username"));
    }
    Ok(username)
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct UserState {
    pub store: Arc<dyn NewsStore>,
}

impl UserState {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self { store }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/users - Create a user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = tickerwire_core::entities::User),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Email already registered", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn create_user(
    State(state): State<Arc<UserState>>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = check_email(&request.email)?;
    let username = check_username(&request.username)?;

    let user = state
        .store
        .user_create(NewUser {
            email,
            username,
            is_active: request.is_active.unwrap_or(true),
            is_staff: request.is_staff.unwrap_or(false),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users - List users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    responses(
        (status = 200, description = "Users", body = Vec<tickerwire_core::entities::User>),
    ),
    security(("api_key" = [])),
)]
pub async fn list_users(State(state): State<Arc<UserState>>) -> ApiResult<impl IntoResponse> {
    let users = state.store.user_list().await?;
    Ok(Json(users))
}

/// GET /api/v1/users/me - Get the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Authenticated user", body = tickerwire_core::entities::User),
        (status = 401, description = "No user identity on the request", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn current_user(
    State(state): State<Arc<UserState>>,
    context: Option<Extension<AuthContext>>,
) -> ApiResult<impl IntoResponse> {
    let user_id = context
        .and_then(|Extension(ctx)| ctx.user_id)
        .ok_or_else(|| ApiError::unauthorized("No user identity on the request"))?;
    let user = state.store.user_get(user_id).await?;
    Ok(Json(user))
}

/// GET /api/v1/users/:id - Get a user
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = tickerwire_core::entities::User),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn get_user(
    State(state): State<Arc<UserState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = state.store.user_get(id).await?;
    Ok(Json(user))
}

/// PUT /api/v1/users/:id - Update a user
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = tickerwire_core::entities::User),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 409, description = "Email already registered", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn update_user(
    State(state): State<Arc<UserState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = match request.email {
        Some(raw) => Some(check_email(&raw)?),
        None => None,
    };
    let username = match request.username {
        Some(raw) => Some(check_username(&raw)?),
        None => None,
    };

    let update = UserUpdate {
        email,
        username,
        is_active: request.is_active,
        is_staff: request.is_staff,
    };
    if update.is_empty() {
        return Err(ApiError::invalid_input("No fields to update"));
    }

    let user = state.store.user_update(id, update).await?;
    Ok(Json(user))
}

/// DELETE /api/v1/users/:id - Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn delete_user(
    State(state): State<Arc<UserState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.user_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/:id/profile - Get a user's profile
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/profile",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Profile", body = tickerwire_core::entities::UserProfile),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn get_profile(
    State(state): State<Arc<UserState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.store.profile_get(id).await?;
    Ok(Json(profile))
}

/// PUT /api/v1/users/:id/profile - Update a user's profile
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/profile",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = tickerwire_core::entities::UserProfile),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn update_profile(
    State(state): State<Arc<UserState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(preferences) = &request.preferences {
        if !preferences.is_object() {
            return Err(ApiError::invalid_format("preferences", "a JSON object"));
        }
    }

    let update = ProfileUpdate {
        bio: request.bio.as_deref().map(clean_text),
        preferences: request.preferences,
    };
    if update.is_empty() {
        return Err(ApiError::invalid_input("No fields to update"));
    }

    let profile = state.store.profile_update(id, update).await?;
    Ok(Json(profile))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(store: Arc<dyn NewsStore>) -> Router {
    let state = Arc::new(UserState::new(store));

    Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/me", get(current_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/profile", get(get_profile).put(update_profile))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tickerwire_core::entities::{User, UserProfile};
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
    async fn test_create_user_also_creates_profile() {
        let (app, store) = app();
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({"email": "Reader@Example.com", "username": "reader"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let user: User = body_json(response).await;
        // Email is normalized to lowercase.
        assert_eq!(user.email, "reader@example.com");
        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(store.profile_get(user.user_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_user_bad_email_is_400() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({"email": "not-an-email", "username": "reader"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_409() {
        let (app, _) = app();
        let payload = serde_json::json!({"email": "a@example.com", "username": "a"});
        app.clone()
            .oneshot(post_json("/", payload.clone()))
            .await
            .unwrap();
        let response = app.oneshot(post_json("/", payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_update_profile_bio_and_preferences() {
        let (app, store) = app();
        let user = store
            .user_create(NewUser {
                email: "a@example.com".into(),
                username: "a".into(),
                is_active: true,
                is_staff: false,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::put(format!("/{}/profile", user.user_id))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "bio": "Markets watcher",
                            "preferences": {"digest": "daily"},
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let profile: UserProfile = body_json(response).await;
        assert_eq!(profile.bio.as_deref(), Some("Markets watcher"));
        assert_eq!(profile.preferences["digest"], "daily");
    }

    #[tokio::test]
    async fn test_update_profile_non_object_preferences_is_400() {
        let (app, store) = app();
        let user = store
            .user_create(NewUser {
                email: "a@example.com".into(),
                username: "a".into(),
                is_active: true,
                is_staff: false,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::put(format!("/{}/profile", user.user_id))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"preferences": [1, 2, 3]}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_me_returns_the_request_identity() {
        let (app, store) = app();
        let user = store
            .user_create(NewUser {
                email: "a@example.com".into(),
                username: "a".into(),
                is_active: true,
                is_staff: false,
            })
            .await
            .unwrap();

        let identified = app.clone().layer(Extension(AuthContext {
            user_id: Some(user.user_id),
            is_staff: false,
        }));
        let response = identified
            .oneshot(Request::get("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let me: User = body_json(response).await;
        assert_eq!(me.user_id, user.user_id);

        // Without an identity the endpoint rejects the request.
        let response = app
            .oneshot(Request::get("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_delete_user_removes_profile() {
        let (app, store) = app();
        let user = store
            .user_create(NewUser {
                email: "a@example.com".into(),
                username: "a".into(),
                is_active: true,
                is_staff: false,
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::delete(format!("/{}", user.user_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.profile_get(user.user_id).await.is_err());
    }
}
