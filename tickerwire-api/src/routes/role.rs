//! Role and Assignment Routes
//!
//! CRUD over roles (named permission bundles) and the assignments granting
//! them to users. The acting user from the auth context is recorded as the
//! grantor on new assignments.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use tickerwire_core::validate::clean_text;
use tickerwire_storage::{NewRole, NewsStore, RoleUpdate};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthContext;

// ============================================================================
// TYPES
// ============================================================================

/// Request body for creating a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Permission map; defaults to an empty object.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub permissions: Option<serde_json::Value>,
}

/// Request body for updating a role. Absent fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub permissions: Option<serde_json::Value>,
}

/// Request body for granting a role to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateAssignmentRequest {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// Query parameters for listing assignments.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct AssignmentListQuery {
    pub user_id: Option<Uuid>,
}

fn check_permissions(permissions: &serde_json::Value) -> ApiResult<()> {
    if !permissions.is_object() {
        return Err(ApiError::invalid_format("permissions", "a JSON object"));
    }
    Ok(())
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct RoleState {
    pub store: Arc<dyn NewsStore>,
}

impl RoleState {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self { store }
    }
}

// ============================================================================
// ROLE HANDLERS
// ============================================================================

/// POST /api/v1/roles - Create a role
#[utoipa::path(
    post,
    path = "/api/v1/roles",
    tag = "Roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = tickerwire_core::entities::UserRole),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Role name already exists", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn create_role(
    State(state): State<Arc<RoleState>>,
    Json(request): Json<CreateRoleRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = clean_text(&request.name);
    if name.is_empty() {
        return Err(ApiError::missing_field("name"));
    }
    let permissions = request
        .permissions
        .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
    check_permissions(&permissions)?;

    let role = state
        .store
        .role_create(NewRole {
            name,
            description: request.description,
            permissions,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /api/v1/roles - List roles
#[utoipa::path(
    get,
    path = "/api/v1/roles",
    tag = "Roles",
    responses(
        (status = 200, description = "Roles", body = Vec<tickerwire_core::entities::UserRole>),
    ),
    security(("api_key" = [])),
)]
pub async fn list_roles(State(state): State<Arc<RoleState>>) -> ApiResult<impl IntoResponse> {
    let roles = state.store.role_list().await?;
    Ok(Json(roles))
}

/// GET /api/v1/roles/:id - Get a role
#[utoipa::path(
    get,
    path = "/api/v1/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role", body = tickerwire_core::entities::UserRole),
        (status = 404, description = "Role not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn get_role(
    State(state): State<Arc<RoleState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let role = state.store.role_get(id).await?;
    Ok(Json(role))
}

/// PUT /api/v1/roles/:id - Update a role
#[utoipa::path(
    put,
    path = "/api/v1/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated role", body = tickerwire_core::entities::UserRole),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 404, description = "Role not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn update_role(
    State(state): State<Arc<RoleState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
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
    if let Some(permissions) = &request.permissions {
        check_permissions(permissions)?;
    }

    let update = RoleUpdate {
        name,
        description: request.description,
        permissions: request.permissions,
    };
    if update.is_empty() {
        return Err(ApiError::invalid_input("No fields to update"));
    }

    let role = state.store.role_update(id, update).await?;
    Ok(Json(role))
}

/// DELETE /api/v1/roles/:id - Delete a role
#[utoipa::path(
    delete,
    path = "/api/v1/roles/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Role and its assignments deleted"),
        (status = 404, description = "Role not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn delete_role(
    State(state): State<Arc<RoleState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.role_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ASSIGNMENT HANDLERS
// ============================================================================

/// POST /api/v1/role-assignments - Grant a role to a user
#[utoipa::path(
    post,
    path = "/api/v1/role-assignments",
    tag = "Roles",
    request_body = CreateAssignmentRequest,
    responses(
        (status = 201, description = "Role granted", body = tickerwire_core::entities::UserRoleAssignment),
        (status = 400, description = "Unknown user or role", body = ApiError),
        (status = 409, description = "User already has this role", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn create_assignment(
    State(state): State<Arc<RoleState>>,
    context: Option<Extension<AuthContext>>,
    Json(request): Json<CreateAssignmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let created_by = context.and_then(|Extension(ctx)| ctx.user_id);
    let assignment = state
        .store
        .assignment_create(request.user_id, request.role_id, created_by)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// GET /api/v1/role-assignments - List role assignments
#[utoipa::path(
    get,
    path = "/api/v1/role-assignments",
    tag = "Roles",
    params(AssignmentListQuery),
    responses(
        (status = 200, description = "Assignments", body = Vec<tickerwire_core::entities::UserRoleAssignment>),
    ),
    security(("api_key" = [])),
)]
pub async fn list_assignments(
    State(state): State<Arc<RoleState>>,
    Query(query): Query<AssignmentListQuery>,
) -> ApiResult<impl IntoResponse> {
    let assignments = state.store.assignment_list(query.user_id).await?;
    Ok(Json(assignments))
}

/// GET /api/v1/role-assignments/:id - Get a role assignment
#[utoipa::path(
    get,
    path = "/api/v1/role-assignments/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment", body = tickerwire_core::entities::UserRoleAssignment),
        (status = 404, description = "Assignment not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn get_assignment(
    State(state): State<Arc<RoleState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let assignment = state.store.assignment_get(id).await?;
    Ok(Json(assignment))
}

/// DELETE /api/v1/role-assignments/:id - Revoke a role assignment
#[utoipa::path(
    delete,
    path = "/api/v1/role-assignments/{id}",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 204, description = "Assignment revoked"),
        (status = 404, description = "Assignment not found", body = ApiError),
    ),
    security(("api_key" = [])),
)]
pub async fn delete_assignment(
    State(state): State<Arc<RoleState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.assignment_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTERS
// ============================================================================

pub fn create_router(store: Arc<dyn NewsStore>) -> Router {
    let state = Arc::new(RoleState::new(store));

    Router::new()
        .route("/", post(create_role).get(list_roles))
        .route("/:id", get(get_role).put(update_role).delete(delete_role))
        .with_state(state)
}

pub fn create_assignment_router(store: Arc<dyn NewsStore>) -> Router {
    let state = Arc::new(RoleState::new(store));

    Router::new()
        .route("/", post(create_assignment).get(list_assignments))
        .route("/:id", get(get_assignment).delete(delete_assignment))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tickerwire_core::entities::{UserRole, UserRoleAssignment};
    use tickerwire_storage::{MemoryStore, NewUser};
    use tower::ServiceExt;

    fn roles_app() -> (Router, Arc<MemoryStore>) {
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
    async fn test_create_role_defaults_empty_permissions() {
        let (app, _) = roles_app();
        let response = app
            .oneshot(post_json("/", serde_json::json!({"name": "editor"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let role: UserRole = body_json(response).await;
        assert_eq!(role.name, "editor");
        assert!(role.permissions.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_role_non_object_permissions_is_400() {
        let (app, _) = roles_app();
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({"name": "editor", "permissions": ["a", "b"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_role_name_is_409() {
        let (app, _) = roles_app();
        app.clone()
            .oneshot(post_json("/", serde_json::json!({"name": "editor"})))
            .await
            .unwrap();
        let response = app
            .oneshot(post_json("/", serde_json::json!({"name": "editor"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_assignment_records_grantor_from_context() {
        let store = Arc::new(MemoryStore::new());
        let admin = store
            .user_create(NewUser {
                email: "admin@example.com".into(),
                username: "admin".into(),
                is_active: true,
                is_staff: true,
            })
            .await
            .unwrap();
        let member = store
            .user_create(NewUser {
                email: "member@example.com".into(),
                username: "member".into(),
                is_active: true,
                is_staff: false,
            })
            .await
            .unwrap();
        let role = store
            .role_create(NewRole {
                name: "editor".into(),
                description: None,
                permissions: serde_json::json!({}),
            })
            .await
            .unwrap();

        let app = create_assignment_router(store.clone()).layer(Extension(AuthContext {
            user_id: Some(admin.user_id),
            is_staff: true,
        }));

        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({"user_id": member.user_id, "role_id": role.role_id}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let assignment: UserRoleAssignment = body_json(response).await;
        assert_eq!(assignment.created_by, Some(admin.user_id));
    }

    #[tokio::test]
    async fn test_assignment_unknown_role_is_400() {
        let store = Arc::new(MemoryStore::new());
        let member = store
            .user_create(NewUser {
                email: "member@example.com".into(),
                username: "member".into(),
                is_active: true,
                is_staff: false,
            })
            .await
            .unwrap();

        let app = create_assignment_router(store);
        let response = app
            .oneshot(post_json(
                "/",
                serde_json::json!({"user_id": member.user_id, "role_id": Uuid::now_v7()}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_assignment_is_409() {
        let store = Arc::new(MemoryStore::new());
        let member = store
            .user_create(NewUser {
                email: "member@example.com".into(),
                username: "member".into(),
                is_active: true,
                is_staff: false,
            })
            .await
            .unwrap();
        let role = store
            .role_create(NewRole {
                name: "editor".into(),
                description: None,
                permissions: serde_json::json!({}),
            })
            .await
            .unwrap();

        let app = create_assignment_router(store);
        let payload = serde_json::json!({"user_id": member.user_id, "role_id": role.role_id});
        app.clone()
            .oneshot(post_json("/", payload.clone()))
            .await
            .unwrap();
        let response = app.oneshot(post_json("/", payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
