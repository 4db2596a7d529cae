//! Authentication Middleware
//!
//! Two-step authentication:
//! 1. If API keys are configured, the `X-API-Key` header must carry one of
//!    them; otherwise the request is rejected with 401.
//! 2. An optional `X-User-ID` header resolves the acting user against the
//!    store. Unknown ids are 401, inactive accounts are 403.
//!
//! On success an [`AuthContext`] lands in the request extensions for the
//! cache and throttle middleware and for handlers that record actors.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use tickerwire_core::entities::EntityId;
use tickerwire_storage::NewsStore;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// AUTH CONTEXT
// ============================================================================

/// Identity resolved for the current request.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Resolved user, when `X-User-ID` was supplied.
    pub user_id: Option<EntityId>,
    /// Staff users bypass throttling.
    pub is_staff: bool,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<ApiConfig>,
    pub store: Arc<dyn NewsStore>,
}

impl AuthState {
    pub fn new(config: Arc<ApiConfig>, store: Arc<dyn NewsStore>) -> Self {
        Self { config, store }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    if !state.config.api_keys.is_empty() {
        let key = request
            .headers()
            .get("x-api-key")
            .and_then(|h| h.to_str().ok());
        match key {
            Some(k) if state.config.is_api_key_valid(k) => {}
            Some(_) => return Err(ApiError::unauthorized("Invalid API key")),
            None => return Err(ApiError::unauthorized("Missing X-API-Key header")),
        }
    }

    let context = match request
        .headers()
        .get("x-user-id")
        .and_then(|h| h.to_str().ok())
    {
        Some(raw) => {
            let user_id = raw
                .parse::<Uuid>()
                .map_err(|_| ApiError::invalid_format("X-User-ID", "a UUID"))?;
            let user = state
                .store
                .user_get(user_id)
                .await
                .map_err(|_| ApiError::unauthorized("Unknown user"))?;
            if !user.is_active {
                return Err(ApiError::forbidden("User account is inactive"));
            }
            AuthContext {
                user_id: Some(user.user_id),
                is_staff: user.is_staff,
            }
        }
        None => AuthContext::anonymous(),
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
