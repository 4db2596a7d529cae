//! API Error Types and HTTP Mapping
//!
//! Defines the wire-level error envelope returned by every endpoint. Each
//! error carries a stable machine-readable code, a human-readable message,
//! and optional structured details. Domain errors from the core and storage
//! crates convert into `ApiError` via `From`, so handlers can use `?`
//! throughout.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use tickerwire_core::entities::EntityKind;
use tickerwire_core::error::{IngestError, StorageError, ValidationError};

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// ERROR CODES
// ============================================================================

/// Stable error codes exposed to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication / authorization
    Unauthorized,
    Forbidden,

    // Validation
    ValidationFailed,
    InvalidInput,
    MissingField,
    InvalidFormat,

    // Not found (per entity)
    SourceNotFound,
    ArticleNotFound,
    MentionNotFound,
    CategoryNotFound,
    LinkNotFound,
    UserNotFound,
    ProfileNotFound,
    RoleNotFound,
    AssignmentNotFound,
    EntityNotFound,

    // Conflicts
    EntityAlreadyExists,
    StateConflict,

    // Throttling
    TooManyRequests,

    // Ingestion
    IngestFailed,
    UpstreamUnavailable,

    // Server
    InternalError,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,

            ErrorCode::SourceNotFound
            | ErrorCode::ArticleNotFound
            | ErrorCode::MentionNotFound
            | ErrorCode::CategoryNotFound
            | ErrorCode::LinkNotFound
            | ErrorCode::UserNotFound
            | ErrorCode::ProfileNotFound
            | ErrorCode::RoleNotFound
            | ErrorCode::AssignmentNotFound
            | ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,

            ErrorCode::EntityAlreadyExists | ErrorCode::StateConflict => StatusCode::CONFLICT,

            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::IngestFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access denied",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::InvalidInput => "Invalid input",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidFormat => "Invalid field format",
            ErrorCode::SourceNotFound => "News source not found",
            ErrorCode::ArticleNotFound => "Article not found",
            ErrorCode::MentionNotFound => "Stock mention not found",
            ErrorCode::CategoryNotFound => "Category not found",
            ErrorCode::LinkNotFound => "Article-category link not found",
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::ProfileNotFound => "User profile not found",
            ErrorCode::RoleNotFound => "Role not found",
            ErrorCode::AssignmentNotFound => "Role assignment not found",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::EntityAlreadyExists => "Entity already exists",
            ErrorCode::StateConflict => "Operation conflicts with current state",
            ErrorCode::TooManyRequests => "Rate limit exceeded",
            ErrorCode::IngestFailed => "Failed to ingest content from source",
            ErrorCode::UpstreamUnavailable => "Upstream source is unavailable",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", s.trim_matches('"'))
    }
}

// ============================================================================
// API ERROR
// ============================================================================

/// Error envelope serialized into every non-2xx response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field errors, upstream status, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create an Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    /// Create an InvalidFormat error.
    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    /// Create a SourceNotFound error.
    pub fn source_not_found(source_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::SourceNotFound,
            format!("News source {} not found", source_id),
        )
    }

    /// Create an ArticleNotFound error.
    pub fn article_not_found(article_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ArticleNotFound,
            format!("Article {} not found", article_id),
        )
    }

    /// Create a MentionNotFound error.
    pub fn mention_not_found(mention_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::MentionNotFound,
            format!("Stock mention {} not found", mention_id),
        )
    }

    /// Create a CategoryNotFound error.
    pub fn category_not_found(category_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::CategoryNotFound,
            format!("Category {} not found", category_id),
        )
    }

    /// Create a LinkNotFound error.
    pub fn link_not_found(link_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::LinkNotFound,
            format!("Article-category link {} not found", link_id),
        )
    }

    /// Create a UserNotFound error.
    pub fn user_not_found(user_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::UserNotFound,
            format!("User {} not found", user_id),
        )
    }

    /// Create a RoleNotFound error.
    pub fn role_not_found(role_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::RoleNotFound,
            format!("Role {} not found", role_id),
        )
    }

    /// Create an AssignmentNotFound error.
    pub fn assignment_not_found(assignment_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::AssignmentNotFound,
            format!("Role assignment {} not found", assignment_id),
        )
    }

    /// Create an EntityAlreadyExists error.
    pub fn entity_already_exists(entity_type: &str, value: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityAlreadyExists,
            format!("{} '{}' already exists", entity_type, value),
        )
    }

    /// Create a StateConflict error.
    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, message)
    }

    /// Create a TooManyRequests error.
    pub fn too_many_requests(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("Rate limit exceeded. Retry after {} seconds", secs),
            None => "Rate limit exceeded".to_string(),
        };
        Self::new(ErrorCode::TooManyRequests, message)
    }

    /// Create an IngestFailed error.
    pub fn ingest_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IngestFailed, message)
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a ServiceUnavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError to enable automatic error handling in
/// Axum. Handlers return `ApiResult<T>` and bubble errors with `?`.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

/// Convert storage errors into API errors, mapping entity kinds to their
/// dedicated not-found codes.
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => match kind {
                EntityKind::Source => ApiError::source_not_found(id),
                EntityKind::Article => ApiError::article_not_found(id),
                EntityKind::StockMention => ApiError::mention_not_found(id),
                EntityKind::Category => ApiError::category_not_found(id),
                EntityKind::ArticleCategory => ApiError::link_not_found(id),
                EntityKind::User => ApiError::user_not_found(id),
                EntityKind::UserProfile => ApiError::new(
                    ErrorCode::ProfileNotFound,
                    format!("Profile for user {} not found", id),
                ),
                EntityKind::Role => ApiError::role_not_found(id),
                EntityKind::RoleAssignment => ApiError::assignment_not_found(id),
            },
            StorageError::DuplicateKey { kind, field, value } => ApiError::new(
                ErrorCode::EntityAlreadyExists,
                format!("{:?} with {} '{}' already exists", kind, field, value),
            ),
            StorageError::MissingReference { kind, id } => {
                ApiError::invalid_input(format!("Referenced {:?} {} does not exist", kind, id))
            }
            StorageError::TransactionFailed { reason } => {
                tracing::error!(error = %reason, "Store transaction failed");
                ApiError::internal_error("Storage operation failed")
            }
            StorageError::LockPoisoned => {
                tracing::error!("Store lock poisoned");
                ApiError::internal_error("Storage operation failed")
            }
        }
    }
}

/// Validation failures map to 400 with the field-level message preserved.
impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation_failed(err.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(e) => e.into(),
            IngestError::Storage(e) => e.into(),
            IngestError::FetchFailed { url, reason } => {
                ApiError::ingest_failed(format!("Failed to fetch {}: {}", url, reason))
            }
            IngestError::EmptyDocument { url } => {
                ApiError::ingest_failed(format!("No article content extracted from {}", url))
            }
            IngestError::ProviderFailed { reason } => {
                tracing::error!(error = %reason, "Processing provider failed");
                ApiError::internal_error("Article processing failed")
            }
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}
