//! Error types for tickerwire operations

use crate::entities::{EntityId, EntityKind};
use thiserror::Error;

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{field} exceeds maximum length {max} (got {len})")]
    TooLong { field: String, max: usize, len: usize },

    #[error("{field} is below minimum length {min} (got {len})")]
    TooShort { field: String, min: usize, len: usize },

    #[error("Unrecognized date '{value}'; supported formats: {formats}")]
    UnrecognizedDate { value: String, formats: String },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {kind:?} with id {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("Duplicate {kind:?} on {field}: {value}")]
    DuplicateKey {
        kind: EntityKind,
        field: String,
        value: String,
    },

    #[error("Reference to missing {kind:?} with id {id}")]
    MissingReference { kind: EntityKind, id: EntityId },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Ingestion and processing errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IngestError {
    #[error("Fetch of {url} failed: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("No usable content extracted from {url}")]
    EmptyDocument { url: String },

    #[error("Provider call failed: {reason}")]
    ProviderFailed { reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all tickerwire errors.
#[derive(Debug, Clone, Error)]
pub enum TickerwireError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for tickerwire operations.
pub type TickerwireResult<T> = Result<T, TickerwireError>;
