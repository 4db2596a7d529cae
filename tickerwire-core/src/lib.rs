//! Tickerwire Core - Domain Types and Validation
//!
//! Shared foundation for the tickerwire workspace: entity records, error
//! types, input validation, and configuration structs. No I/O lives here;
//! storage and HTTP concerns belong to the other crates.

pub mod config;
pub mod entities;
pub mod error;
pub mod validate;

pub use config::{CacheConfig, IngestConfig, JobsConfig, RateSpec, ThrottleConfig};
pub use entities::{
    new_entity_id, ArticleCategory, EntityId, EntityKind, NewsArticle, NewsCategory, NewsSource,
    StockMention, Timestamp, User, UserProfile, UserRole, UserRoleAssignment,
};
pub use error::{
    ConfigError, IngestError, StorageError, TickerwireError, TickerwireResult, ValidationError,
};
