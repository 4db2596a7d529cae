//! Entity records for the news aggregation domain.
//!
//! Pure data structures with standard CRUD lifecycle fields. Every record
//! carries a UUIDv7 id (timestamp-sortable) and UTC created/updated stamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
///
/// Entity structs below spell out `Uuid` and `DateTime<Utc>` rather than
/// the aliases: the schema derive resolves those type names specially and
/// does not see through aliases.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Entity type discriminator, used in storage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityKind {
    Source,
    Article,
    StockMention,
    Category,
    ArticleCategory,
    User,
    UserProfile,
    Role,
    RoleAssignment,
}

// ============================================================================
// NEWS ENTITIES
// ============================================================================

/// A registered news outlet articles are ingested from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewsSource {
    pub source_id: Uuid,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    /// Inactive sources are skipped by the scheduled ingestion job.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An ingested news article. `url` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewsArticle {
    pub article_id: Uuid,
    pub source_id: Uuid,
    pub title: String,
    pub content: String,
    pub url: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Filled in by the processing pipeline.
    pub summary: Option<String>,
    /// Sentiment in [-1.0, 1.0], set during processing.
    pub sentiment_score: Option<f32>,
    /// Document embedding, set during processing.
    pub embedding: Option<Vec<f32>>,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stock symbol spotted in an article's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StockMention {
    pub mention_id: Uuid,
    pub article_id: Uuid,
    /// Uppercase ticker, 1-5 letters, no `$` prefix.
    pub symbol: String,
    /// Text surrounding the mention, for display.
    pub context: Option<String>,
    /// Mention-level sentiment, re-scored during article processing.
    pub sentiment_score: Option<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A topical category. `name` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewsCategory {
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Link between an article and a category, with classifier confidence.
/// Unique per (article, category) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ArticleCategory {
    pub link_id: Uuid,
    pub article_id: Uuid,
    pub category_id: Uuid,
    /// Classifier confidence in [0.0, 1.0]. Defaults to 1.0 for manual links.
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// USER ENTITIES
// ============================================================================

/// An account. `email` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub is_active: bool,
    /// Staff accounts bypass request throttling.
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One-to-one profile attached to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserProfile {
    pub profile_id: Uuid,
    pub user_id: Uuid,
    pub bio: Option<String>,
    /// Free-form preference document.
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub preferences: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named role with a permission document. `name` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserRole {
    pub role_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Free-form permission document.
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub permissions: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Grant of a role to a user. Unique per (user, role) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserRoleAssignment {
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    /// The acting user who created the grant, when known.
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_id_is_v7() {
        let id = new_entity_id();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_entity_ids_are_sortable() {
        let id1 = new_entity_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = new_entity_id();
        assert!(id1.to_string() < id2.to_string());
    }

    #[test]
    fn test_article_serde_round_trip() {
        let now = Utc::now();
        let article = NewsArticle {
            article_id: new_entity_id(),
            source_id: new_entity_id(),
            title: "Markets rally".to_string(),
            content: "Stocks rose broadly on Tuesday.".to_string(),
            url: "https://example.com/markets-rally".to_string(),
            author: None,
            published_at: now,
            summary: None,
            sentiment_score: Some(0.4),
            embedding: Some(vec![0.1, 0.2]),
            is_processed: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&article).unwrap();
        let back: NewsArticle = serde_json::from_str(&json).unwrap();
        assert_eq!(article, back);
    }
}
