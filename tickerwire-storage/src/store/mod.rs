//! Entity store trait and in-memory implementation.
//!
//! The store owns create-or-update semantics for the news domain. Multi-step
//! operations (`article_upsert_with_mentions`, `article_apply_processing`)
//! are all-or-nothing: either every record lands or none do.
//!
//! Update structs use `Option` per field; `None` means "leave unchanged".
//! Optional text fields (descriptions, author, bio) accept explicit empty
//! strings as overwrites.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tickerwire_core::entities::{
    ArticleCategory, EntityId, NewsArticle, NewsCategory, NewsSource, StockMention, User,
    UserProfile, UserRole, UserRoleAssignment,
};
use tickerwire_core::error::StorageError;

pub type StoreResult<T> = Result<T, StorageError>;

// ============================================================================
// PARAMETER STRUCTS
// ============================================================================

/// Fields for creating a source. Callers validate first.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SourceUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl SourceUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.url.is_none()
            && self.description.is_none()
            && self.active.is_none()
    }
}

/// Fields for creating an article. Callers validate first.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub source_id: EntityId,
    pub title: String,
    pub content: String,
    pub url: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ArticleUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.author.is_none()
            && self.published_at.is_none()
    }
}

/// A symbol spotted during ingestion, before it becomes a [`StockMention`].
#[derive(Debug, Clone)]
pub struct MentionSeed {
    pub symbol: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMention {
    pub article_id: EntityId,
    pub symbol: String,
    pub context: Option<String>,
    pub sentiment_score: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct MentionUpdate {
    pub context: Option<String>,
    pub sentiment_score: Option<f32>,
}

impl MentionUpdate {
    pub fn is_empty(&self) -> bool {
        self.context.is_none() && self.sentiment_score.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl CategoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub is_active: bool,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.is_active.is_none()
            && self.is_staff.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub preferences: Option<serde_json::Value>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.bio.is_none() && self.preferences.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub permissions: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<serde_json::Value>,
}

impl RoleUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.permissions.is_none()
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// Article list filter. All fields combine with AND; results are ordered
/// by `published_at` descending.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub source_id: Option<EntityId>,
    pub is_processed: Option<bool>,
    /// Only articles with a mention of this symbol.
    pub symbol: Option<String>,
    /// Only articles linked to the category with this name.
    pub category: Option<String>,
    pub min_sentiment: Option<f32>,
    pub max_sentiment: Option<f32>,
    pub limit: Option<usize>,
}

/// Mention list filter. Results are ordered by `created_at` descending.
#[derive(Debug, Clone, Default)]
pub struct MentionFilter {
    pub article_id: Option<EntityId>,
    pub symbol: Option<String>,
    pub min_sentiment: Option<f32>,
    pub max_sentiment: Option<f32>,
}

/// Everything the processing pipeline produced for one article. Applied in
/// a single transactional unit by [`NewsStore::article_apply_processing`].
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub summary: String,
    pub sentiment_score: f32,
    pub embedding: Vec<f32>,
    /// Category names with classifier confidence; categories are created
    /// on first sight and links upserted.
    pub categories: Vec<(String, f32)>,
    /// Re-scored sentiment per existing mention of the article. Mentions
    /// not listed keep their score; unknown ids are ignored.
    pub mention_scores: Vec<(EntityId, f32)>,
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Persistent entity store for the news domain.
///
/// Implementations must be thread-safe. Uniqueness constraints: article
/// `url`, category `name`, role `name`, user `email`, one mention per
/// (article, symbol), one link per (article, category), one assignment per
/// (user, role).
#[async_trait]
pub trait NewsStore: Send + Sync {
    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    async fn source_create(&self, source: NewSource) -> StoreResult<NewsSource>;
    async fn source_get(&self, id: EntityId) -> StoreResult<NewsSource>;
    /// List sources, optionally restricted by `active`.
    async fn source_list(&self, active: Option<bool>) -> StoreResult<Vec<NewsSource>>;
    async fn source_update(&self, id: EntityId, update: SourceUpdate) -> StoreResult<NewsSource>;
    /// Delete a source and cascade to its articles (and their mentions and
    /// category links).
    async fn source_delete(&self, id: EntityId) -> StoreResult<()>;

    // ------------------------------------------------------------------
    // Articles
    // ------------------------------------------------------------------

    async fn article_create(&self, article: NewArticle) -> StoreResult<NewsArticle>;
    async fn article_get(&self, id: EntityId) -> StoreResult<NewsArticle>;
    async fn article_get_by_url(&self, url: &str) -> StoreResult<Option<NewsArticle>>;
    async fn article_list(&self, filter: &ArticleFilter) -> StoreResult<Vec<NewsArticle>>;
    async fn article_update(&self, id: EntityId, update: ArticleUpdate) -> StoreResult<NewsArticle>;
    /// Delete an article and cascade to its mentions and category links.
    async fn article_delete(&self, id: EntityId) -> StoreResult<()>;

    /// Create or update an article keyed by `url`, plus get-or-create its
    /// stock mentions, as one all-or-nothing unit. Returns the article, its
    /// mentions for the given seeds, and whether the article was created.
    async fn article_upsert_with_mentions(
        &self,
        article: NewArticle,
        mentions: &[MentionSeed],
    ) -> StoreResult<(NewsArticle, Vec<StockMention>, bool)>;

    /// Persist a [`ProcessingOutcome`] and mark the article processed, as
    /// one all-or-nothing unit.
    async fn article_apply_processing(
        &self,
        id: EntityId,
        outcome: ProcessingOutcome,
    ) -> StoreResult<NewsArticle>;

    /// Delete articles published before the cutoff. Returns the count.
    async fn article_delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    /// Unprocessed articles, newest first, capped at `limit`.
    async fn article_list_unprocessed(&self, limit: usize) -> StoreResult<Vec<NewsArticle>>;

    // ------------------------------------------------------------------
    // Stock mentions
    // ------------------------------------------------------------------

    async fn mention_create(&self, mention: NewMention) -> StoreResult<StockMention>;
    async fn mention_get(&self, id: EntityId) -> StoreResult<StockMention>;
    async fn mention_list(&self, filter: &MentionFilter) -> StoreResult<Vec<StockMention>>;
    async fn mention_update(&self, id: EntityId, update: MentionUpdate)
        -> StoreResult<StockMention>;
    async fn mention_delete(&self, id: EntityId) -> StoreResult<()>;
    async fn mention_get_or_create(
        &self,
        article_id: EntityId,
        symbol: &str,
        context: Option<&str>,
    ) -> StoreResult<(StockMention, bool)>;

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    async fn category_create(&self, category: NewCategory) -> StoreResult<NewsCategory>;
    async fn category_get(&self, id: EntityId) -> StoreResult<NewsCategory>;
    async fn category_get_by_name(&self, name: &str) -> StoreResult<Option<NewsCategory>>;
    async fn category_list(&self) -> StoreResult<Vec<NewsCategory>>;
    async fn category_update(
        &self,
        id: EntityId,
        update: CategoryUpdate,
    ) -> StoreResult<NewsCategory>;
    /// Delete a category and cascade to its article links.
    async fn category_delete(&self, id: EntityId) -> StoreResult<()>;
    async fn category_get_or_create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<(NewsCategory, bool)>;

    // ------------------------------------------------------------------
    // Article-category links
    // ------------------------------------------------------------------

    async fn link_create(
        &self,
        article_id: EntityId,
        category_id: EntityId,
        confidence: f32,
    ) -> StoreResult<ArticleCategory>;
    async fn link_get(&self, id: EntityId) -> StoreResult<ArticleCategory>;
    /// Links, ordered by confidence descending, optionally for one article.
    async fn link_list(&self, article_id: Option<EntityId>) -> StoreResult<Vec<ArticleCategory>>;
    async fn link_update(&self, id: EntityId, confidence: f32) -> StoreResult<ArticleCategory>;
    async fn link_delete(&self, id: EntityId) -> StoreResult<()>;
    async fn link_get_or_create(
        &self,
        article_id: EntityId,
        category_id: EntityId,
        confidence: f32,
    ) -> StoreResult<(ArticleCategory, bool)>;

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Create a user and their empty profile.
    async fn user_create(&self, user: NewUser) -> StoreResult<User>;
    async fn user_get(&self, id: EntityId) -> StoreResult<User>;
    async fn user_get_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn user_list(&self) -> StoreResult<Vec<User>>;
    async fn user_update(&self, id: EntityId, update: UserUpdate) -> StoreResult<User>;
    /// Delete a user, their profile, and their role assignments. Grants
    /// created by this user keep existing with `created_by` cleared.
    async fn user_delete(&self, id: EntityId) -> StoreResult<()>;
    async fn profile_get(&self, user_id: EntityId) -> StoreResult<UserProfile>;
    async fn profile_update(
        &self,
        user_id: EntityId,
        update: ProfileUpdate,
    ) -> StoreResult<UserProfile>;

    // ------------------------------------------------------------------
    // Roles and assignments
    // ------------------------------------------------------------------

    async fn role_create(&self, role: NewRole) -> StoreResult<UserRole>;
    async fn role_get(&self, id: EntityId) -> StoreResult<UserRole>;
    async fn role_list(&self) -> StoreResult<Vec<UserRole>>;
    async fn role_update(&self, id: EntityId, update: RoleUpdate) -> StoreResult<UserRole>;
    /// Delete a role and cascade to its assignments.
    async fn role_delete(&self, id: EntityId) -> StoreResult<()>;
    async fn assignment_create(
        &self,
        user_id: EntityId,
        role_id: EntityId,
        created_by: Option<EntityId>,
    ) -> StoreResult<UserRoleAssignment>;
    async fn assignment_get(&self, id: EntityId) -> StoreResult<UserRoleAssignment>;
    async fn assignment_list(
        &self,
        user_id: Option<EntityId>,
    ) -> StoreResult<Vec<UserRoleAssignment>>;
    async fn assignment_delete(&self, id: EntityId) -> StoreResult<()>;
}
