//! In-memory `NewsStore` implementation.
//!
//! All state lives behind one `RwLock`; every operation takes a single
//! guard, so multi-step operations are naturally all-or-nothing as long as
//! validation happens before the first mutation. A poisoned lock surfaces
//! as `StorageError::LockPoisoned`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tickerwire_core::entities::{
    new_entity_id, ArticleCategory, EntityId, EntityKind, NewsArticle, NewsCategory, NewsSource,
    StockMention, User, UserProfile, UserRole, UserRoleAssignment,
};
use tickerwire_core::error::StorageError;

use super::{
    ArticleFilter, ArticleUpdate, CategoryUpdate, MentionFilter, MentionSeed, MentionUpdate,
    NewArticle, NewCategory, NewMention, NewRole, NewSource, NewUser, NewsStore,
    ProcessingOutcome, ProfileUpdate, RoleUpdate, SourceUpdate, StoreResult, UserUpdate,
};

#[derive(Debug, Default)]
struct StoreInner {
    sources: HashMap<EntityId, NewsSource>,
    articles: HashMap<EntityId, NewsArticle>,
    mentions: HashMap<EntityId, StockMention>,
    categories: HashMap<EntityId, NewsCategory>,
    links: HashMap<EntityId, ArticleCategory>,
    users: HashMap<EntityId, User>,
    /// Keyed by user id; each user has exactly one profile.
    profiles: HashMap<EntityId, UserProfile>,
    roles: HashMap<EntityId, UserRole>,
    assignments: HashMap<EntityId, UserRoleAssignment>,
}

/// Thread-safe in-memory entity store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreInner>> {
        self.inner.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreInner>> {
        self.inner.write().map_err(|_| StorageError::LockPoisoned)
    }
}

fn not_found(kind: EntityKind, id: EntityId) -> StorageError {
    StorageError::NotFound { kind, id }
}

fn duplicate(kind: EntityKind, field: &str, value: &str) -> StorageError {
    StorageError::DuplicateKey {
        kind,
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn by_published_desc(a: &NewsArticle, b: &NewsArticle) -> Ordering {
    b.published_at.cmp(&a.published_at)
}

impl StoreInner {
    fn require_source(&self, id: EntityId) -> StoreResult<()> {
        if self.sources.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::MissingReference {
                kind: EntityKind::Source,
                id,
            })
        }
    }

    fn require_article(&self, id: EntityId) -> StoreResult<()> {
        if self.articles.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::MissingReference {
                kind: EntityKind::Article,
                id,
            })
        }
    }

    fn article_id_by_url(&self, url: &str) -> Option<EntityId> {
        self.articles
            .values()
            .find(|a| a.url == url)
            .map(|a| a.article_id)
    }

    fn insert_article(&mut self, article: NewArticle) -> NewsArticle {
        let now = Utc::now();
        let record = NewsArticle {
            article_id: new_entity_id(),
            source_id: article.source_id,
            title: article.title,
            content: article.content,
            url: article.url,
            author: article.author,
            published_at: article.published_at,
            summary: None,
            sentiment_score: None,
            embedding: None,
            is_processed: false,
            created_at: now,
            updated_at: now,
        };
        self.articles.insert(record.article_id, record.clone());
        record
    }

    fn upsert_mention(
        &mut self,
        article_id: EntityId,
        symbol: &str,
        context: Option<&str>,
    ) -> (StockMention, bool) {
        if let Some(existing) = self
            .mentions
            .values()
            .find(|m| m.article_id == article_id && m.symbol == symbol)
            .cloned()
        {
            return (existing, false);
        }
        let now = Utc::now();
        let mention = StockMention {
            mention_id: new_entity_id(),
            article_id,
            symbol: symbol.to_string(),
            context: context.map(|c| c.to_string()),
            sentiment_score: None,
            created_at: now,
            updated_at: now,
        };
        self.mentions.insert(mention.mention_id, mention.clone());
        (mention, true)
    }

    fn upsert_category(&mut self, name: &str, description: Option<&str>) -> (NewsCategory, bool) {
        if let Some(existing) = self.categories.values().find(|c| c.name == name).cloned() {
            return (existing, false);
        }
        let now = Utc::now();
        let category = NewsCategory {
            category_id: new_entity_id(),
            name: name.to_string(),
            description: description.map(|d| d.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.categories.insert(category.category_id, category.clone());
        (category, true)
    }

    fn upsert_link(
        &mut self,
        article_id: EntityId,
        category_id: EntityId,
        confidence: f32,
    ) -> (ArticleCategory, bool) {
        if let Some(id) = self
            .links
            .values()
            .find(|l| l.article_id == article_id && l.category_id == category_id)
            .map(|l| l.link_id)
        {
            // Known pair: refresh the confidence.
            let link = self.links.get_mut(&id);
            if let Some(link) = link {
                link.confidence = confidence;
                return (link.clone(), false);
            }
        }
        let link = ArticleCategory {
            link_id: new_entity_id(),
            article_id,
            category_id,
            confidence,
            created_at: Utc::now(),
        };
        self.links.insert(link.link_id, link.clone());
        (link, true)
    }

    fn delete_article_cascade(&mut self, id: EntityId) {
        self.articles.remove(&id);
        self.mentions.retain(|_, m| m.article_id != id);
        self.links.retain(|_, l| l.article_id != id);
    }

    fn article_matches(&self, article: &NewsArticle, filter: &ArticleFilter) -> bool {
        if let Some(source_id) = filter.source_id {
            if article.source_id != source_id {
                return false;
            }
        }
        if let Some(is_processed) = filter.is_processed {
            if article.is_processed != is_processed {
                return false;
            }
        }
        if let Some(min) = filter.min_sentiment {
            match article.sentiment_score {
                Some(score) if score >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = filter.max_sentiment {
            match article.sentiment_score {
                Some(score) if score <= max => {}
                _ => return false,
            }
        }
        if let Some(symbol) = &filter.symbol {
            let mentioned = self
                .mentions
                .values()
                .any(|m| m.article_id == article.article_id && &m.symbol == symbol);
            if !mentioned {
                return false;
            }
        }
        if let Some(category) = &filter.category {
            let category_id = self
                .categories
                .values()
                .find(|c| &c.name == category)
                .map(|c| c.category_id);
            let linked = category_id.is_some_and(|cid| {
                self.links
                    .values()
                    .any(|l| l.article_id == article.article_id && l.category_id == cid)
            });
            if !linked {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    async fn source_create(&self, source: NewSource) -> StoreResult<NewsSource> {
        let mut inner = self.write()?;
        let now = Utc::now();
        let record = NewsSource {
            source_id: new_entity_id(),
            name: source.name,
            url: source.url,
            description: source.description,
            active: source.active,
            created_at: now,
            updated_at: now,
        };
        inner.sources.insert(record.source_id, record.clone());
        Ok(record)
    }

    async fn source_get(&self, id: EntityId) -> StoreResult<NewsSource> {
        let inner = self.read()?;
        inner
            .sources
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Source, id))
    }

    async fn source_list(&self, active: Option<bool>) -> StoreResult<Vec<NewsSource>> {
        let inner = self.read()?;
        let mut sources: Vec<NewsSource> = inner
            .sources
            .values()
            .filter(|s| active.is_none_or(|a| s.active == a))
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn source_update(&self, id: EntityId, update: SourceUpdate) -> StoreResult<NewsSource> {
        let mut inner = self.write()?;
        let source = inner
            .sources
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Source, id))?;
        if let Some(name) = update.name {
            source.name = name;
        }
        if let Some(url) = update.url {
            source.url = url;
        }
        if let Some(description) = update.description {
            source.description = Some(description);
        }
        if let Some(active) = update.active {
            source.active = active;
        }
        source.updated_at = Utc::now();
        Ok(source.clone())
    }

    async fn source_delete(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.sources.remove(&id).is_none() {
            return Err(not_found(EntityKind::Source, id));
        }
        let orphaned: Vec<EntityId> = inner
            .articles
            .values()
            .filter(|a| a.source_id == id)
            .map(|a| a.article_id)
            .collect();
        for article_id in orphaned {
            inner.delete_article_cascade(article_id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Articles
    // ------------------------------------------------------------------

    async fn article_create(&self, article: NewArticle) -> StoreResult<NewsArticle> {
        let mut inner = self.write()?;
        inner.require_source(article.source_id)?;
        if inner.article_id_by_url(&article.url).is_some() {
            return Err(duplicate(EntityKind::Article, "url", &article.url));
        }
        Ok(inner.insert_article(article))
    }

    async fn article_get(&self, id: EntityId) -> StoreResult<NewsArticle> {
        let inner = self.read()?;
        inner
            .articles
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Article, id))
    }

    async fn article_get_by_url(&self, url: &str) -> StoreResult<Option<NewsArticle>> {
        let inner = self.read()?;
        Ok(inner.articles.values().find(|a| a.url == url).cloned())
    }

    async fn article_list(&self, filter: &ArticleFilter) -> StoreResult<Vec<NewsArticle>> {
        let inner = self.read()?;
        let mut articles: Vec<NewsArticle> = inner
            .articles
            .values()
            .filter(|a| inner.article_matches(a, filter))
            .cloned()
            .collect();
        articles.sort_by(by_published_desc);
        if let Some(limit) = filter.limit {
            articles.truncate(limit);
        }
        Ok(articles)
    }

    async fn article_update(
        &self,
        id: EntityId,
        update: ArticleUpdate,
    ) -> StoreResult<NewsArticle> {
        let mut inner = self.write()?;
        let article = inner
            .articles
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Article, id))?;
        if let Some(title) = update.title {
            article.title = title;
        }
        if let Some(content) = update.content {
            article.content = content;
        }
        if let Some(author) = update.author {
            article.author = Some(author);
        }
        if let Some(published_at) = update.published_at {
            article.published_at = published_at;
        }
        article.updated_at = Utc::now();
        Ok(article.clone())
    }

    async fn article_delete(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        if !inner.articles.contains_key(&id) {
            return Err(not_found(EntityKind::Article, id));
        }
        inner.delete_article_cascade(id);
        Ok(())
    }

    async fn article_upsert_with_mentions(
        &self,
        article: NewArticle,
        mentions: &[MentionSeed],
    ) -> StoreResult<(NewsArticle, Vec<StockMention>, bool)> {
        let mut inner = self.write()?;
        // Validate up front so nothing lands on failure.
        inner.require_source(article.source_id)?;

        let (record, created) = match inner.article_id_by_url(&article.url) {
            Some(existing_id) => {
                let existing = inner
                    .articles
                    .get_mut(&existing_id)
                    .ok_or_else(|| not_found(EntityKind::Article, existing_id))?;
                existing.source_id = article.source_id;
                existing.title = article.title;
                existing.content = article.content;
                existing.author = article.author;
                existing.published_at = article.published_at;
                existing.updated_at = Utc::now();
                (existing.clone(), false)
            }
            None => (inner.insert_article(article), true),
        };

        let mut stored = Vec::with_capacity(mentions.len());
        for seed in mentions {
            let (mention, _) =
                inner.upsert_mention(record.article_id, &seed.symbol, seed.context.as_deref());
            stored.push(mention);
        }
        Ok((record, stored, created))
    }

    async fn article_apply_processing(
        &self,
        id: EntityId,
        outcome: ProcessingOutcome,
    ) -> StoreResult<NewsArticle> {
        let mut inner = self.write()?;
        if !inner.articles.contains_key(&id) {
            return Err(not_found(EntityKind::Article, id));
        }

        for (name, confidence) in &outcome.categories {
            let (category, _) = inner.upsert_category(name, None);
            inner.upsert_link(id, category.category_id, *confidence);
        }
        for (mention_id, score) in &outcome.mention_scores {
            if let Some(mention) = inner.mentions.get_mut(mention_id) {
                if mention.article_id == id {
                    mention.sentiment_score = Some(*score);
                    mention.updated_at = Utc::now();
                }
            }
        }

        let article = inner
            .articles
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Article, id))?;
        article.summary = Some(outcome.summary);
        article.sentiment_score = Some(outcome.sentiment_score);
        article.embedding = Some(outcome.embedding);
        article.is_processed = true;
        article.updated_at = Utc::now();
        Ok(article.clone())
    }

    async fn article_delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.write()?;
        let stale: Vec<EntityId> = inner
            .articles
            .values()
            .filter(|a| a.published_at < cutoff)
            .map(|a| a.article_id)
            .collect();
        let count = stale.len() as u64;
        for id in stale {
            inner.delete_article_cascade(id);
        }
        Ok(count)
    }

    async fn article_list_unprocessed(&self, limit: usize) -> StoreResult<Vec<NewsArticle>> {
        let inner = self.read()?;
        let mut articles: Vec<NewsArticle> = inner
            .articles
            .values()
            .filter(|a| !a.is_processed)
            .cloned()
            .collect();
        articles.sort_by(by_published_desc);
        articles.truncate(limit);
        Ok(articles)
    }

    // ------------------------------------------------------------------
    // Stock mentions
    // ------------------------------------------------------------------

    async fn mention_create(&self, mention: NewMention) -> StoreResult<StockMention> {
        let mut inner = self.write()?;
        inner.require_article(mention.article_id)?;
        let exists = inner
            .mentions
            .values()
            .any(|m| m.article_id == mention.article_id && m.symbol == mention.symbol);
        if exists {
            return Err(duplicate(EntityKind::StockMention, "symbol", &mention.symbol));
        }
        let now = Utc::now();
        let record = StockMention {
            mention_id: new_entity_id(),
            article_id: mention.article_id,
            symbol: mention.symbol,
            context: mention.context,
            sentiment_score: mention.sentiment_score,
            created_at: now,
            updated_at: now,
        };
        inner.mentions.insert(record.mention_id, record.clone());
        Ok(record)
    }

    async fn mention_get(&self, id: EntityId) -> StoreResult<StockMention> {
        let inner = self.read()?;
        inner
            .mentions
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::StockMention, id))
    }

    async fn mention_list(&self, filter: &MentionFilter) -> StoreResult<Vec<StockMention>> {
        let inner = self.read()?;
        let mut mentions: Vec<StockMention> = inner
            .mentions
            .values()
            .filter(|m| {
                filter.article_id.is_none_or(|id| m.article_id == id)
                    && filter.symbol.as_ref().is_none_or(|s| &m.symbol == s)
                    && filter
                        .min_sentiment
                        .is_none_or(|min| m.sentiment_score.is_some_and(|s| s >= min))
                    && filter
                        .max_sentiment
                        .is_none_or(|max| m.sentiment_score.is_some_and(|s| s <= max))
            })
            .cloned()
            .collect();
        mentions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mentions)
    }

    async fn mention_update(
        &self,
        id: EntityId,
        update: MentionUpdate,
    ) -> StoreResult<StockMention> {
        let mut inner = self.write()?;
        let mention = inner
            .mentions
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::StockMention, id))?;
        if let Some(context) = update.context {
            mention.context = Some(context);
        }
        if let Some(score) = update.sentiment_score {
            mention.sentiment_score = Some(score);
        }
        mention.updated_at = Utc::now();
        Ok(mention.clone())
    }

    async fn mention_delete(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner
            .mentions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(EntityKind::StockMention, id))
    }

    async fn mention_get_or_create(
        &self,
        article_id: EntityId,
        symbol: &str,
        context: Option<&str>,
    ) -> StoreResult<(StockMention, bool)> {
        let mut inner = self.write()?;
        inner.require_article(article_id)?;
        Ok(inner.upsert_mention(article_id, symbol, context))
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    async fn category_create(&self, category: NewCategory) -> StoreResult<NewsCategory> {
        let mut inner = self.write()?;
        if inner.categories.values().any(|c| c.name == category.name) {
            return Err(duplicate(EntityKind::Category, "name", &category.name));
        }
        let (record, _) = inner.upsert_category(&category.name, category.description.as_deref());
        Ok(record)
    }

    async fn category_get(&self, id: EntityId) -> StoreResult<NewsCategory> {
        let inner = self.read()?;
        inner
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Category, id))
    }

    async fn category_get_by_name(&self, name: &str) -> StoreResult<Option<NewsCategory>> {
        let inner = self.read()?;
        Ok(inner.categories.values().find(|c| c.name == name).cloned())
    }

    async fn category_list(&self) -> StoreResult<Vec<NewsCategory>> {
        let inner = self.read()?;
        let mut categories: Vec<NewsCategory> = inner.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn category_update(
        &self,
        id: EntityId,
        update: CategoryUpdate,
    ) -> StoreResult<NewsCategory> {
        let mut inner = self.write()?;
        if let Some(name) = &update.name {
            if inner
                .categories
                .values()
                .any(|c| &c.name == name && c.category_id != id)
            {
                return Err(duplicate(EntityKind::Category, "name", name));
            }
        }
        let category = inner
            .categories
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Category, id))?;
        if let Some(name) = update.name {
            category.name = name;
        }
        if let Some(description) = update.description {
            category.description = Some(description);
        }
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn category_delete(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.categories.remove(&id).is_none() {
            return Err(not_found(EntityKind::Category, id));
        }
        inner.links.retain(|_, l| l.category_id != id);
        Ok(())
    }

    async fn category_get_or_create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<(NewsCategory, bool)> {
        let mut inner = self.write()?;
        Ok(inner.upsert_category(name, description))
    }

    // ------------------------------------------------------------------
    // Article-category links
    // ------------------------------------------------------------------

    async fn link_create(
        &self,
        article_id: EntityId,
        category_id: EntityId,
        confidence: f32,
    ) -> StoreResult<ArticleCategory> {
        let mut inner = self.write()?;
        inner.require_article(article_id)?;
        if !inner.categories.contains_key(&category_id) {
            return Err(StorageError::MissingReference {
                kind: EntityKind::Category,
                id: category_id,
            });
        }
        let pair_exists = inner
            .links
            .values()
            .any(|l| l.article_id == article_id && l.category_id == category_id);
        if pair_exists {
            return Err(duplicate(
                EntityKind::ArticleCategory,
                "article_id,category_id",
                &format!("{article_id},{category_id}"),
            ));
        }
        let (link, _) = inner.upsert_link(article_id, category_id, confidence);
        Ok(link)
    }

    async fn link_get(&self, id: EntityId) -> StoreResult<ArticleCategory> {
        let inner = self.read()?;
        inner
            .links
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::ArticleCategory, id))
    }

    async fn link_list(&self, article_id: Option<EntityId>) -> StoreResult<Vec<ArticleCategory>> {
        let inner = self.read()?;
        let mut links: Vec<ArticleCategory> = inner
            .links
            .values()
            .filter(|l| article_id.is_none_or(|id| l.article_id == id))
            .cloned()
            .collect();
        links.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        Ok(links)
    }

    async fn link_update(&self, id: EntityId, confidence: f32) -> StoreResult<ArticleCategory> {
        let mut inner = self.write()?;
        let link = inner
            .links
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::ArticleCategory, id))?;
        link.confidence = confidence;
        Ok(link.clone())
    }

    async fn link_delete(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner
            .links
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(EntityKind::ArticleCategory, id))
    }

    async fn link_get_or_create(
        &self,
        article_id: EntityId,
        category_id: EntityId,
        confidence: f32,
    ) -> StoreResult<(ArticleCategory, bool)> {
        let mut inner = self.write()?;
        inner.require_article(article_id)?;
        if !inner.categories.contains_key(&category_id) {
            return Err(StorageError::MissingReference {
                kind: EntityKind::Category,
                id: category_id,
            });
        }
        Ok(inner.upsert_link(article_id, category_id, confidence))
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    async fn user_create(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.write()?;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(duplicate(EntityKind::User, "email", &user.email));
        }
        let now = Utc::now();
        let record = User {
            user_id: new_entity_id(),
            email: user.email,
            username: user.username,
            is_active: user.is_active,
            is_staff: user.is_staff,
            created_at: now,
            updated_at: now,
        };
        let profile = UserProfile {
            profile_id: new_entity_id(),
            user_id: record.user_id,
            bio: None,
            preferences: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(record.user_id, record.clone());
        inner.profiles.insert(record.user_id, profile);
        Ok(record)
    }

    async fn user_get(&self, id: EntityId) -> StoreResult<User> {
        let inner = self.read()?;
        inner
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::User, id))
    }

    async fn user_get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.read()?;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_list(&self) -> StoreResult<Vec<User>> {
        let inner = self.read()?;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn user_update(&self, id: EntityId, update: UserUpdate) -> StoreResult<User> {
        let mut inner = self.write()?;
        if let Some(email) = &update.email {
            if inner
                .users
                .values()
                .any(|u| &u.email == email && u.user_id != id)
            {
                return Err(duplicate(EntityKind::User, "email", email));
            }
        }
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::User, id))?;
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(username) = update.username {
            user.username = username;
        }
        if let Some(is_active) = update.is_active {
            user.is_active = is_active;
        }
        if let Some(is_staff) = update.is_staff {
            user.is_staff = is_staff;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn user_delete(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.users.remove(&id).is_none() {
            return Err(not_found(EntityKind::User, id));
        }
        inner.profiles.remove(&id);
        inner.assignments.retain(|_, a| a.user_id != id);
        for assignment in inner.assignments.values_mut() {
            if assignment.created_by == Some(id) {
                assignment.created_by = None;
            }
        }
        Ok(())
    }

    async fn profile_get(&self, user_id: EntityId) -> StoreResult<UserProfile> {
        let inner = self.read()?;
        inner
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::UserProfile, user_id))
    }

    async fn profile_update(
        &self,
        user_id: EntityId,
        update: ProfileUpdate,
    ) -> StoreResult<UserProfile> {
        let mut inner = self.write()?;
        let profile = inner
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| not_found(EntityKind::UserProfile, user_id))?;
        if let Some(bio) = update.bio {
            profile.bio = Some(bio);
        }
        if let Some(preferences) = update.preferences {
            profile.preferences = preferences;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    // ------------------------------------------------------------------
    // Roles and assignments
    // ------------------------------------------------------------------

    async fn role_create(&self, role: NewRole) -> StoreResult<UserRole> {
        let mut inner = self.write()?;
        if inner.roles.values().any(|r| r.name == role.name) {
            return Err(duplicate(EntityKind::Role, "name", &role.name));
        }
        let now = Utc::now();
        let record = UserRole {
            role_id: new_entity_id(),
            name: role.name,
            description: role.description,
            permissions: role.permissions,
            created_at: now,
            updated_at: now,
        };
        inner.roles.insert(record.role_id, record.clone());
        Ok(record)
    }

    async fn role_get(&self, id: EntityId) -> StoreResult<UserRole> {
        let inner = self.read()?;
        inner
            .roles
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Role, id))
    }

    async fn role_list(&self) -> StoreResult<Vec<UserRole>> {
        let inner = self.read()?;
        let mut roles: Vec<UserRole> = inner.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn role_update(&self, id: EntityId, update: RoleUpdate) -> StoreResult<UserRole> {
        let mut inner = self.write()?;
        if let Some(name) = &update.name {
            if inner.roles.values().any(|r| &r.name == name && r.role_id != id) {
                return Err(duplicate(EntityKind::Role, "name", name));
            }
        }
        let role = inner
            .roles
            .get_mut(&id)
            .ok_or_else(|| not_found(EntityKind::Role, id))?;
        if let Some(name) = update.name {
            role.name = name;
        }
        if let Some(description) = update.description {
            role.description = Some(description);
        }
        if let Some(permissions) = update.permissions {
            role.permissions = permissions;
        }
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn role_delete(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.roles.remove(&id).is_none() {
            return Err(not_found(EntityKind::Role, id));
        }
        inner.assignments.retain(|_, a| a.role_id != id);
        Ok(())
    }

    async fn assignment_create(
        &self,
        user_id: EntityId,
        role_id: EntityId,
        created_by: Option<EntityId>,
    ) -> StoreResult<UserRoleAssignment> {
        let mut inner = self.write()?;
        if !inner.users.contains_key(&user_id) {
            return Err(StorageError::MissingReference {
                kind: EntityKind::User,
                id: user_id,
            });
        }
        if !inner.roles.contains_key(&role_id) {
            return Err(StorageError::MissingReference {
                kind: EntityKind::Role,
                id: role_id,
            });
        }
        let pair_exists = inner
            .assignments
            .values()
            .any(|a| a.user_id == user_id && a.role_id == role_id);
        if pair_exists {
            return Err(duplicate(
                EntityKind::RoleAssignment,
                "user_id,role_id",
                &format!("{user_id},{role_id}"),
            ));
        }
        let record = UserRoleAssignment {
            assignment_id: new_entity_id(),
            user_id,
            role_id,
            created_by,
            created_at: Utc::now(),
        };
        inner.assignments.insert(record.assignment_id, record.clone());
        Ok(record)
    }

    async fn assignment_get(&self, id: EntityId) -> StoreResult<UserRoleAssignment> {
        let inner = self.read()?;
        inner
            .assignments
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::RoleAssignment, id))
    }

    async fn assignment_list(
        &self,
        user_id: Option<EntityId>,
    ) -> StoreResult<Vec<UserRoleAssignment>> {
        let inner = self.read()?;
        let mut assignments: Vec<UserRoleAssignment> = inner
            .assignments
            .values()
            .filter(|a| user_id.is_none_or(|id| a.user_id == id))
            .cloned()
            .collect();
        assignments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(assignments)
    }

    async fn assignment_delete(&self, id: EntityId) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner
            .assignments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(EntityKind::RoleAssignment, id))
    }
}
