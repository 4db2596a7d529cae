//! Tickerwire Storage - Cache and Entity Store
//!
//! Two seams live here: a key-value cache used for response caching and
//! throttle memoization, and the entity store backing the REST API. Both are
//! traits with in-memory implementations so the API and the background jobs
//! can run without external services.

pub mod cache;
pub mod store;

pub use cache::{glob_match, rate_limit_key, response_cache_key, InMemoryCache, KeyValueCache};
pub use store::{
    ArticleFilter, ArticleUpdate, CategoryUpdate, MemoryStore, MentionFilter, MentionSeed,
    MentionUpdate, NewArticle, NewCategory, NewMention, NewRole, NewSource, NewUser, NewsStore,
    ProcessingOutcome, ProfileUpdate, RoleUpdate, SourceUpdate, UserUpdate,
};
