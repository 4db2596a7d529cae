//! Shared Application State
//!
//! Bundles the store, cache, analysis provider, ingestion service, and
//! configuration for router assembly. Route modules pull out the pieces
//! they need into their own per-module state structs.

use std::sync::Arc;

use tickerwire_core::config::{CacheConfig, IngestConfig, ThrottleConfig};
use tickerwire_storage::{InMemoryCache, KeyValueCache, MemoryStore, NewsStore};

use crate::config::ApiConfig;
use crate::ingest::{HttpFetcher, IngestService};
use crate::providers::{LexiconAnalyzer, MlProvider};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NewsStore>,
    pub cache: Arc<dyn KeyValueCache>,
    pub ml: Arc<dyn MlProvider>,
    pub ingest: Arc<IngestService>,
    pub api_config: Arc<ApiConfig>,
    pub cache_config: CacheConfig,
    pub throttle_config: Arc<ThrottleConfig>,
}

impl AppState {
    /// Assemble state from explicit parts.
    pub fn new(
        store: Arc<dyn NewsStore>,
        cache: Arc<dyn KeyValueCache>,
        ml: Arc<dyn MlProvider>,
        ingest: Arc<IngestService>,
        api_config: ApiConfig,
        cache_config: CacheConfig,
        throttle_config: ThrottleConfig,
    ) -> Self {
        Self {
            store,
            cache,
            ml,
            ingest,
            api_config: Arc::new(api_config),
            cache_config,
            throttle_config: Arc::new(throttle_config),
        }
    }

    /// In-memory state from environment configuration. Used by the server
    /// binary and by integration tests.
    pub fn from_env() -> Self {
        let store: Arc<dyn NewsStore> = Arc::new(MemoryStore::new());
        let cache: Arc<dyn KeyValueCache> = Arc::new(InMemoryCache::new());
        let ml: Arc<dyn MlProvider> = Arc::new(LexiconAnalyzer::new());

        let ingest_config = IngestConfig::from_env();
        let ingest = Arc::new(IngestService::new(
            store.clone(),
            Arc::new(HttpFetcher::new(&ingest_config)),
            ingest_config,
        ));

        Self::new(
            store,
            cache,
            ml,
            ingest,
            ApiConfig::from_env(),
            CacheConfig::from_env(),
            ThrottleConfig::from_env(),
        )
    }
}
