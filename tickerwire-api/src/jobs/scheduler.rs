//! Job Scheduler
//!
//! One task drives three timers: hourly ingestion of every active source,
//! daily cleanup of articles older than the retention window, and periodic
//! reprocessing of unprocessed articles in batches. A watch channel stops
//! the loop on shutdown.
//!
//! Per-run errors are logged and counted; the scheduler itself never dies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use tickerwire_core::config::{CacheConfig, JobsConfig};
use tickerwire_storage::{KeyValueCache, NewsStore};

use crate::ingest::{process_article, IngestService};
use crate::providers::MlProvider;

// ============================================================================
// METRICS
// ============================================================================

/// Counters exported by the job scheduler.
#[derive(Debug, Default)]
pub struct JobMetrics {
    pub ingest_runs: AtomicU64,
    pub articles_ingested: AtomicU64,
    pub ingest_errors: AtomicU64,
    pub cleanup_runs: AtomicU64,
    pub articles_deleted: AtomicU64,
    pub cleanup_errors: AtomicU64,
    pub reprocess_runs: AtomicU64,
    pub articles_processed: AtomicU64,
    pub reprocess_errors: AtomicU64,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> JobMetricsSnapshot {
        JobMetricsSnapshot {
            ingest_runs: self.ingest_runs.load(Ordering::Relaxed),
            articles_ingested: self.articles_ingested.load(Ordering::Relaxed),
            ingest_errors: self.ingest_errors.load(Ordering::Relaxed),
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
            articles_deleted: self.articles_deleted.load(Ordering::Relaxed),
            cleanup_errors: self.cleanup_errors.load(Ordering::Relaxed),
            reprocess_runs: self.reprocess_runs.load(Ordering::Relaxed),
            articles_processed: self.articles_processed.load(Ordering::Relaxed),
            reprocess_errors: self.reprocess_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`JobMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobMetricsSnapshot {
    pub ingest_runs: u64,
    pub articles_ingested: u64,
    pub ingest_errors: u64,
    pub cleanup_runs: u64,
    pub articles_deleted: u64,
    pub cleanup_errors: u64,
    pub reprocess_runs: u64,
    pub articles_processed: u64,
    pub reprocess_errors: u64,
}

// ============================================================================
// SCHEDULER TASK
// ============================================================================

/// Dependencies for the background jobs task.
pub struct JobDeps {
    pub store: Arc<dyn NewsStore>,
    pub cache: Arc<dyn KeyValueCache>,
    pub ml: Arc<dyn MlProvider>,
    pub ingest: Arc<IngestService>,
    pub cache_config: CacheConfig,
}

/// Run the scheduled jobs until the shutdown channel flips to true.
/// Returns the metrics handle so callers can inspect counters after
/// shutdown.
pub async fn background_jobs_task(
    deps: JobDeps,
    config: JobsConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<JobMetrics> {
    let metrics = Arc::new(JobMetrics::new());
    if !config.enabled {
        tracing::info!("Background jobs disabled");
        return metrics;
    }

    tracing::info!(
        ingest_interval_secs = config.ingest_interval.as_secs(),
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        reprocess_interval_secs = config.reprocess_interval.as_secs(),
        "Starting background jobs"
    );

    let mut ingest_interval = tokio::time::interval(config.ingest_interval);
    let mut cleanup_interval = tokio::time::interval(config.cleanup_interval);
    let mut reprocess_interval = tokio::time::interval(config.reprocess_interval);
    ingest_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    reprocess_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Background jobs shutting down");
                    break;
                }
            }
            _ = ingest_interval.tick() => {
                run_ingest(&deps, &config, &metrics).await;
            }
            _ = cleanup_interval.tick() => {
                run_cleanup(&deps, &config, &metrics).await;
            }
            _ = reprocess_interval.tick() => {
                run_reprocess(&deps, &config, &metrics).await;
            }
        }
    }

    metrics
}

async fn run_ingest(deps: &JobDeps, config: &JobsConfig, metrics: &JobMetrics) {
    metrics.ingest_runs.fetch_add(1, Ordering::Relaxed);
    match deps.ingest.ingest_all_active().await {
        Ok(report) => {
            metrics
                .articles_ingested
                .fetch_add(report.articles_created + report.articles_updated, Ordering::Relaxed);
            metrics
                .ingest_errors
                .fetch_add(report.failures, Ordering::Relaxed);
            tracing::info!(
                sources = report.sources,
                created = report.articles_created,
                updated = report.articles_updated,
                failures = report.failures,
                "Scheduled ingestion complete"
            );
            if report.articles_created + report.articles_updated > 0 {
                // Newly ingested articles get enriched in the same run.
                process_batch(deps, config.reprocess_batch, metrics).await;
                invalidate_article_caches(deps).await;
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Scheduled ingestion failed");
            metrics.ingest_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

async fn run_cleanup(deps: &JobDeps, config: &JobsConfig, metrics: &JobMetrics) {
    metrics.cleanup_runs.fetch_add(1, Ordering::Relaxed);
    let cutoff = chrono::Utc::now() - chrono::Duration::days(config.cleanup_max_age_days);
    match deps.store.article_delete_older_than(cutoff).await {
        Ok(deleted) => {
            metrics.articles_deleted.fetch_add(deleted, Ordering::Relaxed);
            if deleted > 0 {
                invalidate_article_caches(deps).await;
            }
            tracing::info!(deleted, cutoff = %cutoff, "Article cleanup complete");
        }
        Err(e) => {
            tracing::error!(error = %e, "Article cleanup failed");
            metrics.cleanup_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

async fn run_reprocess(deps: &JobDeps, config: &JobsConfig, metrics: &JobMetrics) {
    metrics.reprocess_runs.fetch_add(1, Ordering::Relaxed);
    let processed = process_batch(deps, config.reprocess_batch, metrics).await;
    if processed > 0 {
        invalidate_article_caches(deps).await;
    }
}

/// Enrich up to `limit` unprocessed articles. Per-article failures are
/// logged and counted; the batch keeps going.
async fn process_batch(deps: &JobDeps, limit: usize, metrics: &JobMetrics) -> u64 {
    let batch = match deps.store.article_list_unprocessed(limit).await {
        Ok(batch) => batch,
        Err(e) => {
            tracing::error!(error = %e, "Listing unprocessed articles failed");
            metrics.reprocess_errors.fetch_add(1, Ordering::Relaxed);
            return 0;
        }
    };

    let mut processed = 0u64;
    for article in &batch {
        match process_article(deps.store.as_ref(), deps.ml.as_ref(), article.article_id).await {
            Ok(_) => processed += 1,
            Err(e) => {
                tracing::error!(
                    article_id = %article.article_id,
                    error = %e,
                    "Processing article failed"
                );
                metrics.reprocess_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    metrics
        .articles_processed
        .fetch_add(processed, Ordering::Relaxed);
    if !batch.is_empty() {
        tracing::info!(batch = batch.len(), processed, "Processing pass complete");
    }
    processed
}

/// Jobs mutate articles and mentions outside the HTTP path, so the
/// response cache invalidation middleware never sees it. Drop those
/// entries here.
async fn invalidate_article_caches(deps: &JobDeps) {
    for collection in ["articles", "stock-mentions", "categories", "article-categories"] {
        let pattern = format!(
            "{}:GET:/api/v1/{}*",
            deps.cache_config.key_prefix, collection
        );
        let keys = deps.cache.keys(&pattern).await;
        if !keys.is_empty() {
            deps.cache.delete_many(&keys).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tickerwire_core::config::IngestConfig;
    use tickerwire_core::error::IngestError;
    use tickerwire_storage::{
        InMemoryCache, MemoryStore, MentionSeed, NewArticle, NewSource,
    };

    use crate::ingest::ContentFetcher;
    use crate::providers::LexiconAnalyzer;

    /// Fetcher that always fails; ingestion runs still complete.
    struct OfflineFetcher;

    #[async_trait]
    impl ContentFetcher for OfflineFetcher {
        async fn fetch(&self, url: &str) -> Result<String, IngestError> {
            Err(IngestError::FetchFailed {
                url: url.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    fn deps(store: Arc<MemoryStore>, cache: Arc<InMemoryCache>) -> JobDeps {
        let ingest = Arc::new(IngestService::new(
            store.clone(),
            Arc::new(OfflineFetcher),
            IngestConfig::default(),
        ));
        JobDeps {
            store,
            cache,
            ml: Arc::new(LexiconAnalyzer::new()),
            ingest,
            cache_config: CacheConfig::default(),
        }
    }

    fn fast_config() -> JobsConfig {
        JobsConfig {
            enabled: true,
            ingest_interval: Duration::from_millis(10),
            cleanup_interval: Duration::from_millis(10),
            cleanup_max_age_days: 30,
            reprocess_interval: Duration::from_millis(10),
            reprocess_batch: 100,
        }
    }

    async fn run_briefly(deps: JobDeps, config: JobsConfig) -> Arc<JobMetrics> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(background_jobs_task(deps, config, shutdown_rx));
        tokio::time::sleep(Duration::from_millis(40)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap()
    }

    #[tokio::test]
    async fn test_disabled_jobs_return_immediately() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let (_tx, rx) = watch::channel(false);
        let mut config = fast_config();
        config.enabled = false;

        let metrics = background_jobs_task(deps(store, cache), config, rx).await;
        assert_eq!(metrics.snapshot(), JobMetricsSnapshot::default());
    }

    #[tokio::test]
    async fn test_scheduler_runs_all_jobs_and_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let metrics = run_briefly(deps(store, cache), fast_config()).await;

        let snapshot = metrics.snapshot();
        assert!(snapshot.ingest_runs >= 1);
        assert!(snapshot.cleanup_runs >= 1);
        assert!(snapshot.reprocess_runs >= 1);
    }

    #[tokio::test]
    async fn test_cleanup_deletes_stale_articles() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let source = store
            .source_create(NewSource {
                name: "Example".into(),
                url: "https://news.example".into(),
                description: None,
                active: false,
            })
            .await
            .unwrap();
        store
            .article_create(NewArticle {
                source_id: source.source_id,
                title: "Old".into(),
                content: "old body".into(),
                url: "https://news.example/old".into(),
                author: None,
                published_at: chrono::Utc::now() - chrono::Duration::days(90),
            })
            .await
            .unwrap();
        store
            .article_create(NewArticle {
                source_id: source.source_id,
                title: "Fresh".into(),
                content: "fresh body".into(),
                url: "https://news.example/fresh".into(),
                author: None,
                published_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let metrics = run_briefly(deps(store.clone(), cache), fast_config()).await;
        assert!(metrics.snapshot().articles_deleted >= 1);
        let remaining = store.article_list(&Default::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Fresh");
    }

    #[tokio::test]
    async fn test_reprocess_enriches_unprocessed_articles() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let source = store
            .source_create(NewSource {
                name: "Example".into(),
                url: "https://news.example".into(),
                description: None,
                active: false,
            })
            .await
            .unwrap();
        let (article, _, _) = store
            .article_upsert_with_mentions(
                NewArticle {
                    source_id: source.source_id,
                    title: "Apple Earnings".into(),
                    content: "Apple reported strong quarterly earnings growth.".into(),
                    url: "https://news.example/aapl".into(),
                    author: None,
                    published_at: chrono::Utc::now(),
                },
                &[MentionSeed {
                    symbol: "AAPL".into(),
                    context: None,
                }],
            )
            .await
            .unwrap();

        let metrics = run_briefly(deps(store.clone(), cache), fast_config()).await;
        assert!(metrics.snapshot().articles_processed >= 1);
        let processed = store.article_get(article.article_id).await.unwrap();
        assert!(processed.is_processed);
        assert!(processed.summary.is_some());
    }

    #[tokio::test]
    async fn test_jobs_invalidate_article_cache_entries() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let source = store
            .source_create(NewSource {
                name: "Example".into(),
                url: "https://news.example".into(),
                description: None,
                active: false,
            })
            .await
            .unwrap();
        store
            .article_create(NewArticle {
                source_id: source.source_id,
                title: "Old".into(),
                content: "old body".into(),
                url: "https://news.example/old".into(),
                author: None,
                published_at: chrono::Utc::now() - chrono::Duration::days(90),
            })
            .await
            .unwrap();
        cache
            .set(
                "tickerwire:GET:/api/v1/articles:anonymous",
                "[]".to_string(),
                Duration::from_secs(300),
            )
            .await;

        run_briefly(deps(store, cache.clone()), fast_config()).await;
        assert_eq!(
            cache.get("tickerwire:GET:/api/v1/articles:anonymous").await,
            None
        );
    }
}
