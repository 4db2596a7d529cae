//! Ingestion Orchestration
//!
//! Walks a source index page, fetches the articles it links to, runs the
//! cleaning and validation pipeline, extracts stock mentions, and upserts
//! the results. Per-article failures are logged and counted; one bad page
//! never aborts a source run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tickerwire_core::config::IngestConfig;
use tickerwire_core::entities::NewsSource;
use tickerwire_core::error::IngestError;
use tickerwire_core::validate::{extract_stock_mentions, validate_article_data, ArticleInput};
use tickerwire_storage::{MentionSeed, NewArticle, NewsStore};

use super::fetch::{extract_article, extract_links, ContentFetcher};

/// Characters of surrounding text captured as mention context.
const CONTEXT_RADIUS: usize = 80;

// ============================================================================
// REPORT
// ============================================================================

/// Outcome counters for an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestReport {
    /// Sources walked.
    pub sources: u64,
    /// Articles created for the first time.
    pub articles_created: u64,
    /// Existing articles refreshed by URL.
    pub articles_updated: u64,
    /// Stock mentions recorded (new or re-seen).
    pub mentions: u64,
    /// Article pages that failed to fetch, extract, or validate.
    pub failures: u64,
}

impl IngestReport {
    fn merge(&mut self, other: &IngestReport) {
        self.sources += other.sources;
        self.articles_created += other.articles_created;
        self.articles_updated += other.articles_updated;
        self.mentions += other.mentions;
        self.failures += other.failures;
    }
}

// ============================================================================
// SERVICE
// ============================================================================

/// Ingestion service shared by route handlers and background jobs.
pub struct IngestService {
    store: Arc<dyn NewsStore>,
    fetcher: Arc<dyn ContentFetcher>,
    config: IngestConfig,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn NewsStore>,
        fetcher: Arc<dyn ContentFetcher>,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// Ingest a single source: fetch its index page, then fetch and upsert
    /// every linked article up to the configured cap.
    pub async fn ingest_source(&self, source: &NewsSource) -> Result<IngestReport, IngestError> {
        let index_html = self.fetcher.fetch(&source.url).await?;
        let links = extract_links(
            &index_html,
            &source.url,
            self.config.max_articles_per_source,
        );

        tracing::info!(
            source_id = %source.source_id,
            source_name = %source.name,
            links = links.len(),
            "Ingesting source"
        );

        let mut report = IngestReport {
            sources: 1,
            ..Default::default()
        };

        for link in links {
            match self.ingest_article_page(source, &link).await {
                Ok((created, mention_count)) => {
                    if created {
                        report.articles_created += 1;
                    } else {
                        report.articles_updated += 1;
                    }
                    report.mentions += mention_count;
                }
                Err(e) => {
                    tracing::warn!(url = %link, error = %e, "Article ingestion failed");
                    report.failures += 1;
                }
            }
        }

        tracing::info!(
            source_id = %source.source_id,
            created = report.articles_created,
            updated = report.articles_updated,
            mentions = report.mentions,
            failures = report.failures,
            "Source ingestion complete"
        );
        Ok(report)
    }

    /// Ingest every active source. Source-level failures are logged and
    /// counted, never propagated.
    pub async fn ingest_all_active(&self) -> Result<IngestReport, IngestError> {
        let sources = self.store.source_list(Some(true)).await?;
        let mut report = IngestReport::default();

        for source in sources {
            match self.ingest_source(&source).await {
                Ok(r) => report.merge(&r),
                Err(e) => {
                    tracing::error!(
                        source_id = %source.source_id,
                        error = %e,
                        "Source ingestion run failed"
                    );
                    report.sources += 1;
                    report.failures += 1;
                }
            }
        }
        Ok(report)
    }

    /// Fetch one article page and upsert it with its mentions. Returns
    /// whether the article was created and how many mentions were seeded.
    async fn ingest_article_page(
        &self,
        source: &NewsSource,
        url: &str,
    ) -> Result<(bool, u64), IngestError> {
        let html = self.fetcher.fetch(url).await?;
        let extracted = extract_article(&html, url)?;

        let validated = validate_article_data(&ArticleInput {
            title: extracted.title,
            content: extracted.content,
            url: url.to_string(),
            author: extracted.author,
            published_at: extracted.published_at,
        })?;

        // Symbols are spotted in the cleaned title and body together, so a
        // ticker only named in the headline still gets a mention.
        let haystack = format!("{} {}", validated.title, validated.content);
        let seeds: Vec<MentionSeed> = extract_stock_mentions(&haystack)
            .into_iter()
            .map(|symbol| {
                let context = mention_context(&haystack, &symbol);
                MentionSeed { symbol, context }
            })
            .collect();

        let (_, mentions, created) = self
            .store
            .article_upsert_with_mentions(
                NewArticle {
                    source_id: source.source_id,
                    title: validated.title,
                    content: validated.content,
                    url: validated.url,
                    author: validated.author,
                    published_at: validated.published_at,
                },
                &seeds,
            )
            .await?;

        Ok((created, mentions.len() as u64))
    }
}

/// Snippet of text around the first occurrence of a symbol, used as the
/// mention's stored context.
fn mention_context(text: &str, symbol: &str) -> Option<String> {
    let pos = text.find(symbol)?;
    let start = text[..pos]
        .char_indices()
        .rev()
        .take(CONTEXT_RADIUS)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(pos);
    let end_limit = pos + symbol.len();
    let end = text[end_limit..]
        .char_indices()
        .take(CONTEXT_RADIUS)
        .last()
        .map(|(i, c)| end_limit + i + c.len_utf8())
        .unwrap_or(end_limit);
    Some(text[start..end].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tickerwire_storage::{MemoryStore, NewSource};

    /// Fetcher serving canned documents from a map.
    struct CannedFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl ContentFetcher for CannedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, IngestError> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| IngestError::FetchFailed {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                })
        }
    }

    fn article_html(title: &str, body: &str) -> String {
        format!("<html><body><h1>{title}</h1><article><p>{body}</p></article></body></html>")
    }

    fn long_body(lead: &str) -> String {
        format!(
            "{lead} The broader market held steady while analysts debated the outlook \
             for the remainder of the fiscal year and beyond."
        )
    }

    async fn seeded_service(
        pages: HashMap<String, String>,
    ) -> (IngestService, Arc<MemoryStore>, NewsSource) {
        let store = Arc::new(MemoryStore::new());
        let source = store
            .source_create(NewSource {
                name: "Example News".to_string(),
                url: "https://news.example".to_string(),
                description: None,
                active: true,
            })
            .await
            .unwrap();
        let service = IngestService::new(
            store.clone(),
            Arc::new(CannedFetcher { pages }),
            IngestConfig::default(),
        );
        (service, store, source)
    }

    #[tokio::test]
    async fn test_ingest_source_creates_articles_and_mentions() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://news.example".to_string(),
            r#"<a href="/story-1">One</a>"#.to_string(),
        );
        pages.insert(
            "https://news.example/story-1".to_string(),
            article_html(
                "Apple Rallies",
                &long_body("Shares of $AAPL surged after earnings."),
            ),
        );

        let (service, store, source) = seeded_service(pages).await;
        let report = service.ingest_source(&source).await.unwrap();

        assert_eq!(report.articles_created, 1);
        assert_eq!(report.failures, 0);
        assert!(report.mentions >= 1);

        let article = store
            .article_get_by_url("https://news.example/story-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(article.title, "Apple Rallies");
        assert!(!article.is_processed);
    }

    #[tokio::test]
    async fn test_reingesting_updates_instead_of_duplicating() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://news.example".to_string(),
            r#"<a href="/story-1">One</a>"#.to_string(),
        );
        pages.insert(
            "https://news.example/story-1".to_string(),
            article_html("Apple Rallies", &long_body("Shares of $AAPL surged.")),
        );

        let (service, store, source) = seeded_service(pages).await;
        service.ingest_source(&source).await.unwrap();
        let report = service.ingest_source(&source).await.unwrap();

        assert_eq!(report.articles_created, 0);
        assert_eq!(report.articles_updated, 1);
        let articles = store.article_list(&Default::default()).await.unwrap();
        assert_eq!(articles.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_page_counts_failure_and_run_continues() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://news.example".to_string(),
            r#"<a href="/broken">Bad</a><a href="/good">Good</a>"#.to_string(),
        );
        // /broken is absent from the canned map, so its fetch fails.
        pages.insert(
            "https://news.example/good".to_string(),
            article_html("Markets Rise", &long_body("Stocks rose broadly on Tuesday.")),
        );

        let (service, _store, source) = seeded_service(pages).await;
        let report = service.ingest_source(&source).await.unwrap();
        assert_eq!(report.failures, 1);
        assert_eq!(report.articles_created, 1);
    }

    #[tokio::test]
    async fn test_ingest_all_active_skips_inactive_sources() {
        let mut pages = HashMap::new();
        pages.insert("https://news.example".to_string(), String::new());
        let (service, store, _source) = seeded_service(pages).await;
        store
            .source_create(NewSource {
                name: "Dormant".to_string(),
                url: "https://dormant.example".to_string(),
                description: None,
                active: false,
            })
            .await
            .unwrap();

        let report = service.ingest_all_active().await.unwrap();
        // Only the active source is walked; the dormant one would have
        // failed its fetch and shown up as a failure.
        assert_eq!(report.sources, 1);
        assert_eq!(report.failures, 0);
    }

    #[tokio::test]
    async fn test_unreachable_source_index_is_an_error() {
        let (service, _store, source) = seeded_service(HashMap::new()).await;
        let err = service.ingest_source(&source).await.unwrap_err();
        assert!(matches!(err, IngestError::FetchFailed { .. }));
    }

    #[test]
    fn test_mention_context_is_a_window_around_symbol() {
        let text = "Earlier in the session, shares of AAPL traded higher on volume.";
        let context = mention_context(text, "AAPL").unwrap();
        assert!(context.contains("AAPL"));
        assert!(context.contains("shares of"));
    }

    #[test]
    fn test_mention_context_absent_symbol() {
        assert_eq!(mention_context("no tickers", "AAPL"), None);
    }
}
