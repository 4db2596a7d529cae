//! Page Fetching and HTML Extraction
//!
//! `ContentFetcher` is the network seam: the production implementation
//! wraps a reqwest client, tests substitute canned documents. Extraction
//! helpers are pure functions over the fetched HTML.
//!
//! `scraper::Html` is not `Send`, so parsing happens in synchronous blocks
//! that never hold a document across an await point.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use tickerwire_core::config::IngestConfig;
use tickerwire_core::error::IngestError;

// Selectors are compiled once; the patterns are literals.
static HEADLINE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static ARTICLE_BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article p").unwrap());
static PARAGRAPH_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static AUTHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="author"]"#).unwrap());
static PUBLISHED_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="article:published_time"], time[datetime]"#).unwrap());

// ============================================================================
// FETCHER TRAIT
// ============================================================================

/// Fetches raw page bodies by URL.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, IngestError>;
}

/// Production fetcher backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &IngestConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            // Builder only fails on TLS backend misconfiguration; fall back
            // to a default client rather than aborting startup.
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(&IngestConfig {
            fetch_timeout: Duration::from_secs(10),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, IngestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::FetchFailed {
                url: url.to_string(),
                reason: format!("HTTP status {}", status),
            });
        }

        response.text().await.map_err(|e| IngestError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Raw fields pulled out of an article page, before cleaning and
/// validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedArticle {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub published_at: Option<String>,
}

/// Extract article fields from an HTML document.
///
/// Title comes from the first `<h1>` (falling back to `<title>`), body from
/// `<article>` paragraphs (falling back to all paragraphs), author from the
/// standard meta tag, and the publication timestamp from Open Graph meta or
/// a `<time datetime>` element.
pub fn extract_article(html: &str, url: &str) -> Result<ExtractedArticle, IngestError> {
    let document = Html::parse_document(html);

    // A combined "h1, title" selector yields document order, which puts the
    // head <title> ahead of any <h1>; select headlines first instead.
    let title = document
        .select(&HEADLINE_SELECTOR)
        .chain(document.select(&TITLE_SELECTOR))
        .map(|el| el.text().collect::<String>())
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
        .unwrap_or_default();

    let mut paragraphs: Vec<String> = document
        .select(&ARTICLE_BODY_SELECTOR)
        .map(|el| el.text().collect::<String>())
        .collect();
    if paragraphs.is_empty() {
        paragraphs = document
            .select(&PARAGRAPH_SELECTOR)
            .map(|el| el.text().collect::<String>())
            .collect();
    }
    let content = paragraphs.join(" ");

    if title.is_empty() || content.trim().is_empty() {
        return Err(IngestError::EmptyDocument {
            url: url.to_string(),
        });
    }

    let author = document
        .select(&AUTHOR_SELECTOR)
        .find_map(|el| el.value().attr("content"))
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());

    let published_at = document
        .select(&PUBLISHED_SELECTOR)
        .find_map(|el| {
            el.value()
                .attr("content")
                .or_else(|| el.value().attr("datetime"))
        })
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Ok(ExtractedArticle {
        title,
        content,
        author,
        published_at,
    })
}

/// Collect candidate article links from a source index page.
///
/// Relative links are resolved against the source URL; only http(s) links
/// on the same host survive. Order is document order with duplicates
/// removed, capped at `limit`.
pub fn extract_links(html: &str, base_url: &str, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let base_host = host_of(base_url);

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_href(base_url, href) else {
            continue;
        };
        if host_of(&resolved) != base_host {
            continue;
        }
        // Skip self-links back to the index page.
        if resolved.trim_end_matches('/') == base_url.trim_end_matches('/') {
            continue;
        }
        if seen.insert(resolved.clone()) {
            links.push(resolved);
            if links.len() >= limit {
                break;
            }
        }
    }

    links
}

fn host_of(url: &str) -> &str {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme)
}

fn resolve_href(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    if let Some(rest) = href.strip_prefix("//") {
        let scheme = if base_url.starts_with("https") {
            "https"
        } else {
            "http"
        };
        return Some(format!("{scheme}://{rest}"));
    }
    if href.starts_with('/') {
        let scheme_end = base_url.find("://")? + 3;
        let host_end = base_url[scheme_end..]
            .find('/')
            .map(|i| scheme_end + i)
            .unwrap_or(base_url.len());
        return Some(format!("{}{}", &base_url[..host_end], href));
    }
    // Relative path against the base directory.
    let trimmed = base_url.trim_end_matches('/');
    Some(format!("{trimmed}/{href}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_HTML: &str = r#"
        <html>
          <head>
            <title>Fallback Title | Site</title>
            <meta name="author" content="Jane Reporter">
            <meta property="article:published_time" content="2024-03-15T10:30:00Z">
          </head>
          <body>
            <h1>Apple Beats Earnings Expectations</h1>
            <article>
              <p>Apple reported quarterly revenue well above forecasts.</p>
              <p>Shares of AAPL rose in after-hours trading.</p>
            </article>
            <p>Unrelated footer text.</p>
          </body>
        </html>
    "#;

    #[test]
    fn test_extract_article_prefers_h1_and_article_body() {
        let extracted = extract_article(ARTICLE_HTML, "https://news.example/a").unwrap();
        assert_eq!(extracted.title, "Apple Beats Earnings Expectations");
        assert!(extracted.content.contains("quarterly revenue"));
        assert!(extracted.content.contains("after-hours"));
        assert!(!extracted.content.contains("footer"));
        assert_eq!(extracted.author.as_deref(), Some("Jane Reporter"));
        assert_eq!(
            extracted.published_at.as_deref(),
            Some("2024-03-15T10:30:00Z")
        );
    }

    #[test]
    fn test_extract_article_falls_back_to_title_and_paragraphs() {
        let html = "<html><head><title>Only Title</title></head><body><p>Some body text.</p></body></html>";
        let extracted = extract_article(html, "https://news.example/b").unwrap();
        assert_eq!(extracted.title, "Only Title");
        assert_eq!(extracted.content, "Some body text.");
        assert_eq!(extracted.author, None);
        assert_eq!(extracted.published_at, None);
    }

    #[test]
    fn test_extract_article_ignores_empty_h1() {
        let html = "<html><head><title>Head Title</title></head>\
                    <body><h1>  </h1><p>Body text for the article.</p></body></html>";
        let extracted = extract_article(html, "https://news.example/d").unwrap();
        assert_eq!(extracted.title, "Head Title");
    }

    #[test]
    fn test_extract_article_empty_document_is_error() {
        let err = extract_article("<html><body></body></html>", "https://news.example/c")
            .unwrap_err();
        assert!(matches!(err, IngestError::EmptyDocument { .. }));
    }

    #[test]
    fn test_extract_links_same_host_only() {
        let html = r##"
            <a href="/markets/story-1">One</a>
            <a href="https://news.example/story-2">Two</a>
            <a href="https://other.example/story-3">Other host</a>
            <a href="#section">Anchor</a>
            <a href="/markets/story-1">Duplicate</a>
        "##;
        let links = extract_links(html, "https://news.example", 25);
        assert_eq!(
            links,
            vec![
                "https://news.example/markets/story-1".to_string(),
                "https://news.example/story-2".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_links_respects_limit() {
        let html = r#"
            <a href="/a">A</a>
            <a href="/b">B</a>
            <a href="/c">C</a>
        "#;
        let links = extract_links(html, "https://news.example", 2);
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_extract_links_skips_index_self_link() {
        let html = r#"<a href="https://news.example/">Home</a><a href="/story">Story</a>"#;
        let links = extract_links(html, "https://news.example", 25);
        assert_eq!(links, vec!["https://news.example/story".to_string()]);
    }

    #[test]
    fn test_resolve_href_relative() {
        assert_eq!(
            resolve_href("https://news.example/markets/", "story-9"),
            Some("https://news.example/markets/story-9".to_string())
        );
        assert_eq!(
            resolve_href("https://news.example/markets/index.html", "/top"),
            Some("https://news.example/top".to_string())
        );
        assert_eq!(resolve_href("https://news.example", "javascript:void(0)"), None);
    }
}
