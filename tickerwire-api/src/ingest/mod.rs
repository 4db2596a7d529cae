//! Article Ingestion Pipeline
//!
//! Fetches source pages, discovers article links, extracts and cleans
//! article text, spots stock symbols, and upserts everything through the
//! store. Processing (summaries, sentiment, embeddings, categories) runs as
//! a separate step over ingested articles.

pub mod fetch;
pub mod processing;
pub mod service;

pub use fetch::{ContentFetcher, ExtractedArticle, HttpFetcher};
pub use processing::process_article;
pub use service::{IngestReport, IngestService};
