//! Analysis Providers
//!
//! Pluggable providers for article enrichment (summarization, sentiment,
//! embeddings, categorization). The default implementation is a
//! deterministic lexicon-based analyzer with no network dependencies;
//! hosted-model providers implement the same trait.

pub mod ml;

pub use ml::{cosine_similarity, LexiconAnalyzer, MlProvider};
