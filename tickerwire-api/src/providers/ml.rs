//! Article Analysis Provider
//!
//! The `MlProvider` trait is the seam between the processing pipeline and
//! whatever model backs it. `LexiconAnalyzer` is the built-in
//! implementation: a deterministic analyzer using word lists and feature
//! hashing, so the pipeline works end to end with no external services and
//! produces stable outputs in tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use tickerwire_core::error::IngestError;

/// Dimensionality of embeddings produced by [`LexiconAnalyzer`].
pub const EMBEDDING_DIM: usize = 64;

/// Maximum number of sentences kept by the extractive summarizer.
const SUMMARY_SENTENCES: usize = 3;

/// Maximum summary length in characters.
const SUMMARY_MAX_CHARS: usize = 320;

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// Analysis backend for article processing.
///
/// All methods take cleaned article text. Implementations must be
/// thread-safe; failures surface as [`IngestError::ProviderFailed`].
#[async_trait]
pub trait MlProvider: Send + Sync {
    /// Produce a short summary of the text.
    async fn summarize(&self, text: &str) -> Result<String, IngestError>;

    /// Score overall sentiment in `[-1.0, 1.0]`, where negative values
    /// indicate bearish language.
    async fn sentiment(&self, text: &str) -> Result<f32, IngestError>;

    /// Produce a fixed-dimension embedding vector for similarity search.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IngestError>;

    /// Assign topic categories with confidence in `(0.0, 1.0]`.
    async fn categorize(&self, text: &str) -> Result<Vec<(String, f32)>, IngestError>;
}

// ============================================================================
// LEXICON ANALYZER
// ============================================================================

/// Deterministic lexicon-based analyzer.
#[derive(Debug, Default, Clone)]
pub struct LexiconAnalyzer;

impl LexiconAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

/// Bullish vocabulary for sentiment scoring.
const POSITIVE_WORDS: &[&str] = &[
    "gain", "gains", "gained", "rally", "rallied", "surge", "surged", "soar", "soared", "beat",
    "beats", "strong", "growth", "profit", "profits", "record", "upgrade", "upgraded", "bullish",
    "outperform", "exceeded", "jump", "jumped", "rise", "rose", "rebound", "optimistic",
];

/// Bearish vocabulary for sentiment scoring.
const NEGATIVE_WORDS: &[&str] = &[
    "loss", "losses", "fall", "fell", "drop", "dropped", "plunge", "plunged", "miss", "missed",
    "weak", "decline", "declined", "downgrade", "downgraded", "bearish", "underperform", "slump",
    "slumped", "crash", "crashed", "layoffs", "bankruptcy", "lawsuit", "recall", "fraud",
    "warning", "cut", "cuts",
];

/// Topic keywords. Confidence grows with distinct keyword hits.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Earnings",
        &["earnings", "revenue", "profit", "quarterly", "eps", "guidance", "forecast"],
    ),
    (
        "Markets",
        &["stocks", "shares", "index", "nasdaq", "dow", "trading", "investors", "futures"],
    ),
    (
        "Technology",
        &["software", "chip", "semiconductor", "cloud", "ai", "startup", "platform", "app"],
    ),
    (
        "Energy",
        &["oil", "gas", "crude", "opec", "barrel", "renewable", "solar", "energy"],
    ),
    (
        "Economy",
        &["inflation", "fed", "rates", "gdp", "unemployment", "tariff", "treasury", "economy"],
    ),
    (
        "Mergers",
        &["acquisition", "merger", "takeover", "buyout", "deal", "acquire"],
    ),
    (
        "Regulation",
        &["sec", "regulator", "antitrust", "lawsuit", "settlement", "probe", "investigation"],
    ),
];

#[async_trait]
impl MlProvider for LexiconAnalyzer {
    async fn summarize(&self, text: &str) -> Result<String, IngestError> {
        let mut summary = String::new();
        let mut sentences = 0;

        for sentence in split_sentences(text) {
            if sentences >= SUMMARY_SENTENCES
                || summary.len() + sentence.len() + 1 > SUMMARY_MAX_CHARS
            {
                break;
            }
            if !summary.is_empty() {
                summary.push(' ');
            }
            summary.push_str(sentence);
            sentences += 1;
        }

        // Very short inputs may have no sentence boundary at all.
        if summary.is_empty() {
            summary = text.chars().take(SUMMARY_MAX_CHARS).collect();
        }
        Ok(summary)
    }

    async fn sentiment(&self, text: &str) -> Result<f32, IngestError> {
        let mut positive = 0i32;
        let mut negative = 0i32;

        for word in tokenize(text) {
            if POSITIVE_WORDS.contains(&word.as_str()) {
                positive += 1;
            } else if NEGATIVE_WORDS.contains(&word.as_str()) {
                negative += 1;
            }
        }

        let total = positive + negative;
        if total == 0 {
            return Ok(0.0);
        }
        Ok((positive - negative) as f32 / total as f32)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, IngestError> {
        let mut vector = vec![0.0f32; EMBEDDING_DIM];

        for word in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash % EMBEDDING_DIM as u64) as usize;
            // Sign bit from the hash keeps buckets from only accumulating.
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    async fn categorize(&self, text: &str) -> Result<Vec<(String, f32)>, IngestError> {
        let words: Vec<String> = tokenize(text).collect();
        let mut categories = Vec::new();

        for (name, keywords) in CATEGORY_KEYWORDS {
            let hits = keywords
                .iter()
                .filter(|k| words.iter().any(|w| w == *k))
                .count();
            if hits > 0 {
                let confidence = (0.4 + 0.15 * hits as f32).min(1.0);
                categories.push((name.to_string(), confidence));
            }
        }

        categories.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(categories)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Cosine similarity between two vectors. Returns 0.0 for mismatched
/// dimensions or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
