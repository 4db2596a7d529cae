//! Input validation and text normalization for ingested news data.
//!
//! All functions here are pure. Callers (route handlers, the ingestion
//! service) validate before anything touches the store.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

/// Maximum title length after cleaning.
pub const MAX_TITLE_LEN: usize = 500;
/// Minimum content length after cleaning.
pub const MIN_CONTENT_LEN: usize = 100;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPECIAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s.,!?-]").unwrap());
static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{1,5}$").unwrap());
static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[A-Z]{1,5}|[A-Z]{1,5}").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^https?://(?:(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:[/?#]\S*)?$",
    )
    .unwrap()
});

/// Accepted publication date formats, tried in order. Ordering is semantic:
/// `%d/%m/%Y` comes before `%m/%d/%Y`, so ambiguous slash dates resolve
/// day-first.
const DATE_FORMATS: [(&str, bool); 9] = [
    ("%Y-%m-%d", false),
    ("%Y-%m-%dT%H:%M:%S", true),
    ("%Y-%m-%dT%H:%M:%SZ", true),
    ("%Y-%m-%d %H:%M:%S", true),
    ("%B %d, %Y", false),
    ("%B %d %Y", false),
    ("%d %B %Y", false),
    ("%d/%m/%Y", false),
    ("%m/%d/%Y", false),
];

// ============================================================================
// SCALAR VALIDATORS
// ============================================================================

/// Normalize raw article text: strip HTML tags, collapse whitespace runs,
/// normalize curly quotes, drop characters outside the word/punctuation set,
/// trim. Idempotent.
pub fn clean_text(input: &str) -> String {
    let no_tags = TAG_RE.replace_all(input, " ");
    let collapsed = no_tags.split_whitespace().collect::<Vec<_>>().join(" ");
    let quoted = collapsed
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"");
    let plain = SPECIAL_RE.replace_all(&quoted, "");
    // Dropping characters can leave doubled spaces behind, collapse again.
    plain.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validate an http(s) URL pointing at a domain, `localhost`, or a dotted
/// IPv4 address, with optional port and path. Returns the trimmed URL.
pub fn validate_url(url: &str) -> Result<String, ValidationError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "url".to_string(),
        });
    }
    if !URL_RE.is_match(trimmed) {
        return Err(ValidationError::InvalidValue {
            field: "url".to_string(),
            reason: format!("'{trimmed}' is not a valid http(s) URL"),
        });
    }
    Ok(trimmed.to_string())
}

/// Parse a publication date by trying each supported format in order.
/// Empty input means "now". Naive inputs are taken as UTC.
pub fn validate_date(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(Utc::now());
    }
    for (format, has_time) in DATE_FORMATS {
        let parsed = if has_time {
            NaiveDateTime::parse_from_str(trimmed, format).ok()
        } else {
            NaiveDate::parse_from_str(trimmed, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        };
        if let Some(naive) = parsed {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ValidationError::UnrecognizedDate {
        value: trimmed.to_string(),
        formats: DATE_FORMATS
            .iter()
            .map(|(f, _)| *f)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Validate a stock ticker: strip a leading `$`, uppercase, then require
/// 1-5 letters.
pub fn validate_stock_symbol(symbol: &str) -> Result<String, ValidationError> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "symbol".to_string(),
        });
    }
    let normalized = trimmed.trim_start_matches('$').to_uppercase();
    if !SYMBOL_RE.is_match(&normalized) {
        return Err(ValidationError::InvalidValue {
            field: "symbol".to_string(),
            reason: format!("'{trimmed}' is not a valid stock symbol (1-5 letters)"),
        });
    }
    Ok(normalized)
}

// ============================================================================
// RECORD VALIDATORS
// ============================================================================

/// Raw article fields, as scraped or submitted.
#[derive(Debug, Clone, Default)]
pub struct ArticleInput {
    pub title: String,
    pub content: String,
    pub url: String,
    pub author: Option<String>,
    pub published_at: Option<String>,
}

/// Article fields after cleaning and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedArticle {
    pub title: String,
    pub content: String,
    pub url: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Clean and validate raw article fields. Title must be non-empty and at
/// most [`MAX_TITLE_LEN`] chars after cleaning; content must be at least
/// [`MIN_CONTENT_LEN`] chars after cleaning. A missing or empty publication
/// date means "now".
pub fn validate_article_data(input: &ArticleInput) -> Result<ValidatedArticle, ValidationError> {
    let title = clean_text(&input.title);
    if title.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        });
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: MAX_TITLE_LEN,
            len: title.chars().count(),
        });
    }

    let content = clean_text(&input.content);
    if content.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "content".to_string(),
        });
    }
    if content.chars().count() < MIN_CONTENT_LEN {
        return Err(ValidationError::TooShort {
            field: "content".to_string(),
            min: MIN_CONTENT_LEN,
            len: content.chars().count(),
        });
    }

    let url = validate_url(&input.url)?;
    let author = input.author.as_deref().map(clean_text);
    let published_at = validate_date(input.published_at.as_deref().unwrap_or_default())?;

    Ok(ValidatedArticle {
        title,
        content,
        url,
        author,
        published_at,
    })
}

/// Raw source fields.
#[derive(Debug, Clone, Default)]
pub struct SourceInput {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub active: Option<bool>,
}

/// Source fields after cleaning and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSource {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub active: bool,
}

/// Clean and validate source fields. `active` defaults to true.
pub fn validate_source_data(input: &SourceInput) -> Result<ValidatedSource, ValidationError> {
    let name = clean_text(&input.name);
    if name.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
    }
    let url = validate_url(&input.url)?;
    let description = input.description.as_deref().map(clean_text);

    Ok(ValidatedSource {
        name,
        url,
        description,
        active: input.active.unwrap_or(true),
    })
}

/// Raw category fields.
#[derive(Debug, Clone, Default)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
}

/// Category fields after cleaning and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCategory {
    pub name: String,
    pub description: Option<String>,
}

/// Clean and validate category fields.
pub fn validate_category_data(input: &CategoryInput) -> Result<ValidatedCategory, ValidationError> {
    let name = clean_text(&input.name);
    if name.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
    }
    let description = input.description.as_deref().map(clean_text);

    Ok(ValidatedCategory { name, description })
}

// ============================================================================
// MENTION EXTRACTION
// ============================================================================

/// Scan text for stock-symbol mentions (`$AAPL` or bare uppercase runs),
/// validate each candidate, silently drop invalid ones, and dedupe.
/// First-seen order is preserved but callers must not rely on ordering.
pub fn extract_stock_mentions(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut symbols = Vec::new();
    for candidate in MENTION_RE.find_iter(text) {
        if let Ok(symbol) = validate_stock_symbol(candidate.as_str()) {
            if seen.insert(symbol.clone()) {
                symbols.push(symbol);
            }
        }
    }
    symbols
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// clean_text is idempotent: cleaning cleaned text changes nothing.
        #[test]
        fn prop_clean_text_idempotent(input in ".{0,400}") {
            let once = clean_text(&input);
            let twice = clean_text(&once);
            prop_assert_eq!(once, twice);
        }

        /// Accepted symbols are always 1-5 uppercase letters.
        #[test]
        fn prop_valid_symbols_are_canonical(input in r"\$?[A-Za-z]{1,5}") {
            let symbol = validate_stock_symbol(&input).unwrap();
            prop_assert!(symbol.len() >= 1 && symbol.len() <= 5);
            prop_assert!(symbol.chars().all(|c| c.is_ascii_uppercase()));
        }

        /// Extracted mentions all pass symbol validation and are unique.
        #[test]
        fn prop_extracted_mentions_are_valid_and_unique(text in ".{0,400}") {
            let symbols = extract_stock_mentions(&text);
            let unique: std::collections::HashSet<_> = symbols.iter().collect();
            prop_assert_eq!(unique.len(), symbols.len());
            for symbol in &symbols {
                prop_assert!(validate_stock_symbol(symbol).is_ok());
            }
        }
    }
}
