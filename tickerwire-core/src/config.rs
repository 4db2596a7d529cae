//! Configuration structs for caching, throttling, ingestion, and jobs.
//!
//! Configuration is loaded from `TICKERWIRE_*` environment variables with
//! sensible defaults for development. Structs are built once in main and
//! passed to the components that need them; nothing reads globals.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

// ============================================================================
// RATE SPECS
// ============================================================================

/// A request quota over a window, parsed from strings like `"100/day"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSpec {
    /// Requests allowed within the window.
    pub quota: u32,
    /// Window length.
    pub period: Duration,
}

impl RateSpec {
    pub const fn new(quota: u32, period: Duration) -> Self {
        Self { quota, period }
    }
}

impl FromStr for RateSpec {
    type Err = ConfigError;

    /// Parse `"N/period"` where period is `second`, `minute`, `hour`, or
    /// `day` (only the first letter is significant, so `"100/d"` and
    /// `"100/day"` are equivalent), or a literal duration such as `"900s"`
    /// or `"250ms"` for windows built in code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: "rate".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (num, period) = s
            .split_once('/')
            .ok_or_else(|| invalid("expected 'N/period'"))?;
        let quota: u32 = num
            .trim()
            .parse()
            .map_err(|_| invalid("quota must be a positive integer"))?;
        if quota == 0 {
            return Err(invalid("quota must be a positive integer"));
        }

        let token = period.trim();
        let period = if let Some(ms) = token
            .strip_suffix("ms")
            .and_then(|n| n.parse::<u64>().ok())
        {
            Duration::from_millis(ms)
        } else if let Some(secs) = token
            .strip_suffix('s')
            .and_then(|n| n.parse::<u64>().ok())
        {
            Duration::from_secs(secs)
        } else {
            let secs = match token.chars().next() {
                Some('s') => 1,
                Some('m') => 60,
                Some('h') => 3600,
                Some('d') => 86400,
                _ => return Err(invalid("period must be second, minute, hour, or day")),
            };
            Duration::from_secs(secs)
        };
        if period.is_zero() {
            return Err(invalid("period must be positive"));
        }
        Ok(Self::new(quota, period))
    }
}

impl std::fmt::Display for RateSpec {
    /// Renders the canonical period names where they apply and falls back
    /// to literal durations, so `to_string().parse()` always recovers the
    /// same spec.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.period.subsec_nanos() != 0 {
            return write!(f, "{}/{}ms", self.quota, self.period.as_millis());
        }
        match self.period.as_secs() {
            1 => write!(f, "{}/second", self.quota),
            60 => write!(f, "{}/minute", self.quota),
            3600 => write!(f, "{}/hour", self.quota),
            86400 => write!(f, "{}/day", self.quota),
            secs => write!(f, "{}/{}s", self.quota, secs),
        }
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Response cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Prefix for every cache key this deployment writes.
    pub key_prefix: String,
    /// TTL for cached list/detail responses.
    pub default_timeout: Duration,
    /// TTL for slow-changing resources (sources, categories).
    pub long_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "tickerwire".to_string(),
            default_timeout: Duration::from_secs(300),
            long_timeout: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TICKERWIRE_CACHE_PREFIX`: Key prefix (default: "tickerwire")
    /// - `TICKERWIRE_CACHE_TIMEOUT_SECS`: Default TTL (default: 300)
    /// - `TICKERWIRE_CACHE_LONG_TIMEOUT_SECS`: Long TTL (default: 3600)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let key_prefix = std::env::var("TICKERWIRE_CACHE_PREFIX")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.key_prefix);

        let default_timeout = std::env::var("TICKERWIRE_CACHE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_timeout);

        let long_timeout = std::env::var("TICKERWIRE_CACHE_LONG_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.long_timeout);

        Self {
            key_prefix,
            default_timeout,
            long_timeout,
        }
    }
}

// ============================================================================
// THROTTLE CONFIGURATION
// ============================================================================

/// Request throttling settings.
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Whether throttling is enabled.
    pub enabled: bool,
    /// Fallback rate for scopes without an entry in `rates`.
    pub default_rate: RateSpec,
    /// Per-scope rates, e.g. "news_ingestion" -> 100/hour.
    pub rates: HashMap<String, RateSpec>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert(
            "news_ingestion".to_string(),
            RateSpec::new(100, Duration::from_secs(3600)),
        );
        rates.insert(
            "article_processing".to_string(),
            RateSpec::new(50, Duration::from_secs(3600)),
        );
        Self {
            enabled: true,
            default_rate: RateSpec::new(100, Duration::from_secs(86400)),
            rates,
        }
    }
}

impl ThrottleConfig {
    /// Create ThrottleConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TICKERWIRE_THROTTLE_ENABLED`: "true" or "false" (default: true)
    /// - `TICKERWIRE_THROTTLE_DEFAULT_RATE`: e.g. "100/day"
    /// - `TICKERWIRE_THROTTLE_RATES`: comma-separated `scope=N/period` pairs,
    ///   e.g. "news_ingestion=100/hour,article_processing=50/hour".
    ///   Unparseable entries are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("TICKERWIRE_THROTTLE_ENABLED") {
            config.enabled = v.to_lowercase() != "false";
        }

        if let Ok(v) = std::env::var("TICKERWIRE_THROTTLE_DEFAULT_RATE") {
            if let Ok(rate) = v.parse() {
                config.default_rate = rate;
            }
        }

        if let Ok(v) = std::env::var("TICKERWIRE_THROTTLE_RATES") {
            for pair in v.split(',') {
                if let Some((scope, spec)) = pair.split_once('=') {
                    if let Ok(rate) = spec.trim().parse() {
                        config.rates.insert(scope.trim().to_string(), rate);
                    }
                }
            }
        }

        config
    }

    /// The configured rate for a scope, or the default.
    pub fn rate_for(&self, scope: &str) -> RateSpec {
        self.rates.get(scope).copied().unwrap_or(self.default_rate)
    }
}

// ============================================================================
// INGESTION CONFIGURATION
// ============================================================================

/// Article fetching settings.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Per-request timeout for article fetches.
    pub fetch_timeout: Duration,
    /// User-Agent sent with article fetches. Some outlets reject
    /// non-browser agents.
    pub user_agent: String,
    /// Cap on article links followed per source per run.
    pub max_articles_per_source: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
            max_articles_per_source: 25,
        }
    }
}

impl IngestConfig {
    /// Create IngestConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TICKERWIRE_FETCH_TIMEOUT_SECS`: Fetch timeout (default: 10)
    /// - `TICKERWIRE_FETCH_USER_AGENT`: User-Agent header
    /// - `TICKERWIRE_MAX_ARTICLES_PER_SOURCE`: Per-run link cap (default: 25)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fetch_timeout = std::env::var("TICKERWIRE_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);

        let user_agent = std::env::var("TICKERWIRE_FETCH_USER_AGENT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.user_agent);

        let max_articles_per_source = std::env::var("TICKERWIRE_MAX_ARTICLES_PER_SOURCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_articles_per_source);

        Self {
            fetch_timeout,
            user_agent,
            max_articles_per_source,
        }
    }
}

// ============================================================================
// JOBS CONFIGURATION
// ============================================================================

/// Background job scheduling settings.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Whether the scheduler runs at all.
    pub enabled: bool,
    /// Interval between full-source ingestion runs.
    pub ingest_interval: Duration,
    /// Interval between old-article cleanup runs.
    pub cleanup_interval: Duration,
    /// Articles older than this many days are deleted by cleanup.
    pub cleanup_max_age_days: i64,
    /// Interval between reprocessing sweeps for unprocessed articles.
    pub reprocess_interval: Duration,
    /// Max articles picked up per reprocessing sweep.
    pub reprocess_batch: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ingest_interval: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(86400),
            cleanup_max_age_days: 30,
            reprocess_interval: Duration::from_secs(21600),
            reprocess_batch: 100,
        }
    }
}

impl JobsConfig {
    /// Create JobsConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TICKERWIRE_JOBS_ENABLED`: "true" or "false" (default: true)
    /// - `TICKERWIRE_INGEST_INTERVAL_SECS`: default 3600 (hourly)
    /// - `TICKERWIRE_CLEANUP_INTERVAL_SECS`: default 86400 (daily)
    /// - `TICKERWIRE_CLEANUP_MAX_AGE_DAYS`: default 30
    /// - `TICKERWIRE_REPROCESS_INTERVAL_SECS`: default 21600 (6-hourly)
    /// - `TICKERWIRE_REPROCESS_BATCH`: default 100
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("TICKERWIRE_JOBS_ENABLED") {
            config.enabled = v.to_lowercase() != "false";
        }
        if let Ok(v) = std::env::var("TICKERWIRE_INGEST_INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                config.ingest_interval = Duration::from_secs(secs);
            }
        }
        if let Ok(v) = std::env::var("TICKERWIRE_CLEANUP_INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                config.cleanup_interval = Duration::from_secs(secs);
            }
        }
        if let Ok(v) = std::env::var("TICKERWIRE_CLEANUP_MAX_AGE_DAYS") {
            if let Ok(days) = v.parse() {
                config.cleanup_max_age_days = days;
            }
        }
        if let Ok(v) = std::env::var("TICKERWIRE_REPROCESS_INTERVAL_SECS") {
            if let Ok(secs) = v.parse() {
                config.reprocess_interval = Duration::from_secs(secs);
            }
        }
        if let Ok(v) = std::env::var("TICKERWIRE_REPROCESS_BATCH") {
            if let Ok(batch) = v.parse() {
                config.reprocess_batch = batch;
            }
        }

        config
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_spec_parses_full_and_short_periods() {
        let full: RateSpec = "100/day".parse().unwrap();
        let short: RateSpec = "100/d".parse().unwrap();
        assert_eq!(full, short);
        assert_eq!(full.quota, 100);
        assert_eq!(full.period, Duration::from_secs(86400));

        assert_eq!(
            "5/second".parse::<RateSpec>().unwrap().period,
            Duration::from_secs(1)
        );
        assert_eq!(
            "60/minute".parse::<RateSpec>().unwrap().period,
            Duration::from_secs(60)
        );
        assert_eq!(
            "10/hour".parse::<RateSpec>().unwrap().period,
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_rate_spec_parses_literal_durations() {
        assert_eq!(
            "10/900s".parse::<RateSpec>().unwrap(),
            RateSpec::new(10, Duration::from_secs(900))
        );
        assert_eq!(
            "1/250ms".parse::<RateSpec>().unwrap(),
            RateSpec::new(1, Duration::from_millis(250))
        );
    }

    #[test]
    fn test_rate_spec_rejects_malformed() {
        assert!("".parse::<RateSpec>().is_err());
        assert!("100".parse::<RateSpec>().is_err());
        assert!("abc/day".parse::<RateSpec>().is_err());
        assert!("0/day".parse::<RateSpec>().is_err());
        assert!("100/year".parse::<RateSpec>().is_err());
        assert!("100/0s".parse::<RateSpec>().is_err());
    }

    #[test]
    fn test_rate_spec_display_round_trips() {
        for spec in ["5/second", "60/minute", "10/hour", "100/day"] {
            let parsed: RateSpec = spec.parse().unwrap();
            assert_eq!(parsed.to_string(), spec);
            assert_eq!(parsed.to_string().parse::<RateSpec>().unwrap(), parsed);
        }
    }

    #[test]
    fn test_rate_spec_display_round_trips_uncommon_periods() {
        for rate in [
            RateSpec::new(1, Duration::from_millis(20)),
            RateSpec::new(10, Duration::from_secs(600)),
            RateSpec::new(3, Duration::from_secs(7200)),
        ] {
            assert_eq!(rate.to_string().parse::<RateSpec>().unwrap(), rate);
        }
    }

    #[test]
    fn test_default_cache_config() {
        let config = CacheConfig::default();
        assert_eq!(config.key_prefix, "tickerwire");
        assert_eq!(config.default_timeout, Duration::from_secs(300));
        assert_eq!(config.long_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn test_throttle_config_rate_for_falls_back() {
        let config = ThrottleConfig::default();
        assert_eq!(
            config.rate_for("news_ingestion"),
            RateSpec::new(100, Duration::from_secs(3600))
        );
        assert_eq!(config.rate_for("unknown_scope"), config.default_rate);
    }

    #[test]
    fn test_default_jobs_config() {
        let config = JobsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.ingest_interval, Duration::from_secs(3600));
        assert_eq!(config.cleanup_max_age_days, 30);
        assert_eq!(config.reprocess_batch, 100);
    }
}
