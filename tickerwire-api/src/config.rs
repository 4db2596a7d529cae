//! API Server Configuration
//!
//! Runtime configuration for the HTTP layer: environment, CORS, and API key
//! authentication. Domain-level knobs (cache TTLs, throttle rates, ingestion
//! and job intervals) live in `tickerwire-core::config` and are loaded
//! separately.

use std::collections::HashSet;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Deployment environment: "development", "staging", or "production"
    pub environment: String,

    /// Allowed CORS origins. Empty list means allow all origins
    /// (development mode).
    pub cors_allowed_origins: Vec<String>,

    /// Accepted API keys for the `X-API-Key` header. Empty set disables
    /// key checking entirely (development mode).
    pub api_keys: HashSet<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            cors_allowed_origins: Vec::new(),
            api_keys: HashSet::new(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TICKERWIRE_ENV`: deployment environment (default: "development")
    /// - `TICKERWIRE_CORS_ORIGINS`: comma-separated allowed origins
    /// - `TICKERWIRE_API_KEYS`: comma-separated accepted API keys
    pub fn from_env() -> Self {
        let environment =
            std::env::var("TICKERWIRE_ENV").unwrap_or_else(|_| "development".to_string());

        let cors_allowed_origins = std::env::var("TICKERWIRE_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let api_keys = std::env::var("TICKERWIRE_API_KEYS")
            .map(|s| {
                s.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            environment,
            cors_allowed_origins,
            api_keys,
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if an origin is allowed by CORS policy.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.cors_allowed_origins.is_empty()
            || self.cors_allowed_origins.iter().any(|o| o == origin)
    }

    /// Check whether the given API key is accepted. An empty key set
    /// accepts everything.
    pub fn is_api_key_valid(&self, key: &str) -> bool {
        self.api_keys.is_empty() || self.api_keys.contains(key)
    }
}
