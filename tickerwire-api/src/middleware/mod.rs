//! Axum Middleware
//!
//! Request-path middleware applied to the `/api/v1` router:
//! - `auth`: API key check and optional user resolution
//! - `cache`: GET response caching with pattern invalidation on writes
//! - `throttle`: sliding-window rate limiting per scope and identity

pub mod auth;
pub mod cache;
pub mod throttle;

pub use auth::{auth_middleware, AuthContext, AuthState};
pub use cache::{http_cache_middleware, HttpCacheState};
pub use throttle::{throttle_middleware, ThrottleState};
