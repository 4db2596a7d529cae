//! OpenAPI Specification for the Tickerwire API
//!
//! This module defines the OpenAPI document for the Tickerwire REST API.
//! It uses utoipa to generate the OpenAPI specification from Rust types
//! and route annotations.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::ingest::IngestReport;
use crate::routes::TaskAck;

// Import route modules for path references
use crate::routes::{
    article, article_category, category, health, role, source, stock_mention, user,
};

// Import domain types from tickerwire-core
use tickerwire_core::entities::{
    ArticleCategory, NewsArticle, NewsCategory, NewsSource, StockMention, User, UserProfile,
    UserRole, UserRoleAssignment,
};

/// OpenAPI document for the Tickerwire API.
///
/// This struct generates the complete OpenAPI specification for the API,
/// including all schemas, paths, and security definitions.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tickerwire API",
        version = "0.1.0",
        description = "Financial news aggregation backend - source ingestion, stock mention extraction, article enrichment, and curation APIs",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Sources", description = "News source registration and on-demand ingestion"),
        (name = "Articles", description = "Ingested articles, enrichment, and similarity search"),
        (name = "Mentions", description = "Stock symbols spotted in article text"),
        (name = "Categories", description = "Topic categories for articles"),
        (name = "ArticleCategories", description = "Article to category links with confidence"),
        (name = "Users", description = "User accounts and profiles"),
        (name = "Roles", description = "Roles and role assignments"),
        (name = "Health", description = "Liveness and readiness checks")
    ),
    paths(
        // === Source Routes ===
        source::create_source,
        source::list_sources,
        source::get_source,
        source::update_source,
        source::delete_source,
        source::trigger_ingest,

        // === Article Routes ===
        article::create_article,
        article::list_articles,
        article::get_article,
        article::update_article,
        article::delete_article,
        article::trigger_process,
        article::similar_articles,
        article::list_article_mentions,

        // === Mention Routes ===
        stock_mention::create_mention,
        stock_mention::list_mentions,
        stock_mention::get_mention,
        stock_mention::update_mention,
        stock_mention::delete_mention,

        // === Category Routes ===
        category::create_category,
        category::list_categories,
        category::get_category,
        category::update_category,
        category::delete_category,

        // === Article-Category Routes ===
        article_category::create_link,
        article_category::list_links,
        article_category::get_link,
        article_category::update_link,
        article_category::delete_link,

        // === User Routes ===
        user::create_user,
        user::list_users,
        user::current_user,
        user::get_user,
        user::update_user,
        user::delete_user,
        user::get_profile,
        user::update_profile,

        // === Role Routes ===
        role::create_role,
        role::list_roles,
        role::get_role,
        role::update_role,
        role::delete_role,
        role::create_assignment,
        role::list_assignments,
        role::get_assignment,
        role::delete_assignment,

        // === Health Routes ===
        health::ping,
        health::liveness,
        health::readiness,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Source Types ===
            source::CreateSourceRequest, source::UpdateSourceRequest,

            // === Article Types ===
            article::CreateArticleRequest, article::UpdateArticleRequest,
            article::SimilarArticle,

            // === Mention Types ===
            stock_mention::CreateMentionRequest, stock_mention::UpdateMentionRequest,

            // === Category Types ===
            category::CreateCategoryRequest, category::UpdateCategoryRequest,
            article_category::CreateLinkRequest, article_category::UpdateLinkRequest,

            // === User Types ===
            user::CreateUserRequest, user::UpdateUserRequest, user::UpdateProfileRequest,

            // === Role Types ===
            role::CreateRoleRequest, role::UpdateRoleRequest, role::CreateAssignmentRequest,

            // === Shared Types ===
            TaskAck, IngestReport,

            // === Health Types ===
            health::HealthResponse, health::HealthStatus,
            health::HealthDetails, health::ComponentHealth,

            // === Core Domain Types (from tickerwire-core) ===
            NewsSource, NewsArticle, StockMention, NewsCategory, ArticleCategory,
            User, UserProfile, UserRole, UserRoleAssignment,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier for OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            // API Key authentication (header)
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();

        assert_eq!(openapi.info.title, "Tickerwire API");
        assert_eq!(openapi.info.version, "0.1.0");

        let tags = openapi
            .tags
            .as_ref()
            .ok_or_else(|| "OpenAPI tags missing".to_string())?;
        assert_eq!(tags.len(), 8);

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.security_schemes.contains_key("api_key"));
        Ok(())
    }

    #[test]
    fn test_entity_schemas_use_uuid_and_datetime_formats() {
        let json = ApiDoc::to_json().unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        let article = &doc["components"]["schemas"]["NewsArticle"]["properties"];

        assert_eq!(article["article_id"]["format"], "uuid");
        assert_eq!(article["published_at"]["format"], "date-time");
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;

        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;

        assert!(json.contains("Tickerwire API"));
        assert!(json.contains("\"api_key\""));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();

        assert!(!openapi.paths.paths.is_empty());

        assert!(openapi.paths.paths.contains_key("/api/v1/sources"));
        assert!(openapi.paths.paths.contains_key("/api/v1/sources/{id}/ingest"));
        assert!(openapi.paths.paths.contains_key("/api/v1/articles"));
        assert!(openapi.paths.paths.contains_key("/api/v1/articles/{id}/similar"));
        assert!(openapi.paths.paths.contains_key("/api/v1/stock-mentions"));
        assert!(openapi.paths.paths.contains_key("/api/v1/categories"));
        assert!(openapi.paths.paths.contains_key("/api/v1/article-categories"));
        assert!(openapi.paths.paths.contains_key("/api/v1/users"));
        assert!(openapi.paths.paths.contains_key("/api/v1/users/{id}/profile"));
        assert!(openapi.paths.paths.contains_key("/api/v1/roles"));
        assert!(openapi.paths.paths.contains_key("/api/v1/role-assignments"));
        assert!(openapi.paths.paths.contains_key("/health/ready"));
    }
}
