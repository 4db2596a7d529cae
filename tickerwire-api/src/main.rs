//! Tickerwire API Server Entry Point
//!
//! Bootstraps configuration, starts the background job scheduler, and
//! runs the Axum HTTP server until ctrl-c.

use std::net::SocketAddr;

use axum::Router;
use tokio::sync::watch;

use tickerwire_api::{
    background_jobs_task, create_api_router, ApiError, ApiResult, AppState, JobDeps,
};
use tickerwire_core::config::JobsConfig;

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tickerwire_api=info,tower_http=info".into()),
        )
        .init();

    let state = AppState::from_env();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let jobs_config = JobsConfig::from_env();
    let jobs_handle = tokio::spawn(background_jobs_task(
        JobDeps {
            store: state.store.clone(),
            cache: state.cache.clone(),
            ml: state.ml.clone(),
            ingest: state.ingest.clone(),
            cache_config: state.cache_config.clone(),
        },
        jobs_config,
        shutdown_rx,
    ));

    let app: Router = create_api_router(state);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Tickerwire API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = jobs_handle.await;
    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("TICKERWIRE_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("TICKERWIRE_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
