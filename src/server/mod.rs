//! HTTP surface: the GitHub proxy, the cached gateway and the metrics endpoints.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use anyhow::Context;
use axum::{Router, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::cache::CacheGateway;
use crate::github::GithubSource;
use crate::util::config::ServerConfig;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub gateway: CacheGateway,
    pub github: Arc<dyn GithubSource>,
}

impl AppState {
    pub fn new(gateway: CacheGateway, github: Arc<dyn GithubSource>) -> Self {
        Self { gateway, github }
    }
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/github/repos", get(handlers::proxy_repos))
        .route("/users/{user_id}/repos", get(handlers::list_repositories))
        .route(
            "/users/{user_id}/repos/{repo_id}/pulls",
            get(handlers::list_pull_requests),
        )
        .route(
            "/users/{user_id}/repos/{repo_id}/pulse",
            get(handlers::repository_pulse),
        )
        .route("/simulate", get(handlers::simulate));

    let app = Router::new()
        .route("/", get(handlers::root))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if config.enable_cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Server running");

    axum::serve(listener, build_router(state, config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
