//! HTTP API.
//!
//! Each inbound request is an independent, stateless invocation: the shared
//! state is the immutable configuration only, and every collaborator is
//! constructed per request inside the handler. Isolation between projects is
//! by repository path.

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;

/// Shared immutable state: configuration only.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

pub fn router(config: Config) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/projects/:project/init", post(handlers::init_project))
        .route(
            "/api/projects/:project/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/api/projects/:project/tasks/plan",
            post(handlers::plan_tasks),
        )
        .route(
            "/api/projects/:project/tasks/implement-all",
            post(handlers::implement_all),
        )
        .route(
            "/api/projects/:project/tasks/:task_id",
            patch(handlers::update_task).delete(handlers::delete_task),
        )
        .route(
            "/api/projects/:project/tasks/:task_id/implement",
            post(handlers::implement_task),
        )
        .route("/api/projects/:project/chat", post(handlers::chat))
        .route("/api/projects/:project/deploy", post(handlers::deploy))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = router(config);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
