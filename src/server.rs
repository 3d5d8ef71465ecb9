/// Server setup and initialization
///
/// Wires together the database pool, storages, HTTP routes and middleware.
/// Provides the application factory used by both `main` and the tests.

use crate::{
    api::{create_api_routes, ApiError, AppState},
    config::Config,
    db,
    logging::init_tracing,
    middleware::{correlation::propagate_ids, request_log::log_requests},
};
use anyhow::{Context, Result};
use axum::{
    middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the main Axum application with all routes and middleware
///
/// Opens the configured database (creating the schema when missing) and builds
/// the router on top of it.
pub async fn create_app(config: Config) -> Result<Router> {
    let pool = db::connect(&config.database)
        .await
        .context("Failed to initialize database")?;

    let state = AppState::new(config, pool);
    let app = build_router(state);

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Build the router for an existing state
///
/// Layers, outermost first: correlation ids, request log sink, HTTP trace.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(create_api_routes(&state))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(middleware::from_fn(propagate_ids))
        .with_state(state)
}

/// Start the HTTP server with the given configuration
///
/// Initializes logging, creates the application and serves until Ctrl-C.
pub async fn start_server(config: Config) -> Result<()> {
    init_tracing(&config.logging);

    tracing::info!(
        environment = %config.environment,
        "Starting {} server...",
        config.app_name
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_app(config).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Health check endpoint handler
///
/// Liveness only; never authenticated and never touches the database.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn not_found() -> impl IntoResponse {
    ApiError::NotFound("Resource")
}
