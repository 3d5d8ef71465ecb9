/// HTTP API layer
///
/// REST endpoints under `/v1` for the webhook inbox, scheduled tasks,
/// workflows and the persisted request log. Each resource module exposes a
/// `routes()` builder; `create_api_routes` merges them and places the groups
/// selected in configuration behind the `X-API-Key` gate.

pub mod api_logs;
pub mod error;
pub mod extract;
pub mod tasks;
pub mod webhooks;
pub mod workflows;

pub use error::ApiError;

use crate::{
    config::{Config, RouteGroup},
    middleware::auth::require_api_key,
    models::PageParams,
    storage::{ApiLogStorage, TaskStorage, WebhookStorage, WorkflowStorage},
};
use axum::{middleware, Router};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Immutable settings loaded at startup
    pub config: Arc<Config>,
    pub webhooks: WebhookStorage,
    pub tasks: TaskStorage,
    pub workflows: WorkflowStorage,
    pub api_logs: ApiLogStorage,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool) -> Self {
        Self {
            config: Arc::new(config),
            webhooks: WebhookStorage::new(pool.clone()),
            tasks: TaskStorage::new(pool.clone()),
            workflows: WorkflowStorage::new(pool.clone()),
            api_logs: ApiLogStorage::new(pool),
        }
    }
}

/// Merge every resource router, gating the configured groups
pub fn create_api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(gate(webhooks::routes(), RouteGroup::Webhooks, state))
        .merge(gate(tasks::routes(), RouteGroup::Tasks, state))
        .merge(gate(workflows::routes(), RouteGroup::Workflows, state))
        .merge(gate(api_logs::routes(), RouteGroup::ApiLogs, state))
}

fn gate(routes: Router<AppState>, group: RouteGroup, state: &AppState) -> Router<AppState> {
    if state.config.requires_api_key(group) {
        tracing::info!("🔒 API key required for {:?} routes", group);
        routes.route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
    } else {
        routes
    }
}

/// Validate the `page`/`size` query pair shared by every list endpoint
pub(crate) fn page_params(page: Option<u32>, size: Option<u32>) -> Result<PageParams, ApiError> {
    PageParams::new(page, size).map_err(ApiError::Validation)
}
