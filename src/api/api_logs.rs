/// Persisted request log endpoints
///
/// Read and prune the rows written by the request logging middleware, plus an
/// aggregate summary over a time window.

use super::{
    error::ApiError,
    extract::{AppPath, AppQuery},
    page_params, AppState,
};
use crate::models::{non_empty, ApiLog, ApiLogFilter, ApiLogStats, Page};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListApiLogsQuery {
    pub path: Option<String>,
    pub method: Option<String>,
    pub status_code: Option<i64>,
    pub user_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Create API log routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/api-logs", get(list_api_logs))
        .route("/v1/api-logs/stats/summary", get(stats_summary))
        .route("/v1/api-logs/{id}", get(get_api_log).delete(delete_api_log))
}

/// GET /v1/api-logs
async fn list_api_logs(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListApiLogsQuery>,
) -> Result<Json<Page<ApiLog>>, ApiError> {
    let page = page_params(query.page, query.size)?;
    let filter = ApiLogFilter {
        path: non_empty(query.path),
        method: non_empty(query.method),
        status_code: query.status_code,
        user_id: non_empty(query.user_id),
        start_date: query.start_date,
        end_date: query.end_date,
    };

    Ok(Json(state.api_logs.list(&filter, page).await?))
}

/// GET /v1/api-logs/{id}
async fn get_api_log(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ApiLog>, ApiError> {
    state
        .api_logs
        .get(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("API log"))
}

/// DELETE /v1/api-logs/{id}
async fn delete_api_log(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.api_logs.delete(id).await? {
        return Err(ApiError::NotFound("API log"));
    }

    tracing::info!(api_log_id = id, "🗑️ Deleted API log");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/api-logs/stats/summary?start_date=...&end_date=...
///
/// Defaults to the 24 hours ending now.
async fn stats_summary(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<StatsQuery>,
) -> Result<Json<ApiLogStats>, ApiError> {
    let (start, end) = stats_window(query.start_date, query.end_date, Utc::now())?;
    Ok(Json(state.api_logs.stats(start, end).await?))
}

fn stats_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let end = end.unwrap_or(now);
    let start = start.unwrap_or(end - Duration::hours(24));
    if start > end {
        return Err(ApiError::Validation(
            "start_date must not be after end_date".to_string(),
        ));
    }
    Ok((start, end))
}
