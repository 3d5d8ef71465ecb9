/// Scheduled task and task execution endpoints
///
/// Tasks are metadata only: the `schedule` expression is stored but never
/// interpreted, and executions are recorded by whoever runs the work.

use super::{
    error::ApiError,
    extract::{AppJson, AppPath, AppQuery},
    page_params, AppState,
};
use crate::{
    models::{
        non_empty, NewTask, NewTaskExecution, Page, ScheduledTask, TaskExecution,
        TaskExecutionFilter, TaskExecutionStatus, TaskExecutionUpdate, TaskFilter, TaskUpdate,
    },
    storage::DeleteOutcome,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub enabled: Option<bool>,
    pub task_type: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    pub status: Option<TaskExecutionStatus>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Create scheduled task routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", get(list_tasks).post(create_task))
        .route(
            "/v1/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route(
            "/v1/tasks/{id}/executions",
            get(list_executions).post(create_execution),
        )
        .route(
            "/v1/tasks/executions/{execution_id}",
            get(get_execution).patch(update_execution),
        )
}

/// POST /v1/tasks
async fn create_task(
    State(state): State<AppState>,
    AppJson(task): AppJson<NewTask>,
) -> Result<(StatusCode, Json<ScheduledTask>), ApiError> {
    task.validate().map_err(ApiError::Validation)?;

    let task = state.tasks.create(&task).await?;
    tracing::info!(
        task_id = task.id,
        name = %task.name,
        task_type = %task.task_type,
        "📋 Created task"
    );

    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /v1/tasks
async fn list_tasks(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListTasksQuery>,
) -> Result<Json<Page<ScheduledTask>>, ApiError> {
    let page = page_params(query.page, query.size)?;
    let filter = TaskFilter {
        enabled: query.enabled,
        task_type: non_empty(query.task_type),
    };

    Ok(Json(state.tasks.list(&filter, page).await?))
}

/// GET /v1/tasks/{id}
async fn get_task(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ScheduledTask>, ApiError> {
    state
        .tasks
        .get(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Task"))
}

/// PATCH /v1/tasks/{id}
async fn update_task(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(update): AppJson<TaskUpdate>,
) -> Result<Json<ScheduledTask>, ApiError> {
    update.validate().map_err(ApiError::Validation)?;

    let task = state
        .tasks
        .update(id, update)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;

    tracing::info!(task_id = id, "✏️ Updated task");
    Ok(Json(task))
}

/// DELETE /v1/tasks/{id}
///
/// Refused with 409 while executions still reference the task.
async fn delete_task(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    match state.tasks.delete(id).await? {
        DeleteOutcome::Deleted => {
            tracing::info!(task_id = id, "🗑️ Deleted task");
            Ok(StatusCode::NO_CONTENT)
        }
        DeleteOutcome::NotFound => Err(ApiError::NotFound("Task")),
        DeleteOutcome::HasChildren(count) => Err(ApiError::Conflict(format!(
            "Task has {} execution(s) and cannot be deleted",
            count
        ))),
    }
}

/// POST /v1/tasks/{id}/executions
async fn create_execution(
    State(state): State<AppState>,
    AppPath(task_id): AppPath<i64>,
    AppJson(execution): AppJson<NewTaskExecution>,
) -> Result<(StatusCode, Json<TaskExecution>), ApiError> {
    let execution = state
        .tasks
        .create_execution(task_id, &execution)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;

    tracing::info!(
        task_id,
        execution_id = execution.id,
        status = %execution.status,
        "▶️ Recorded task execution"
    );
    Ok((StatusCode::CREATED, Json(execution)))
}

/// GET /v1/tasks/{id}/executions
async fn list_executions(
    State(state): State<AppState>,
    AppPath(task_id): AppPath<i64>,
    AppQuery(query): AppQuery<ListExecutionsQuery>,
) -> Result<Json<Page<TaskExecution>>, ApiError> {
    let page = page_params(query.page, query.size)?;
    let filter = TaskExecutionFilter {
        task_id,
        status: query.status,
    };

    Ok(Json(state.tasks.list_executions(&filter, page).await?))
}

/// GET /v1/tasks/executions/{execution_id}
async fn get_execution(
    State(state): State<AppState>,
    AppPath(execution_id): AppPath<i64>,
) -> Result<Json<TaskExecution>, ApiError> {
    state
        .tasks
        .get_execution(execution_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Task execution"))
}

/// PATCH /v1/tasks/executions/{execution_id}
async fn update_execution(
    State(state): State<AppState>,
    AppPath(execution_id): AppPath<i64>,
    AppJson(update): AppJson<TaskExecutionUpdate>,
) -> Result<Json<TaskExecution>, ApiError> {
    update.validate().map_err(ApiError::Validation)?;

    let execution = state
        .tasks
        .update_execution(execution_id, update)
        .await?
        .ok_or(ApiError::NotFound("Task execution"))?;

    tracing::info!(execution_id, status = %execution.status, "✏️ Updated task execution");
    Ok(Json(execution))
}
