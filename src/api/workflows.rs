/// Workflow and workflow execution endpoints
///
/// Workflows are stored definitions only. Creating an execution records a
/// `pending` run seeded from the definition; progressing it is up to the
/// caller through the execution PATCH route.

use super::{
    error::ApiError,
    extract::{AppJson, AppPath, AppQuery},
    page_params, AppState,
};
use crate::{
    models::{
        NewWorkflow, NewWorkflowExecution, Page, TriggerType, Workflow, WorkflowExecution,
        WorkflowExecutionFilter, WorkflowExecutionStatus, WorkflowExecutionUpdate, WorkflowFilter,
        WorkflowUpdate,
    },
    storage::{workflows::ExecutionStart, DeleteOutcome},
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
pub struct ListWorkflowsQuery {
    pub enabled: Option<bool>,
    pub trigger_type: Option<TriggerType>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    pub status: Option<WorkflowExecutionStatus>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Create workflow management routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/workflows", get(list_workflows).post(create_workflow))
        .route(
            "/v1/workflows/{id}",
            get(get_workflow).patch(update_workflow).delete(delete_workflow),
        )
        .route(
            "/v1/workflows/{id}/executions",
            get(list_executions).post(create_execution),
        )
        .route(
            "/v1/workflows/executions/{execution_id}",
            get(get_execution).patch(update_execution),
        )
}

fn duplicate_name(name: &str) -> ApiError {
    ApiError::BadRequest(format!("Workflow with name '{}' already exists", name))
}

/// A concurrent writer can still win the race past `name_taken`; the UNIQUE
/// index then rejects the insert.
fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|err| err.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}

/// POST /v1/workflows
async fn create_workflow(
    State(state): State<AppState>,
    AppJson(workflow): AppJson<NewWorkflow>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    workflow.validate().map_err(ApiError::Validation)?;

    if state.workflows.name_taken(&workflow.name, None).await? {
        return Err(duplicate_name(&workflow.name));
    }

    let created = match state.workflows.create(&workflow).await {
        Ok(created) => created,
        Err(err) if is_unique_violation(&err) => return Err(duplicate_name(&workflow.name)),
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        workflow_id = created.id,
        name = %created.name,
        steps = created.steps.len(),
        "🔥 Created workflow"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /v1/workflows
async fn list_workflows(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListWorkflowsQuery>,
) -> Result<Json<Page<Workflow>>, ApiError> {
    let page = page_params(query.page, query.size)?;
    let filter = WorkflowFilter {
        enabled: query.enabled,
        trigger_type: query.trigger_type,
    };

    Ok(Json(state.workflows.list(&filter, page).await?))
}

/// GET /v1/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Workflow>, ApiError> {
    state
        .workflows
        .get(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Workflow"))
}

/// PATCH /v1/workflows/{id}
async fn update_workflow(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(update): AppJson<WorkflowUpdate>,
) -> Result<Json<Workflow>, ApiError> {
    update.validate().map_err(ApiError::Validation)?;

    if let Some(name) = &update.name {
        if state.workflows.name_taken(name, Some(id)).await? {
            return Err(duplicate_name(name));
        }
    }

    let renamed_to = update.name.clone();
    let workflow = match state.workflows.update(id, update).await {
        Ok(workflow) => workflow.ok_or(ApiError::NotFound("Workflow"))?,
        Err(err) if is_unique_violation(&err) => {
            return Err(duplicate_name(renamed_to.as_deref().unwrap_or_default()))
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(workflow_id = id, name = %workflow.name, "✏️ Updated workflow");
    Ok(Json(workflow))
}

/// DELETE /v1/workflows/{id}
///
/// Refused with 409 while executions still reference the workflow.
async fn delete_workflow(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    match state.workflows.delete(id).await? {
        DeleteOutcome::Deleted => {
            tracing::info!(workflow_id = id, "🗑️ Deleted workflow");
            Ok(StatusCode::NO_CONTENT)
        }
        DeleteOutcome::NotFound => Err(ApiError::NotFound("Workflow")),
        DeleteOutcome::HasChildren(count) => Err(ApiError::Conflict(format!(
            "Workflow has {} execution(s) and cannot be deleted",
            count
        ))),
    }
}

/// POST /v1/workflows/{id}/executions
///
/// Body: { "trigger_source": "...", "trigger_data": { ... } }, both optional
async fn create_execution(
    State(state): State<AppState>,
    AppPath(workflow_id): AppPath<i64>,
    AppJson(request): AppJson<NewWorkflowExecution>,
) -> Result<(StatusCode, Json<WorkflowExecution>), ApiError> {
    match state.workflows.create_execution(workflow_id, &request).await? {
        ExecutionStart::Created(execution) => {
            tracing::info!(
                workflow_id,
                execution_id = execution.id,
                total_steps = execution.total_steps,
                "🚀 Workflow execution created"
            );
            Ok((StatusCode::CREATED, Json(execution)))
        }
        ExecutionStart::WorkflowNotFound => Err(ApiError::NotFound("Workflow")),
        ExecutionStart::WorkflowDisabled => Err(ApiError::BadRequest(
            "Workflow is disabled".to_string(),
        )),
    }
}

/// GET /v1/workflows/{id}/executions
async fn list_executions(
    State(state): State<AppState>,
    AppPath(workflow_id): AppPath<i64>,
    AppQuery(query): AppQuery<ListExecutionsQuery>,
) -> Result<Json<Page<WorkflowExecution>>, ApiError> {
    let page = page_params(query.page, query.size)?;
    let filter = WorkflowExecutionFilter {
        workflow_id,
        status: query.status,
    };

    Ok(Json(state.workflows.list_executions(&filter, page).await?))
}

/// GET /v1/workflows/executions/{execution_id}
async fn get_execution(
    State(state): State<AppState>,
    AppPath(execution_id): AppPath<i64>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    state
        .workflows
        .get_execution(execution_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Workflow execution"))
}

/// PATCH /v1/workflows/executions/{execution_id}
async fn update_execution(
    State(state): State<AppState>,
    AppPath(execution_id): AppPath<i64>,
    AppJson(update): AppJson<WorkflowExecutionUpdate>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    update.validate().map_err(ApiError::Validation)?;

    let execution = state
        .workflows
        .update_execution(execution_id, update)
        .await?
        .ok_or(ApiError::NotFound("Workflow execution"))?;

    tracing::info!(
        execution_id,
        status = %execution.status,
        current_step = execution.current_step,
        "✏️ Updated workflow execution"
    );
    Ok(Json(execution))
}
