/// Workflow definition and workflow execution persistence
///
/// Definitions are stored column-per-field with `steps`, `variables` and the
/// other free-form parts as JSON text.

use super::{
    begin_write, enum_column, json_column, optional_json_column, to_json, to_optional_json,
    DeleteOutcome,
};
use crate::models::{
    NewWorkflow, NewWorkflowExecution, Page, PageParams, Workflow, WorkflowExecution,
    WorkflowExecutionFilter, WorkflowExecutionStatus, WorkflowExecutionUpdate, WorkflowFilter,
    WorkflowUpdate,
};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqlitePool, SqliteRow},
    QueryBuilder, Row, Sqlite,
};

/// Outcome of asking for a new workflow execution
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionStart {
    Created(WorkflowExecution),
    WorkflowNotFound,
    WorkflowDisabled,
}

#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    pool: SqlitePool,
}

impl WorkflowStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Whether another workflow already uses `name`
    pub async fn name_taken(&self, name: &str, except_id: Option<i64>) -> Result<bool> {
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM workflows WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(matches!(existing, Some(id) if Some(id) != except_id))
    }

    pub async fn create(&self, workflow: &NewWorkflow) -> Result<Workflow> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO workflows (
                name, description, enabled, trigger_type, trigger_config, steps,
                variables, timeout_seconds, retry_policy, created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.enabled)
        .bind(workflow.trigger_type.as_str())
        .bind(to_json(&workflow.trigger_config)?)
        .bind(to_json(&workflow.steps)?)
        .bind(to_json(&workflow.variables)?)
        .bind(workflow.timeout_seconds)
        .bind(to_json(&workflow.retry_policy)?)
        .bind(&workflow.created_by)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .with_context(|| format!("Workflow {} missing right after insert", id))
    }

    pub async fn get(&self, id: i64) -> Result<Option<Workflow>> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(workflow_from_row).transpose()
    }

    /// Newest first
    pub async fn list(&self, filter: &WorkflowFilter, page: PageParams) -> Result<Page<Workflow>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM workflows WHERE 1 = 1");
        push_workflow_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM workflows WHERE 1 = 1");
        push_workflow_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = query.build().fetch_all(&self.pool).await?;

        let items = rows.iter().map(workflow_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    pub async fn update(&self, id: i64, update: WorkflowUpdate) -> Result<Option<Workflow>> {
        let mut tx = begin_write(&self.pool).await?;

        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut workflow = workflow_from_row(&row)?;
        workflow.apply(update);
        workflow.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE workflows
            SET name = ?, description = ?, enabled = ?, trigger_type = ?, trigger_config = ?,
                steps = ?, variables = ?, timeout_seconds = ?, retry_policy = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(workflow.enabled)
        .bind(workflow.trigger_type.as_str())
        .bind(to_json(&workflow.trigger_config)?)
        .bind(to_json(&workflow.steps)?)
        .bind(to_json(&workflow.variables)?)
        .bind(workflow.timeout_seconds)
        .bind(to_json(&workflow.retry_policy)?)
        .bind(workflow.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(workflow))
    }

    /// Delete a workflow unless executions still reference it
    pub async fn delete(&self, id: i64) -> Result<DeleteOutcome> {
        let mut tx = begin_write(&self.pool).await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(DeleteOutcome::NotFound);
        }

        let children: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM workflow_executions WHERE workflow_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if children > 0 {
            return Ok(DeleteOutcome::HasChildren(children));
        }

        sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(DeleteOutcome::Deleted)
    }

    /// Record a `pending` execution of `workflow_id`
    ///
    /// Nothing is inserted when the workflow is missing or disabled.
    pub async fn create_execution(
        &self,
        workflow_id: i64,
        request: &NewWorkflowExecution,
    ) -> Result<ExecutionStart> {
        let mut tx = begin_write(&self.pool).await?;

        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(workflow_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(ExecutionStart::WorkflowNotFound);
        };
        let workflow = workflow_from_row(&row)?;
        if !workflow.enabled {
            return Ok(ExecutionStart::WorkflowDisabled);
        }

        let seed = workflow.seed_execution(request);
        let result = sqlx::query(
            r#"
            INSERT INTO workflow_executions (
                workflow_id, status, trigger_source, trigger_data, started_at,
                current_step, total_steps, step_results, variables, logs
            )
            VALUES (?, ?, ?, ?, ?, 0, ?, '[]', ?, '[]')
            "#,
        )
        .bind(workflow_id)
        .bind(WorkflowExecutionStatus::Pending.as_str())
        .bind(&request.trigger_source)
        .bind(to_optional_json(&request.trigger_data)?)
        .bind(Utc::now())
        .bind(seed.total_steps)
        .bind(to_json(&seed.variables)?)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let id = result.last_insert_rowid();
        let execution = self
            .get_execution(id)
            .await?
            .with_context(|| format!("Workflow execution {} missing right after insert", id))?;
        Ok(ExecutionStart::Created(execution))
    }

    pub async fn get_execution(&self, id: i64) -> Result<Option<WorkflowExecution>> {
        let row = sqlx::query("SELECT * FROM workflow_executions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(execution_from_row).transpose()
    }

    /// Most recently started first
    pub async fn list_executions(
        &self,
        filter: &WorkflowExecutionFilter,
        page: PageParams,
    ) -> Result<Page<WorkflowExecution>> {
        let mut count =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM workflow_executions WHERE 1 = 1");
        push_execution_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT * FROM workflow_executions WHERE 1 = 1");
        push_execution_filters(&mut query, filter);
        query
            .push(" ORDER BY started_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = query.build().fetch_all(&self.pool).await?;

        let items = rows.iter().map(execution_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    pub async fn update_execution(
        &self,
        id: i64,
        update: WorkflowExecutionUpdate,
    ) -> Result<Option<WorkflowExecution>> {
        let mut tx = begin_write(&self.pool).await?;

        let row = sqlx::query("SELECT * FROM workflow_executions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut execution = execution_from_row(&row)?;
        execution.apply(update);

        sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = ?, completed_at = ?, duration_ms = ?, current_step = ?,
                step_results = ?, variables = ?, error_message = ?, error_traceback = ?, logs = ?
            WHERE id = ?
            "#,
        )
        .bind(execution.status.as_str())
        .bind(execution.completed_at)
        .bind(execution.duration_ms)
        .bind(execution.current_step)
        .bind(to_json(&execution.step_results)?)
        .bind(to_json(&execution.variables)?)
        .bind(&execution.error_message)
        .bind(&execution.error_traceback)
        .bind(to_json(&execution.logs)?)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(execution))
    }
}

fn push_workflow_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &WorkflowFilter) {
    if let Some(enabled) = filter.enabled {
        builder.push(" AND enabled = ").push_bind(enabled);
    }
    if let Some(trigger_type) = filter.trigger_type {
        builder.push(" AND trigger_type = ").push_bind(trigger_type.as_str());
    }
}

fn push_execution_filters(
    builder: &mut QueryBuilder<'_, Sqlite>,
    filter: &WorkflowExecutionFilter,
) {
    builder.push(" AND workflow_id = ").push_bind(filter.workflow_id);
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

fn workflow_from_row(row: &SqliteRow) -> Result<Workflow> {
    Ok(Workflow {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        enabled: row.try_get("enabled")?,
        trigger_type: enum_column(row, "trigger_type")?,
        trigger_config: json_column(row, "trigger_config")?,
        steps: json_column(row, "steps")?,
        variables: json_column(row, "variables")?,
        timeout_seconds: row.try_get("timeout_seconds")?,
        retry_policy: json_column(row, "retry_policy")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn execution_from_row(row: &SqliteRow) -> Result<WorkflowExecution> {
    Ok(WorkflowExecution {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        status: enum_column(row, "status")?,
        trigger_source: row.try_get("trigger_source")?,
        trigger_data: optional_json_column(row, "trigger_data")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_ms: row.try_get("duration_ms")?,
        current_step: row.try_get("current_step")?,
        total_steps: row.try_get("total_steps")?,
        step_results: json_column(row, "step_results")?,
        variables: json_column(row, "variables")?,
        error_message: row.try_get("error_message")?,
        error_traceback: row.try_get("error_traceback")?,
        logs: json_column(row, "logs")?,
    })
}
