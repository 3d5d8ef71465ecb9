/// Scheduled task and task execution persistence

use super::{
    begin_write, enum_column, json_column, optional_json_column, to_json, to_optional_json,
    DeleteOutcome,
};
use crate::models::{
    NewTask, NewTaskExecution, Page, PageParams, ScheduledTask, TaskExecution,
    TaskExecutionFilter, TaskExecutionUpdate, TaskFilter, TaskUpdate,
};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqlitePool, SqliteRow},
    QueryBuilder, Row, Sqlite,
};

#[derive(Debug, Clone)]
pub struct TaskStorage {
    pool: SqlitePool,
}

impl TaskStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, task: &NewTask) -> Result<ScheduledTask> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_tasks (
                name, description, task_type, schedule, enabled, config, retry_policy,
                success_count, failure_count, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
            "#,
        )
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.task_type)
        .bind(&task.schedule)
        .bind(task.enabled)
        .bind(to_json(&task.config)?)
        .bind(to_json(&task.retry_policy)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .with_context(|| format!("Task {} missing right after insert", id))
    }

    pub async fn get(&self, id: i64) -> Result<Option<ScheduledTask>> {
        let row = sqlx::query("SELECT * FROM scheduled_tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    /// Newest first
    pub async fn list(&self, filter: &TaskFilter, page: PageParams) -> Result<Page<ScheduledTask>> {
        let mut count =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM scheduled_tasks WHERE 1 = 1");
        push_task_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM scheduled_tasks WHERE 1 = 1");
        push_task_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = query.build().fetch_all(&self.pool).await?;

        let items = rows.iter().map(task_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    pub async fn update(&self, id: i64, update: TaskUpdate) -> Result<Option<ScheduledTask>> {
        let mut tx = begin_write(&self.pool).await?;

        let row = sqlx::query("SELECT * FROM scheduled_tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut task = task_from_row(&row)?;
        task.apply(update);
        task.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE scheduled_tasks
            SET name = ?, description = ?, task_type = ?, schedule = ?, enabled = ?,
                config = ?, retry_policy = ?, last_run_at = ?, next_run_at = ?,
                success_count = ?, failure_count = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.task_type)
        .bind(&task.schedule)
        .bind(task.enabled)
        .bind(to_json(&task.config)?)
        .bind(to_json(&task.retry_policy)?)
        .bind(task.last_run_at)
        .bind(task.next_run_at)
        .bind(task.success_count)
        .bind(task.failure_count)
        .bind(task.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(task))
    }

    /// Delete a task unless executions still reference it
    pub async fn delete(&self, id: i64) -> Result<DeleteOutcome> {
        let mut tx = begin_write(&self.pool).await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM scheduled_tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(DeleteOutcome::NotFound);
        }

        let children: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM task_executions WHERE task_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if children > 0 {
            return Ok(DeleteOutcome::HasChildren(children));
        }

        sqlx::query("DELETE FROM scheduled_tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(DeleteOutcome::Deleted)
    }

    /// Record an execution for `task_id`
    ///
    /// Returns `None` without inserting when the task does not exist. The
    /// task's counters are not touched.
    pub async fn create_execution(
        &self,
        task_id: i64,
        execution: &NewTaskExecution,
    ) -> Result<Option<TaskExecution>> {
        let mut tx = begin_write(&self.pool).await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM scheduled_tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO task_executions (task_id, status, started_at, input_data, retry_count, logs)
            VALUES (?, ?, ?, ?, 0, '[]')
            "#,
        )
        .bind(task_id)
        .bind(execution.status.as_str())
        .bind(Utc::now())
        .bind(to_optional_json(&execution.input_data)?)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let id = result.last_insert_rowid();
        self.get_execution(id)
            .await?
            .with_context(|| format!("Task execution {} missing right after insert", id))
            .map(Some)
    }

    pub async fn get_execution(&self, id: i64) -> Result<Option<TaskExecution>> {
        let row = sqlx::query("SELECT * FROM task_executions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(execution_from_row).transpose()
    }

    /// Most recently started first
    pub async fn list_executions(
        &self,
        filter: &TaskExecutionFilter,
        page: PageParams,
    ) -> Result<Page<TaskExecution>> {
        let mut count =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM task_executions WHERE 1 = 1");
        push_execution_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM task_executions WHERE 1 = 1");
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
        update: TaskExecutionUpdate,
    ) -> Result<Option<TaskExecution>> {
        let mut tx = begin_write(&self.pool).await?;

        let row = sqlx::query("SELECT * FROM task_executions WHERE id = ?")
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
            UPDATE task_executions
            SET status = ?, completed_at = ?, duration_ms = ?, output_data = ?,
                error_message = ?, error_traceback = ?, retry_count = ?, logs = ?
            WHERE id = ?
            "#,
        )
        .bind(execution.status.as_str())
        .bind(execution.completed_at)
        .bind(execution.duration_ms)
        .bind(to_optional_json(&execution.output_data)?)
        .bind(&execution.error_message)
        .bind(&execution.error_traceback)
        .bind(execution.retry_count)
        .bind(to_json(&execution.logs)?)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(execution))
    }
}

fn push_task_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TaskFilter) {
    if let Some(enabled) = filter.enabled {
        builder.push(" AND enabled = ").push_bind(enabled);
    }
    if let Some(task_type) = &filter.task_type {
        builder.push(" AND task_type = ").push_bind(task_type.clone());
    }
}

fn push_execution_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TaskExecutionFilter) {
    builder.push(" AND task_id = ").push_bind(filter.task_id);
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

fn task_from_row(row: &SqliteRow) -> Result<ScheduledTask> {
    Ok(ScheduledTask {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        task_type: row.try_get("task_type")?,
        schedule: row.try_get("schedule")?,
        enabled: row.try_get("enabled")?,
        config: json_column(row, "config")?,
        retry_policy: json_column(row, "retry_policy")?,
        last_run_at: row.try_get("last_run_at")?,
        next_run_at: row.try_get("next_run_at")?,
        success_count: row.try_get("success_count")?,
        failure_count: row.try_get("failure_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn execution_from_row(row: &SqliteRow) -> Result<TaskExecution> {
    Ok(TaskExecution {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        status: enum_column(row, "status")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_ms: row.try_get("duration_ms")?,
        input_data: optional_json_column(row, "input_data")?,
        output_data: optional_json_column(row, "output_data")?,
        error_message: row.try_get("error_message")?,
        error_traceback: row.try_get("error_traceback")?,
        retry_count: row.try_get("retry_count")?,
        logs: json_column(row, "logs")?,
    })
}
