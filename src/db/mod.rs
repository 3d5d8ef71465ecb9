/// Database connection pool and schema bootstrap
///
/// One SQLite pool for the whole process, created at startup and shared
/// through `AppState`. Tables are created with `IF NOT EXISTS`, there is no
/// migration history.

use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::{str::FromStr, time::Duration};

/// How long a writer waits for the lock before giving up with `SQLITE_BUSY`
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Table and index definitions, executed in order at startup
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS webhook_inbox (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source TEXT NOT NULL,
        event_type TEXT,
        method TEXT NOT NULL,
        path TEXT NOT NULL,
        headers TEXT NOT NULL DEFAULT '{}',
        query_params TEXT NOT NULL DEFAULT '{}',
        body TEXT,
        raw_body TEXT,
        ip_address TEXT,
        user_agent TEXT,
        status TEXT NOT NULL DEFAULT 'received',
        processed_at TEXT,
        error_message TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_webhook_source_created ON webhook_inbox(source, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_webhook_status_created ON webhook_inbox(status, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS scheduled_tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        task_type TEXT NOT NULL,
        schedule TEXT,
        enabled INTEGER NOT NULL DEFAULT 1,
        config TEXT NOT NULL DEFAULT '{}',
        retry_policy TEXT NOT NULL DEFAULT '{}',
        last_run_at TEXT,
        next_run_at TEXT,
        success_count INTEGER NOT NULL DEFAULT 0,
        failure_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_task_type_enabled ON scheduled_tasks(task_type, enabled)",
    "CREATE INDEX IF NOT EXISTS idx_task_enabled_next_run ON scheduled_tasks(enabled, next_run_at)",
    r#"
    CREATE TABLE IF NOT EXISTS task_executions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id INTEGER NOT NULL REFERENCES scheduled_tasks(id) ON DELETE RESTRICT,
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        duration_ms INTEGER,
        input_data TEXT,
        output_data TEXT,
        error_message TEXT,
        error_traceback TEXT,
        retry_count INTEGER NOT NULL DEFAULT 0,
        logs TEXT NOT NULL DEFAULT '[]'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_execution_task_status ON task_executions(task_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_execution_task_started ON task_executions(task_id, started_at)",
    r#"
    CREATE TABLE IF NOT EXISTS workflows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        enabled INTEGER NOT NULL DEFAULT 1,
        trigger_type TEXT NOT NULL,
        trigger_config TEXT NOT NULL DEFAULT '{}',
        steps TEXT NOT NULL DEFAULT '[]',
        variables TEXT NOT NULL DEFAULT '{}',
        timeout_seconds INTEGER NOT NULL DEFAULT 300,
        retry_policy TEXT NOT NULL DEFAULT '{}',
        created_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_workflow_enabled_trigger ON workflows(enabled, trigger_type)",
    r#"
    CREATE TABLE IF NOT EXISTS workflow_executions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE RESTRICT,
        status TEXT NOT NULL,
        trigger_source TEXT,
        trigger_data TEXT,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        duration_ms INTEGER,
        current_step INTEGER NOT NULL DEFAULT 0,
        total_steps INTEGER NOT NULL DEFAULT 0,
        step_results TEXT NOT NULL DEFAULT '[]',
        variables TEXT NOT NULL DEFAULT '{}',
        error_message TEXT,
        error_traceback TEXT,
        logs TEXT NOT NULL DEFAULT '[]'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_workflow_exec_workflow_status ON workflow_executions(workflow_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_workflow_exec_workflow_started ON workflow_executions(workflow_id, started_at)",
    r#"
    CREATE TABLE IF NOT EXISTS api_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        correlation_id TEXT,
        method TEXT NOT NULL,
        path TEXT NOT NULL,
        full_url TEXT,
        status_code INTEGER NOT NULL,
        request_headers TEXT NOT NULL DEFAULT '{}',
        request_body TEXT,
        response_headers TEXT NOT NULL DEFAULT '{}',
        response_body TEXT,
        duration_ms INTEGER NOT NULL,
        ip_address TEXT,
        user_agent TEXT,
        user_id TEXT,
        error_message TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_api_log_correlation ON api_logs(correlation_id)",
    "CREATE INDEX IF NOT EXISTS idx_api_log_path_created ON api_logs(path, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_api_log_status_created ON api_logs(status_code, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_api_log_user_created ON api_logs(user_id, created_at)",
];

/// Open the pool described by `config` and make sure every table exists
///
/// In-memory databases live as long as their connection, so they get a single
/// connection that is never reaped. File databases run in WAL mode so readers
/// never block the writer, and have their parent directory created on demand.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let mut options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid DATABASE_URL '{}'", config.url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let in_memory = is_in_memory(&config.url);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory '{}'", parent.display())
                })?;
            }
        }
        SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
    };

    tracing::info!("🗄️ Opening database pool: {}", config.url);
    let pool = pool_options.connect_with(options).await?;

    init_schema(&pool).await?;
    tracing::info!("✅ Database schema ready");

    Ok(pool)
}

/// Create tables and indexes. Safe to call repeatedly.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Schema statement failed: {}", statement.trim()))?;
    }
    Ok(())
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }

    #[test]
    fn memory_urls_are_detected() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://file:test?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://data/automation.db"));
    }

    #[tokio::test]
    async fn file_databases_use_wal() {
        let path = std::env::temp_dir()
            .join(format!("automation-inbox-wal-{}.db", uuid::Uuid::new_v4()));
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
        };

        let pool = connect(&config).await.unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }

        assert_eq!(mode, "wal");
    }

    #[tokio::test]
    async fn schema_init_is_idempotent() {
        let pool = connect(&memory_config()).await.unwrap();
        init_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(name,)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "api_logs",
                "scheduled_tasks",
                "task_executions",
                "webhook_inbox",
                "workflow_executions",
                "workflows"
            ]
        );
    }
}
