/// Scheduled task and task execution records
///
/// A task is inert metadata: `schedule` is never parsed and nothing fires an
/// execution. Executions are created only by explicit API calls.

use super::{require_text, JsonObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

text_enum! {
    /// Recorded outcome of a task execution. No transition table is enforced.
    TaskExecutionStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
    }
}

/// A stored scheduled task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub task_type: String,
    /// Opaque schedule text, e.g. a cron expression
    pub schedule: Option<String>,
    pub enabled: bool,
    pub config: JsonObject,
    pub retry_policy: JsonObject,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    /// Caller-maintained counter
    pub success_count: i64,
    /// Caller-maintained counter
    pub failure_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST body for a scheduled task
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub task_type: String,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: JsonObject,
    #[serde(default = "default_retry_policy")]
    pub retry_policy: JsonObject,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name)?;
        require_text("task_type", &self.task_type)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_retry_policy() -> JsonObject {
    match json!({"max_retries": 3, "backoff": "exponential", "initial_delay": 60}) {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// PATCH body for a scheduled task. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
    pub task_type: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub schedule: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub config: Option<JsonObject>,
    pub retry_policy: Option<JsonObject>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub last_run_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub next_run_at: Option<Option<DateTime<Utc>>>,
    pub success_count: Option<i64>,
    pub failure_count: Option<i64>,
}

impl TaskUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(task_type) = &self.task_type {
            require_text("task_type", task_type)?;
        }
        if self.success_count.is_some_and(|n| n < 0) || self.failure_count.is_some_and(|n| n < 0) {
            return Err("counters must not be negative".to_string());
        }
        Ok(())
    }
}

impl ScheduledTask {
    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(task_type) = update.task_type {
            self.task_type = task_type;
        }
        if let Some(schedule) = update.schedule {
            self.schedule = schedule;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(config) = update.config {
            self.config = config;
        }
        if let Some(retry_policy) = update.retry_policy {
            self.retry_policy = retry_policy;
        }
        if let Some(last_run_at) = update.last_run_at {
            self.last_run_at = last_run_at;
        }
        if let Some(next_run_at) = update.next_run_at {
            self.next_run_at = next_run_at;
        }
        if let Some(success_count) = update.success_count {
            self.success_count = success_count;
        }
        if let Some(failure_count) = update.failure_count {
            self.failure_count = failure_count;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub enabled: Option<bool>,
    pub task_type: Option<String>,
}

/// One recorded run of a scheduled task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: i64,
    pub task_id: i64,
    pub status: TaskExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub input_data: Option<JsonObject>,
    pub output_data: Option<JsonObject>,
    pub error_message: Option<String>,
    pub error_traceback: Option<String>,
    pub retry_count: i64,
    pub logs: Vec<Value>,
}

/// POST body for a task execution
///
/// `task_id` may be present in the body but the path parameter always wins.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTaskExecution {
    #[serde(default)]
    pub task_id: Option<i64>,
    pub status: TaskExecutionStatus,
    #[serde(default)]
    pub input_data: Option<JsonObject>,
}

/// PATCH body for a task execution
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskExecutionUpdate {
    pub status: Option<TaskExecutionStatus>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub duration_ms: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub output_data: Option<Option<JsonObject>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub error_message: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub error_traceback: Option<Option<String>>,
    pub retry_count: Option<i64>,
    pub logs: Option<Vec<Value>>,
}

impl TaskExecutionUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_ms.flatten().is_some_and(|n| n < 0)
            || self.retry_count.is_some_and(|n| n < 0)
        {
            return Err("duration_ms and retry_count must not be negative".to_string());
        }
        Ok(())
    }
}

impl TaskExecution {
    pub fn apply(&mut self, update: TaskExecutionUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(completed_at) = update.completed_at {
            self.completed_at = completed_at;
        }
        if let Some(duration_ms) = update.duration_ms {
            self.duration_ms = duration_ms;
        }
        if let Some(output_data) = update.output_data {
            self.output_data = output_data;
        }
        if let Some(error_message) = update.error_message {
            self.error_message = error_message;
        }
        if let Some(error_traceback) = update.error_traceback {
            self.error_traceback = error_traceback;
        }
        if let Some(retry_count) = update.retry_count {
            self.retry_count = retry_count;
        }
        if let Some(logs) = update.logs {
            self.logs = logs;
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskExecutionFilter {
    pub task_id: i64,
    pub status: Option<TaskExecutionStatus>,
}
