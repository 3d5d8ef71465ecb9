/// Workflow definition and workflow execution records
///
/// Steps are an ordered list of JSON objects (conventionally `{type, config}`)
/// stored exactly as given. Nothing walks them.

use super::{require_text, JsonObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

text_enum! {
    /// What is meant to start a workflow. Stored only.
    TriggerType {
        Webhook => "webhook",
        Schedule => "schedule",
        Manual => "manual",
        Event => "event",
    }
}

text_enum! {
    /// Recorded state of a workflow execution. No transition table is enforced.
    WorkflowExecutionStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        Cancelled => "cancelled",
        Timeout => "timeout",
    }
}

/// A stored workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    /// Unique across workflows
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub trigger_type: TriggerType,
    pub trigger_config: JsonObject,
    pub steps: Vec<JsonObject>,
    pub variables: JsonObject,
    pub timeout_seconds: i64,
    pub retry_policy: JsonObject,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST body for a workflow
#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub trigger_config: JsonObject,
    #[serde(default)]
    pub steps: Vec<JsonObject>,
    #[serde(default)]
    pub variables: JsonObject,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
    #[serde(default = "default_retry_policy")]
    pub retry_policy: JsonObject,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewWorkflow {
    pub fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name)?;
        validate_timeout(self.timeout_seconds)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_seconds() -> i64 {
    300
}

fn default_retry_policy() -> JsonObject {
    match json!({"max_retries": 3, "backoff": "exponential"}) {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

fn validate_timeout(timeout_seconds: i64) -> Result<(), String> {
    if timeout_seconds < 1 {
        Err("timeout_seconds must be at least 1".to_string())
    } else {
        Ok(())
    }
}

/// PATCH body for a workflow. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub description: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub trigger_type: Option<TriggerType>,
    pub trigger_config: Option<JsonObject>,
    pub steps: Option<Vec<JsonObject>>,
    pub variables: Option<JsonObject>,
    pub timeout_seconds: Option<i64>,
    pub retry_policy: Option<JsonObject>,
}

impl WorkflowUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        match self.timeout_seconds {
            Some(timeout) => validate_timeout(timeout),
            None => Ok(()),
        }
    }
}

impl Workflow {
    pub fn apply(&mut self, update: WorkflowUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(trigger_type) = update.trigger_type {
            self.trigger_type = trigger_type;
        }
        if let Some(trigger_config) = update.trigger_config {
            self.trigger_config = trigger_config;
        }
        if let Some(steps) = update.steps {
            self.steps = steps;
        }
        if let Some(variables) = update.variables {
            self.variables = variables;
        }
        if let Some(timeout_seconds) = update.timeout_seconds {
            self.timeout_seconds = timeout_seconds;
        }
        if let Some(retry_policy) = update.retry_policy {
            self.retry_policy = retry_policy;
        }
    }

    /// Seed values for a new execution of this workflow
    ///
    /// The execution starts `pending` with `total_steps` taken from the
    /// definition and the workflow variables overlaid with the trigger data.
    pub fn seed_execution(&self, request: &NewWorkflowExecution) -> ExecutionSeed {
        let mut variables = self.variables.clone();
        if let Some(trigger_data) = &request.trigger_data {
            for (key, value) in trigger_data {
                variables.insert(key.clone(), value.clone());
            }
        }
        ExecutionSeed {
            total_steps: self.steps.len() as i64,
            variables,
        }
    }
}

/// Values derived from the parent workflow when an execution is created
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSeed {
    pub total_steps: i64,
    pub variables: JsonObject,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowFilter {
    pub enabled: Option<bool>,
    pub trigger_type: Option<TriggerType>,
}

/// One recorded run of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: i64,
    pub workflow_id: i64,
    pub status: WorkflowExecutionStatus,
    pub trigger_source: Option<String>,
    pub trigger_data: Option<JsonObject>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub current_step: i64,
    pub total_steps: i64,
    pub step_results: Vec<Value>,
    pub variables: JsonObject,
    pub error_message: Option<String>,
    pub error_traceback: Option<String>,
    pub logs: Vec<Value>,
}

/// POST body for a workflow execution
///
/// `workflow_id` may be present in the body but the path parameter always wins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWorkflowExecution {
    #[serde(default)]
    pub workflow_id: Option<i64>,
    #[serde(default)]
    pub trigger_source: Option<String>,
    #[serde(default)]
    pub trigger_data: Option<JsonObject>,
}

/// PATCH body for a workflow execution
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowExecutionUpdate {
    pub status: Option<WorkflowExecutionStatus>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub duration_ms: Option<Option<i64>>,
    pub current_step: Option<i64>,
    pub step_results: Option<Vec<Value>>,
    pub variables: Option<JsonObject>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub error_message: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub error_traceback: Option<Option<String>>,
    pub logs: Option<Vec<Value>>,
}

impl WorkflowExecutionUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_ms.flatten().is_some_and(|n| n < 0)
            || self.current_step.is_some_and(|n| n < 0)
        {
            return Err("duration_ms and current_step must not be negative".to_string());
        }
        Ok(())
    }
}

impl WorkflowExecution {
    pub fn apply(&mut self, update: WorkflowExecutionUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(completed_at) = update.completed_at {
            self.completed_at = completed_at;
        }
        if let Some(duration_ms) = update.duration_ms {
            self.duration_ms = duration_ms;
        }
        if let Some(current_step) = update.current_step {
            self.current_step = current_step;
        }
        if let Some(step_results) = update.step_results {
            self.step_results = step_results;
        }
        if let Some(variables) = update.variables {
            self.variables = variables;
        }
        if let Some(error_message) = update.error_message {
            self.error_message = error_message;
        }
        if let Some(error_traceback) = update.error_traceback {
            self.error_traceback = error_traceback;
        }
        if let Some(logs) = update.logs {
            self.logs = logs;
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowExecutionFilter {
    pub workflow_id: i64,
    pub status: Option<WorkflowExecutionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow_with(steps: usize, variables: Value) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: 7,
            name: "onboarding".into(),
            description: None,
            enabled: true,
            trigger_type: TriggerType::Manual,
            trigger_config: JsonObject::new(),
            steps: (0..steps)
                .map(|i| match json!({"type": "http", "config": {"n": i}}) {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                })
                .collect(),
            variables: variables.as_object().cloned().unwrap_or_default(),
            timeout_seconds: 300,
            retry_policy: default_retry_policy(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn seed_counts_steps_and_overlays_trigger_data() {
        let workflow = workflow_with(3, json!({"env": "prod", "retries": 1}));
        let request = NewWorkflowExecution {
            trigger_data: json!({"retries": 5, "user": "ada"}).as_object().cloned(),
            ..Default::default()
        };
        let seed = workflow.seed_execution(&request);
        assert_eq!(seed.total_steps, 3);
        assert_eq!(Value::Object(seed.variables), json!({"env": "prod", "retries": 5, "user": "ada"}));
    }

    #[test]
    fn seed_without_trigger_data_copies_variables() {
        let workflow = workflow_with(0, json!({"env": "dev"}));
        let seed = workflow.seed_execution(&NewWorkflowExecution::default());
        assert_eq!(seed.total_steps, 0);
        assert_eq!(Value::Object(seed.variables), json!({"env": "dev"}));
    }

    #[test]
    fn unknown_trigger_type_fails_to_deserialize() {
        let result: Result<NewWorkflow, _> = serde_json::from_value(json!({
            "name": "x",
            "trigger_type": "telepathy",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn steps_must_be_objects() {
        let result: Result<NewWorkflow, _> = serde_json::from_value(json!({
            "name": "x",
            "trigger_type": "manual",
            "steps": ["not-an-object"],
        }));
        assert!(result.is_err());
    }
}
