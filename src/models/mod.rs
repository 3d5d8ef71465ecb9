/// Record types for the four resource families
///
/// Each family has a stored record (what the API returns), a creation payload,
/// a partial-update payload and a list filter. JSON columns are kept as
/// `serde_json` values and never interpreted.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A JSON object column (`config`, `variables`, `headers`, ...)
pub type JsonObject = Map<String, Value>;

/// Declares a status-like enum stored as lowercase TEXT
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Column representation
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(raw: &str) -> anyhow::Result<Self> {
                match raw {
                    $($text => Ok(Self::$variant),)+
                    other => Err(anyhow::anyhow!(
                        concat!("unknown ", stringify!($name), " value: {}"),
                        other
                    )),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod api_log;
pub mod task;
pub mod webhook;
pub mod workflow;

pub use api_log::{ApiLog, ApiLogFilter, ApiLogStats, NewApiLog};
pub use task::{
    NewTask, NewTaskExecution, ScheduledTask, TaskExecution, TaskExecutionFilter,
    TaskExecutionStatus, TaskExecutionUpdate, TaskFilter, TaskUpdate,
};
pub use webhook::{NewWebhook, WebhookFilter, WebhookInbox, WebhookStatus, WebhookUpdate};
pub use workflow::{
    NewWorkflow, NewWorkflowExecution, TriggerType, Workflow, WorkflowExecution,
    WorkflowExecutionFilter, WorkflowExecutionStatus, WorkflowExecutionUpdate, WorkflowFilter,
    WorkflowUpdate,
};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Offset pagination request (`page` is 1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub size: u32,
}

impl PageParams {
    /// Validate raw query values, applying defaults for absent ones
    pub fn new(page: Option<u32>, size: Option<u32>) -> Result<Self, String> {
        let page = page.unwrap_or(1);
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err("page must be greater than or equal to 1".to_string());
        }
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(format!("size must be between 1 and {}", MAX_PAGE_SIZE));
        }
        Ok(Self { page, size })
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.size)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Paginated list envelope shared by every list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: PageParams) -> Self {
        let size = i64::from(params.size);
        Self {
            items,
            total,
            page: params.page,
            size: params.size,
            pages: (total + size - 1) / size,
        }
    }
}

/// PATCH field that may be cleared: an absent key stays `None`, an explicit
/// `null` becomes `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Drop empty query-string values so `?source=` means "no filter"
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reject blank required strings that serde accepted
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}
