/// Webhook inbox records
///
/// A captured inbound HTTP callback, stored verbatim for later inspection.

use super::JsonObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

text_enum! {
    /// Processing state of a captured webhook. Callers move it freely.
    WebhookStatus {
        Received => "received",
        Processed => "processed",
        Failed => "failed",
    }
}

/// A stored webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookInbox {
    pub id: i64,
    /// Sender identifier taken from the URL (e.g. "github", "stripe")
    pub source: String,
    pub event_type: Option<String>,
    pub method: String,
    pub path: String,
    /// Lowercase header name to value
    pub headers: JsonObject,
    pub query_params: JsonObject,
    /// Parsed JSON body, when the body was JSON
    pub body: Option<Value>,
    /// Body text, when the body was not JSON
    pub raw_body: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: WebhookStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything captured from an inbound webhook request
#[derive(Debug, Clone, Default)]
pub struct NewWebhook {
    pub source: String,
    pub event_type: Option<String>,
    pub method: String,
    pub path: String,
    pub headers: JsonObject,
    pub query_params: JsonObject,
    pub body: Option<Value>,
    pub raw_body: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// PATCH body for a webhook. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookUpdate {
    pub status: Option<WebhookStatus>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub processed_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub error_message: Option<Option<String>>,
}

impl WebhookInbox {
    pub fn apply(&mut self, update: WebhookUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(processed_at) = update.processed_at {
            self.processed_at = processed_at;
        }
        if let Some(error_message) = update.error_message {
            self.error_message = error_message;
        }
    }
}

/// Exact-match list filters
#[derive(Debug, Clone, Default)]
pub struct WebhookFilter {
    pub source: Option<String>,
    pub event_type: Option<String>,
    pub status: Option<WebhookStatus>,
}
