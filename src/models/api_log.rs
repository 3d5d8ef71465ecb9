/// Persisted request/response log records

use super::JsonObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One logged HTTP exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLog {
    pub id: i64,
    pub correlation_id: Option<String>,
    pub method: String,
    pub path: String,
    pub full_url: Option<String>,
    pub status_code: i64,
    pub request_headers: JsonObject,
    pub request_body: Option<Value>,
    pub response_headers: JsonObject,
    pub response_body: Option<Value>,
    pub duration_ms: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row written by the request logging middleware
#[derive(Debug, Clone, Default)]
pub struct NewApiLog {
    pub correlation_id: Option<String>,
    pub method: String,
    pub path: String,
    pub full_url: Option<String>,
    pub status_code: i64,
    pub request_headers: JsonObject,
    pub request_body: Option<Value>,
    pub response_headers: JsonObject,
    pub response_body: Option<Value>,
    pub duration_ms: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
    pub error_message: Option<String>,
}

/// List filters. `path` is a substring match, everything else is exact.
#[derive(Debug, Clone, Default)]
pub struct ApiLogFilter {
    pub path: Option<String>,
    pub method: Option<String>,
    pub status_code: Option<i64>,
    pub user_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Aggregates over a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiLogStats {
    pub total_requests: i64,
    /// Percentage of 2xx/3xx responses, two decimals
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub requests_by_status: BTreeMap<i64, i64>,
    pub requests_by_path: BTreeMap<String, i64>,
    pub requests_by_method: BTreeMap<String, i64>,
}

impl ApiLogStats {
    pub fn empty() -> Self {
        Self {
            total_requests: 0,
            success_rate: 0.0,
            average_duration_ms: 0.0,
            requests_by_status: BTreeMap::new(),
            requests_by_path: BTreeMap::new(),
            requests_by_method: BTreeMap::new(),
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
