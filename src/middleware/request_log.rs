/// Request logging and the `api_logs` sink
///
/// Every request emits a started/completed event pair and gets an
/// `X-Process-Time` header (seconds). When the sink is enabled and the path is
/// not excluded, the exchange is also written to the `api_logs` table with
/// credentials redacted. A failed write is logged and otherwise ignored.

use super::correlation::RequestIds;
use crate::{
    api::{error::ErrorMessage, ApiError, AppState},
    capture::{client_ip, header_object, header_string, json_body, SENSITIVE_HEADERS},
    config::ApiLogConfig,
    models::NewApiLog,
};
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{response::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Upper bound on a request body buffered for capture
const MAX_BUFFERED_BYTES: usize = 10 * 1024 * 1024;

pub async fn log_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    tracing::info!(
        method = %method,
        path = %path,
        user_agent = header_string(req.headers(), "user-agent").as_deref().unwrap_or("-"),
        "👉 Request started"
    );

    let mut response = if should_persist(&state.config.api_log, &path) {
        capture_exchange(&state, req, next, started).await
    } else {
        next.run(req).await
    };

    let elapsed = started.elapsed();
    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "🏁 Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed.as_secs_f64())) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    response
}

fn should_persist(config: &ApiLogConfig, path: &str) -> bool {
    config.enabled
        && !config
            .exclude_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
}

/// Run the request with both bodies buffered, then write one log row
async fn capture_exchange(state: &AppState, req: Request, next: Next, started: Instant) -> Response {
    let limit = state.config.api_log.max_body_bytes;
    let (parts, body) = req.into_parts();
    let request_bytes = match to_bytes(body, MAX_BUFFERED_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return ApiError::Validation(format!("Failed to read request body: {}", err))
                .into_response()
        }
    };

    let mut log = NewApiLog {
        correlation_id: parts
            .extensions
            .get::<RequestIds>()
            .map(|ids| ids.correlation_id.clone()),
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        full_url: Some(parts.uri.to_string()),
        request_headers: header_object(&parts.headers, SENSITIVE_HEADERS),
        request_body: json_body(&request_bytes, limit),
        ip_address: client_ip(&parts.extensions, &parts.headers),
        user_agent: header_string(&parts.headers, "user-agent"),
        user_id: header_string(&parts.headers, "x-user-id"),
        ..Default::default()
    };

    let response = next
        .run(Request::from_parts(parts, Body::from(request_bytes)))
        .await;

    let (parts, response_bytes) = buffer_response(response, usize::MAX).await;

    log.status_code = i64::from(parts.status.as_u16());
    log.response_headers = header_object(&parts.headers, SENSITIVE_HEADERS);
    log.response_body = json_body(&response_bytes, limit);
    log.duration_ms = started.elapsed().as_millis() as i64;
    if parts.status.is_server_error() {
        log.error_message = parts
            .extensions
            .get::<ErrorMessage>()
            .map(|message| message.0.clone())
            .or_else(|| parts.status.canonical_reason().map(str::to_string));
    }

    if let Err(err) = state.api_logs.insert(&log).await {
        tracing::warn!(error = %err, path = %log.path, "⚠️ Failed to persist API log");
    }

    Response::from_parts(parts, Body::from(response_bytes))
}

/// Collect a response body of at most `limit` bytes, replacing the response
/// with a 500 when the body cannot be read in full
async fn buffer_response(response: Response, limit: usize) -> (Parts, Bytes) {
    let (parts, body) = response.into_parts();
    match to_bytes(body, limit).await {
        Ok(bytes) => (parts, bytes),
        Err(err) => {
            let failure = ApiError::Internal(
                anyhow::Error::new(err).context("Failed to buffer response body"),
            );
            let (parts, body) = failure.into_response().into_parts();
            let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
            (parts, bytes)
        }
    }
}
