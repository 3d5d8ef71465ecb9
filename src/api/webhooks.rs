/// Webhook inbox endpoints
///
/// `POST /v1/webhooks/inbox/{source}` accepts any payload from any sender and
/// stores it verbatim. Nothing is verified or dispatched; the remaining routes
/// let an operator page through captured webhooks and mark them processed.

use super::{
    error::ApiError,
    extract::{AppJson, AppPath, AppQuery},
    page_params, AppState,
};
use crate::{
    capture::{client_ip, header_object, header_string},
    models::{
        non_empty, JsonObject, NewWebhook, Page, WebhookFilter, WebhookInbox, WebhookStatus,
        WebhookUpdate,
    },
};
use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Largest webhook body accepted
const MAX_WEBHOOK_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ListWebhooksQuery {
    pub source: Option<String>,
    pub event_type: Option<String>,
    pub status: Option<WebhookStatus>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Create webhook inbox routes
///
/// The receive route shares its pattern with the per-record routes: `POST`
/// reads the segment as a source name, every other method as a numeric id.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/webhooks/inbox", get(list_webhooks))
        .route(
            "/v1/webhooks/inbox/{id}",
            get(get_webhook)
                .post(receive_webhook)
                .patch(update_webhook)
                .delete(delete_webhook),
        )
}

/// Capture an inbound webhook
///
/// POST /v1/webhooks/inbox/{source}?event_type=...
/// A JSON body lands in `body`; anything else is kept as text in `raw_body`.
async fn receive_webhook(
    State(state): State<AppState>,
    AppPath(source): AppPath<String>,
    AppQuery(query): AppQuery<HashMap<String, String>>,
    request: Request,
) -> Result<(StatusCode, Json<WebhookInbox>), ApiError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_WEBHOOK_BODY_BYTES)
        .await
        .map_err(|err| ApiError::Validation(format!("Failed to read webhook body: {}", err)))?;

    let (body, raw_body) = split_body(&bytes);
    let event_type = query
        .get("event_type")
        .filter(|value| !value.trim().is_empty())
        .cloned()
        .or_else(|| header_string(&parts.headers, "x-event-type"));
    let query_params: JsonObject = query
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    let webhook = NewWebhook {
        source,
        event_type,
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        headers: header_object(&parts.headers, &[]),
        query_params,
        body,
        raw_body,
        ip_address: client_ip(&parts.extensions, &parts.headers),
        user_agent: header_string(&parts.headers, "user-agent"),
    };

    let stored = state.webhooks.insert(&webhook).await?;
    tracing::info!(
        webhook_id = stored.id,
        source = %stored.source,
        event_type = stored.event_type.as_deref().unwrap_or("-"),
        "📥 Webhook received"
    );

    Ok((StatusCode::CREATED, Json(stored)))
}

/// JSON bodies are parsed; other non-empty bodies are kept as lossy UTF-8 text
fn split_body(bytes: &[u8]) -> (Option<Value>, Option<String>) {
    if bytes.is_empty() {
        return (None, None);
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => (Some(value), None),
        Err(_) => (None, Some(String::from_utf8_lossy(bytes).into_owned())),
    }
}

/// GET /v1/webhooks/inbox
async fn list_webhooks(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListWebhooksQuery>,
) -> Result<Json<Page<WebhookInbox>>, ApiError> {
    let page = page_params(query.page, query.size)?;
    let filter = WebhookFilter {
        source: non_empty(query.source),
        event_type: non_empty(query.event_type),
        status: query.status,
    };

    Ok(Json(state.webhooks.list(&filter, page).await?))
}

/// GET /v1/webhooks/inbox/{id}
async fn get_webhook(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<WebhookInbox>, ApiError> {
    state
        .webhooks
        .get(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Webhook"))
}

/// PATCH /v1/webhooks/inbox/{id}
async fn update_webhook(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(update): AppJson<WebhookUpdate>,
) -> Result<Json<WebhookInbox>, ApiError> {
    let webhook = state
        .webhooks
        .update(id, update)
        .await?
        .ok_or(ApiError::NotFound("Webhook"))?;

    tracing::info!(webhook_id = id, status = %webhook.status, "✏️ Webhook updated");
    Ok(Json(webhook))
}

/// DELETE /v1/webhooks/inbox/{id}
async fn delete_webhook(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.webhooks.delete(id).await? {
        return Err(ApiError::NotFound("Webhook"));
    }

    tracing::info!(webhook_id = id, "🗑️ Webhook deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_bodies_are_parsed_and_text_is_kept_raw() {
        assert_eq!(split_body(br#"{"event":"push"}"#), (Some(json!({"event": "push"})), None));
        assert_eq!(split_body(b"a=1&b=2"), (None, Some("a=1&b=2".to_string())));
        assert_eq!(split_body(b""), (None, None));
    }
}
