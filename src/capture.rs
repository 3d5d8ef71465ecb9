/// Helpers for turning request/response metadata into stored JSON
///
/// Shared by the webhook inbox (which keeps headers verbatim) and the request
/// log sink (which redacts credentials).

use crate::models::JsonObject;
use axum::{extract::ConnectInfo, http::Extensions, http::HeaderMap};
use serde_json::Value;
use std::net::SocketAddr;

/// Replacement text for redacted header values
pub const REDACTED: &str = "[redacted]";

/// Headers never written to the request log in clear text
pub const SENSITIVE_HEADERS: &[&str] = &["authorization", "x-api-key", "cookie", "set-cookie"];

/// First value of a header as text, ignoring blanks and non-UTF-8 values
pub fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Headers as a JSON object of lowercase name to value
///
/// Repeated headers are joined with ", ". Names listed in `redact` keep their
/// key but lose their value.
pub fn header_object(headers: &HeaderMap, redact: &[&str]) -> JsonObject {
    let mut object = JsonObject::new();
    for (name, value) in headers {
        let text = if redact.contains(&name.as_str()) {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        match object.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(&text);
            }
            _ => {
                object.insert(name.as_str().to_string(), Value::String(text));
            }
        }
    }
    object
}

/// Peer address from the connection, else the first `X-Forwarded-For` hop
pub fn client_ip(extensions: &Extensions, headers: &HeaderMap) -> Option<String> {
    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip().to_string());
    }
    header_string(headers, "x-forwarded-for").and_then(|raw| {
        raw.split(',')
            .map(str::trim)
            .find(|hop| !hop.is_empty())
            .map(str::to_string)
    })
}

/// Parse a captured body as JSON when it is non-empty and within `limit`
pub fn json_body(bytes: &[u8], limit: usize) -> Option<Value> {
    if bytes.is_empty() || bytes.len() > limit {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}
