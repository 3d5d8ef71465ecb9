/// Correlation and request ids
///
/// Every request gets a correlation id (caller supplied, or generated) and a
/// request id. Both are echoed on the response, attached to the request
/// extensions, recorded on a tracing span wrapping the rest of the stack, and
/// stored in a task-local so error responses can quote them.

use crate::capture::header_string;
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ids identifying the request currently being served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIds {
    pub correlation_id: String,
    pub request_id: String,
}

tokio::task_local! {
    static CURRENT_IDS: RequestIds;
}

impl RequestIds {
    /// `X-Correlation-ID`, falling back to `X-Request-ID`, then a fresh UUID
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = header_string(headers, REQUEST_ID_HEADER);
        let correlation_id = header_string(headers, CORRELATION_ID_HEADER)
            .or_else(|| request_id.clone())
            .unwrap_or_else(new_id);

        Self {
            correlation_id,
            request_id: request_id.unwrap_or_else(new_id),
        }
    }

    /// Ids of the request being served on this task, if any
    pub fn current() -> Option<Self> {
        CURRENT_IDS.try_with(Clone::clone).ok()
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Middleware that assigns ids, scopes the rest of the stack to them and
/// echoes them on the response
pub async fn propagate_ids(mut req: Request, next: Next) -> Response {
    let ids = RequestIds::from_headers(req.headers());
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        correlation_id = %ids.correlation_id,
        request_id = %ids.request_id,
    );
    let mut response = CURRENT_IDS
        .scope(ids.clone(), next.run(req))
        .instrument(span)
        .await;

    set_header(&mut response, CORRELATION_ID_HEADER, &ids.correlation_id);
    set_header(&mut response, REQUEST_ID_HEADER, &ids.request_id);
    response
}

fn set_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}
