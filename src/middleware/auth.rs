/// Shared-secret `X-API-Key` gate
///
/// Installed with `route_layer` on the route groups chosen in configuration,
/// so unknown paths still 404 instead of 401.

use crate::api::{ApiError, AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided != Some(state.config.auth.api_key.as_str()) {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            key_present = provided.is_some(),
            "🔒 Rejected request without a valid API key"
        );
        return ApiError::Unauthorized.into_response();
    }

    next.run(req).await
}
