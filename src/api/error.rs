/// API error type and its JSON response shape
///
/// Every failing handler returns `ApiError`. The response body always carries
/// `detail` plus the correlation and request ids of the current request so a
/// caller can quote them back when reporting a problem.

use crate::middleware::correlation::RequestIds;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
}

/// Server-side error text attached to error responses for the request log
#[derive(Debug, Clone)]
pub struct ErrorMessage(pub String);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed body, query or path, or a field that fails validation
    #[error("{0}")]
    Validation(String),
    /// Well-formed request that conflicts with current state
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid or missing API key")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let ids = RequestIds::current();

        let (detail, message) = match &self {
            Self::Internal(err) => {
                tracing::error!(error = ?err, "💥 Unhandled error while serving request");
                ("Internal server error".to_string(), format!("{err:#}"))
            }
            other => {
                tracing::debug!(status = status.as_u16(), detail = %other, "Request rejected");
                (other.to_string(), other.to_string())
            }
        };

        let body = ErrorBody {
            detail,
            correlation_id: ids.as_ref().map(|ids| ids.correlation_id.clone()),
            request_id: ids.map(|ids| ids.request_id),
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorMessage(message));
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(
            ApiError::Validation("bad".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::NotFound("Task").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("disk on fire")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(ApiError::NotFound("Workflow").to_string(), "Workflow not found");
    }

    #[test]
    fn internal_errors_hide_their_cause_from_clients() {
        let response = ApiError::from(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = response.extensions().get::<ErrorMessage>().map(|m| m.0.clone());
        assert_eq!(message.as_deref(), Some("disk on fire"));
    }
}
