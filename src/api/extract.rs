/// Extractors whose rejections render as `ApiError`

use super::error::ApiError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON body; malformed or missing bodies become 422
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Query string; unparseable values become 422
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

/// Path parameters; non-numeric ids become 422
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);
