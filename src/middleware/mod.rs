/// Request middleware
///
/// Applied outermost first: correlation ids, then the request log sink, then
/// (per route group) the API key gate.

pub mod auth;
pub mod correlation;
pub mod request_log;
