/// Automation Inbox: webhook capture and automation bookkeeping over HTTP
///
/// Stores inbound webhooks, scheduled task and workflow definitions with their
/// execution records, and a log of every API request. Nothing is executed;
/// the service is a durable ledger other processes read and update.

// Environment-driven settings
pub mod config;

// SQLite pool and schema
pub mod db;

// Row types, request bodies and pagination
pub mod models;

// One storage struct per table family
pub mod storage;

// Header/body capture helpers shared by the inbox and the request log
pub mod capture;

// Correlation ids, request logging, API key gate
pub mod middleware;

// REST endpoints under /v1
pub mod api;

pub mod logging;

// Router assembly and server startup
pub mod server;

pub use api::AppState;
pub use config::Config;
pub use server::{build_router, create_app, start_server};
