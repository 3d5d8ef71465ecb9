/// Automation Inbox server entry point
///
/// Reads configuration from the environment (and `.env`) and serves:
/// - Webhook inbox at /v1/webhooks/inbox/*
/// - Scheduled tasks at /v1/tasks/*
/// - Workflows at /v1/workflows/*
/// - Request log at /v1/api-logs/*
/// - Health check at /health

use automation_inbox::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    start_server(config).await
}
