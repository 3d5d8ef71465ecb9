//! Request log sink and the endpoints that read it back.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{app_with, delete, get, memory_config, post, send_request, test_app, TempDb};
use serde_json::json;

#[tokio::test]
async fn requests_are_persisted_with_secrets_redacted() {
    let app = test_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/tasks?source=test")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-API-Key", "super-secret")
        .header("X-User-ID", "user-7")
        .header("X-Correlation-ID", "corr-abc")
        .body(Body::from(json!({"name": "t", "task_type": "cron"}).to_string()))
        .unwrap();
    let created = send_request(&app, request).await;
    assert_eq!(created.status, StatusCode::CREATED);

    let logs = get(&app, "/v1/api-logs").await;
    assert_eq!(logs.status, StatusCode::OK);
    assert_eq!(logs.body["total"], 1);

    let log = &logs.body["items"][0];
    assert_eq!(log["method"], "POST");
    assert_eq!(log["path"], "/v1/tasks");
    assert_eq!(log["full_url"], "/v1/tasks?source=test");
    assert_eq!(log["status_code"], 201);
    assert_eq!(log["correlation_id"], "corr-abc");
    assert_eq!(log["user_id"], "user-7");
    assert_eq!(log["request_headers"]["x-api-key"], "[redacted]");
    assert_eq!(log["request_body"], json!({"name": "t", "task_type": "cron"}));
    assert_eq!(log["response_body"]["name"], "t");
    assert_eq!(log["error_message"], json!(null));
}

#[tokio::test]
async fn internal_errors_are_generic_and_logged_with_their_cause() {
    let db = TempDb::new();
    let app = app_with(db.config()).await;
    let task = post(&app, "/v1/tasks", json!({"name": "t", "task_type": "cron"})).await;

    let pool = db.pool().await;
    sqlx::query("UPDATE scheduled_tasks SET config = 'not json' WHERE id = ?")
        .bind(task.id())
        .execute(&pool)
        .await
        .unwrap();

    let request = Request::builder()
        .uri(format!("/v1/tasks/{}", task.id()))
        .header("X-Correlation-ID", "corr-500")
        .body(Body::empty())
        .unwrap();
    let failed = send_request(&app, request).await;
    assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(failed.body["detail"], "Internal server error");
    assert_eq!(failed.body["correlation_id"], "corr-500");
    assert_eq!(failed.body["request_id"].as_str(), failed.header("x-request-id"));
    assert!(!failed.body.to_string().contains("invalid JSON"));

    let logs = get(&app, "/v1/api-logs?status_code=500").await;
    assert_eq!(logs.body["total"], 1);
    let log = &logs.body["items"][0];
    assert_eq!(log["correlation_id"], "corr-500");
    assert_eq!(log["response_body"]["detail"], "Internal server error");
    let message = log["error_message"].as_str().unwrap();
    assert!(message.contains("Column 'config' holds invalid JSON"), "{message}");
}

#[tokio::test]
async fn health_and_log_reads_are_not_persisted() {
    let app = test_app().await;

    assert_eq!(get(&app, "/health").await.status, StatusCode::OK);
    get(&app, "/v1/api-logs").await;
    get(&app, "/v1/api-logs/stats/summary").await;

    let logs = get(&app, "/v1/api-logs").await;
    assert_eq!(logs.body["total"], 0);
}

#[tokio::test]
async fn disabled_sink_writes_nothing() {
    let mut config = memory_config();
    config.api_log.enabled = false;
    let app = app_with(config).await;

    post(&app, "/v1/tasks", json!({"name": "t", "task_type": "cron"})).await;
    let logs = get(&app, "/v1/api-logs").await;
    assert_eq!(logs.body["total"], 0);
}

#[tokio::test]
async fn list_filters_get_and_delete() {
    let app = test_app().await;
    post(&app, "/v1/tasks", json!({"name": "t", "task_type": "cron"})).await;
    get(&app, "/v1/tasks/404").await;
    post(&app, "/v1/webhooks/inbox/github", json!({})).await;

    let posts = get(&app, "/v1/api-logs?method=post").await;
    assert_eq!(posts.body["total"], 2);

    let task_paths = get(&app, "/v1/api-logs?path=tasks").await;
    assert_eq!(task_paths.body["total"], 2);

    let not_found = get(&app, "/v1/api-logs?status_code=404").await;
    assert_eq!(not_found.body["total"], 1);
    let log_id = not_found.item_ids()[0];

    let fetched = get(&app, &format!("/v1/api-logs/{}", log_id)).await;
    assert_eq!(fetched.body["path"], "/v1/tasks/404");
    assert_eq!(fetched.body["response_body"]["detail"], "Task not found");

    let uri = format!("/v1/api-logs/{}", log_id);
    assert_eq!(delete(&app, &uri).await.status, StatusCode::NO_CONTENT);
    assert_eq!(delete(&app, &uri).await.status, StatusCode::NOT_FOUND);

    let future = get(&app, "/v1/api-logs?start_date=2999-01-01T00:00:00Z").await;
    assert_eq!(future.body["total"], 0);
}

#[tokio::test]
async fn stats_summarize_the_window() {
    let app = test_app().await;

    let empty = get(&app, "/v1/api-logs/stats/summary").await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["total_requests"], 0);
    assert_eq!(empty.body["success_rate"], 0.0);
    assert_eq!(empty.body["requests_by_path"], json!({}));

    post(&app, "/v1/tasks", json!({"name": "t", "task_type": "cron"})).await;
    get(&app, "/v1/tasks").await;
    get(&app, "/v1/tasks/404").await;
    get(&app, "/v1/tasks/405").await;

    let stats = get(&app, "/v1/api-logs/stats/summary").await;
    assert_eq!(stats.body["total_requests"], 4);
    assert_eq!(stats.body["success_rate"], 50.0);
    assert_eq!(stats.body["requests_by_status"]["404"], 2);
    assert_eq!(stats.body["requests_by_status"]["201"], 1);
    assert_eq!(stats.body["requests_by_method"]["GET"], 3);
    assert_eq!(stats.body["requests_by_path"]["/v1/tasks"], 2);

    let past = get(
        &app,
        "/v1/api-logs/stats/summary?start_date=2000-01-01T00:00:00Z&end_date=2000-01-02T00:00:00Z",
    )
    .await;
    assert_eq!(past.body["total_requests"], 0);

    let inverted = get(
        &app,
        "/v1/api-logs/stats/summary?start_date=2000-01-02T00:00:00Z&end_date=2000-01-01T00:00:00Z",
    )
    .await;
    assert_eq!(inverted.status, StatusCode::UNPROCESSABLE_ENTITY);
}
