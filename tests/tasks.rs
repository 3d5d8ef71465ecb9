//! Scheduled task and task execution endpoints.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use axum::http::StatusCode;
use common::{delete, get, patch, post, test_app};
use serde_json::json;

fn hourly_task() -> serde_json::Value {
    json!({
        "name": "t",
        "task_type": "cron",
        "schedule": "0 * * * *",
        "enabled": true,
        "config": {}
    })
}

#[tokio::test]
async fn creating_a_task_creates_no_execution() {
    let app = test_app().await;

    let created = post(&app, "/v1/tasks", hourly_task()).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["name"], "t");
    assert_eq!(created.body["schedule"], "0 * * * *");
    assert_eq!(created.body["success_count"], 0);
    assert_eq!(created.body["failure_count"], 0);
    assert_eq!(
        created.body["retry_policy"],
        json!({"max_retries": 3, "backoff": "exponential", "initial_delay": 60})
    );

    let executions = get(&app, &format!("/v1/tasks/{}/executions", created.id())).await;
    assert_eq!(executions.status, StatusCode::OK);
    assert_eq!(executions.body["total"], 0);

    let fetched = get(&app, &format!("/v1/tasks/{}", created.id())).await;
    assert_eq!(fetched.body, created.body);
}

#[tokio::test]
async fn invalid_task_bodies_are_rejected() {
    let app = test_app().await;

    let missing_type = post(&app, "/v1/tasks", json!({"name": "t"})).await;
    assert_eq!(missing_type.status, StatusCode::UNPROCESSABLE_ENTITY);

    let blank_name = post(&app, "/v1/tasks", json!({"name": "  ", "task_type": "cron"})).await;
    assert_eq!(blank_name.status, StatusCode::UNPROCESSABLE_ENTITY);

    let created = post(&app, "/v1/tasks", hourly_task()).await;
    let negative = patch(
        &app,
        &format!("/v1/tasks/{}", created.id()),
        json!({"success_count": -1}),
    )
    .await;
    assert_eq!(negative.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn patch_updates_counters_and_filters_follow() {
    let app = test_app().await;
    let task = post(&app, "/v1/tasks", hourly_task()).await;
    let other = post(
        &app,
        "/v1/tasks",
        json!({"name": "cleanup", "task_type": "script", "enabled": false}),
    )
    .await;

    let updated = patch(
        &app,
        &format!("/v1/tasks/{}", task.id()),
        json!({"success_count": 4, "last_run_at": "2024-05-01T09:00:00Z"}),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["success_count"], 4);
    assert_eq!(updated.body["failure_count"], 0);
    assert_eq!(updated.body["name"], "t");
    assert!(updated.body["last_run_at"].is_string());

    let enabled = get(&app, "/v1/tasks?enabled=true").await;
    assert_eq!(enabled.item_ids(), vec![task.id()]);

    let scripts = get(&app, "/v1/tasks?task_type=script").await;
    assert_eq!(scripts.item_ids(), vec![other.id()]);
}

#[tokio::test]
async fn execution_for_missing_task_is_404_and_not_stored() {
    let app = test_app().await;

    let response = post(
        &app,
        "/v1/tasks/42/executions",
        json!({"status": "running", "input_data": {"k": "v"}}),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["detail"], "Task not found");

    let listed = get(&app, "/v1/tasks/42/executions").await;
    assert_eq!(listed.body["total"], 0);
    let first_id = get(&app, "/v1/tasks/executions/1").await;
    assert_eq!(first_id.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn executions_are_recorded_and_progressed_by_callers() {
    let app = test_app().await;
    let task = post(&app, "/v1/tasks", hourly_task()).await;
    let executions_uri = format!("/v1/tasks/{}/executions", task.id());

    let started = post(
        &app,
        &executions_uri,
        json!({"task_id": 9999, "status": "running", "input_data": {"k": "v"}}),
    )
    .await;
    assert_eq!(started.status, StatusCode::CREATED);
    assert_eq!(started.body["task_id"], task.id());
    assert_eq!(started.body["status"], "running");
    assert_eq!(started.body["input_data"], json!({"k": "v"}));
    assert_eq!(started.body["retry_count"], 0);
    assert_eq!(started.body["logs"], json!([]));

    let failed = post(&app, &executions_uri, json!({"status": "failed"})).await;

    let finished = patch(
        &app,
        &format!("/v1/tasks/executions/{}", started.id()),
        json!({
            "status": "success",
            "completed_at": "2024-05-01T09:00:05Z",
            "duration_ms": 5000,
            "output_data": {"rows": 3}
        }),
    )
    .await;
    assert_eq!(finished.status, StatusCode::OK);
    assert_eq!(finished.body["status"], "success");
    assert_eq!(finished.body["duration_ms"], 5000);
    assert_eq!(finished.body["input_data"], json!({"k": "v"}));

    let successes = get(&app, &format!("{}?status=success", executions_uri)).await;
    assert_eq!(successes.item_ids(), vec![started.id()]);

    let all = get(&app, &executions_uri).await;
    assert_eq!(all.item_ids(), vec![failed.id(), started.id()]);

    let parent = get(&app, &format!("/v1/tasks/{}", task.id())).await;
    assert_eq!(parent.body["success_count"], 0);
}

#[tokio::test]
async fn task_with_executions_cannot_be_deleted() {
    let app = test_app().await;
    let task = post(&app, "/v1/tasks", hourly_task()).await;
    let uri = format!("/v1/tasks/{}", task.id());
    post(&app, &format!("{}/executions", uri), json!({"status": "pending"})).await;

    let refused = delete(&app, &uri).await;
    assert_eq!(refused.status, StatusCode::CONFLICT);
    assert_eq!(get(&app, &uri).await.status, StatusCode::OK);

    let empty = post(&app, "/v1/tasks", hourly_task()).await;
    let empty_uri = format!("/v1/tasks/{}", empty.id());
    assert_eq!(delete(&app, &empty_uri).await.status, StatusCode::NO_CONTENT);
    assert_eq!(delete(&app, &empty_uri).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn explicit_null_clears_optional_fields() {
    let app = test_app().await;
    let task = post(
        &app,
        "/v1/tasks",
        json!({
            "name": "t",
            "task_type": "cron",
            "schedule": "0 * * * *",
            "description": "hourly sync"
        }),
    )
    .await;
    let uri = format!("/v1/tasks/{}", task.id());

    let cleared = patch(&app, &uri, json!({"schedule": null})).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["schedule"], serde_json::Value::Null);
    assert_eq!(cleared.body["description"], "hourly sync");

    let fetched = get(&app, &uri).await;
    assert_eq!(fetched.body["schedule"], serde_json::Value::Null);

    let execution = post(&app, &format!("{}/executions", uri), json!({"status": "failed"})).await;
    let execution_uri = format!("/v1/tasks/executions/{}", execution.id());
    patch(&app, &execution_uri, json!({"error_message": "timeout"})).await;
    let retried = patch(
        &app,
        &execution_uri,
        json!({"status": "success", "error_message": null}),
    )
    .await;
    assert_eq!(retried.body["status"], "success");
    assert_eq!(retried.body["error_message"], serde_json::Value::Null);
}
