//! Concurrent writers against a file-backed database.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use axum::http::StatusCode;
use common::{app_with, get, patch, post, TempDb};
use serde_json::json;

const WRITERS: i64 = 40;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_task_writes_all_succeed() {
    let db = TempDb::new();
    let app = app_with(db.config()).await;
    let task = post(&app, "/v1/tasks", json!({"name": "t", "task_type": "cron"})).await;
    let task_uri = format!("/v1/tasks/{}", task.id());

    let updates: Vec<_> = (0..WRITERS)
        .map(|n| {
            let app = app.clone();
            let uri = task_uri.clone();
            tokio::spawn(async move {
                patch(&app, &uri, json!({"success_count": n})).await.status
            })
        })
        .collect();
    for update in updates {
        assert_eq!(update.await.unwrap(), StatusCode::OK);
    }

    let executions: Vec<_> = (0..WRITERS)
        .map(|_| {
            let app = app.clone();
            let uri = format!("{}/executions", task_uri);
            tokio::spawn(async move {
                post(&app, &uri, json!({"status": "running"})).await.status
            })
        })
        .collect();
    for execution in executions {
        assert_eq!(execution.await.unwrap(), StatusCode::CREATED);
    }

    let listed = get(&app, &format!("{}/executions?size=100", task_uri)).await;
    assert_eq!(listed.body["total"], WRITERS);

    let logs = get(&app, "/v1/api-logs?status_code=500").await;
    assert_eq!(logs.body["total"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workflow_and_webhook_writes_all_succeed() {
    let db = TempDb::new();
    let app = app_with(db.config()).await;
    let workflow = post(
        &app,
        "/v1/workflows",
        json!({"name": "wf", "trigger_type": "manual", "steps": [{"action": "a"}]}),
    )
    .await;
    let webhook = post(&app, "/v1/webhooks/inbox/github", json!({"ref": "main"})).await;
    let workflow_uri = format!("/v1/workflows/{}", workflow.id());
    let webhook_uri = format!("/v1/webhooks/inbox/{}", webhook.id());

    let writes: Vec<_> = (0..WRITERS)
        .map(|n| {
            let app = app.clone();
            let workflow_uri = workflow_uri.clone();
            let webhook_uri = webhook_uri.clone();
            tokio::spawn(async move {
                if n % 2 == 0 {
                    let uri = format!("{}/executions", workflow_uri);
                    let created = post(&app, &uri, json!({"trigger_source": "test"})).await;
                    (created.status, StatusCode::CREATED)
                } else {
                    let updated = patch(&app, &webhook_uri, json!({"status": "processed"})).await;
                    (updated.status, StatusCode::OK)
                }
            })
        })
        .collect();
    for write in writes {
        let (status, expected) = write.await.unwrap();
        assert_eq!(status, expected);
    }

    let listed = get(&app, &format!("{}/executions?size=100", workflow_uri)).await;
    assert_eq!(listed.body["total"], WRITERS / 2);
}
