/// Webhook inbox persistence

use super::{
    begin_write, enum_column, json_column, optional_json_column, to_json, to_optional_json,
};
use crate::models::{NewWebhook, Page, PageParams, WebhookFilter, WebhookInbox, WebhookUpdate};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqlitePool, SqliteRow},
    QueryBuilder, Row, Sqlite,
};

#[derive(Debug, Clone)]
pub struct WebhookStorage {
    pool: SqlitePool,
}

impl WebhookStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a captured webhook with status `received`
    pub async fn insert(&self, webhook: &NewWebhook) -> Result<WebhookInbox> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_inbox (
                source, event_type, method, path, headers, query_params,
                body, raw_body, ip_address, user_agent, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'received', ?, ?)
            "#,
        )
        .bind(&webhook.source)
        .bind(&webhook.event_type)
        .bind(&webhook.method)
        .bind(&webhook.path)
        .bind(to_json(&webhook.headers)?)
        .bind(to_json(&webhook.query_params)?)
        .bind(to_optional_json(&webhook.body)?)
        .bind(&webhook.raw_body)
        .bind(&webhook.ip_address)
        .bind(&webhook.user_agent)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get(id)
            .await?
            .with_context(|| format!("Webhook {} missing right after insert", id))
    }

    pub async fn get(&self, id: i64) -> Result<Option<WebhookInbox>> {
        let row = sqlx::query("SELECT * FROM webhook_inbox WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(webhook_from_row).transpose()
    }

    /// Newest first
    pub async fn list(&self, filter: &WebhookFilter, page: PageParams) -> Result<Page<WebhookInbox>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM webhook_inbox WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM webhook_inbox WHERE 1 = 1");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = query.build().fetch_all(&self.pool).await?;

        let items = rows.iter().map(webhook_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    pub async fn update(&self, id: i64, update: WebhookUpdate) -> Result<Option<WebhookInbox>> {
        let mut tx = begin_write(&self.pool).await?;

        let row = sqlx::query("SELECT * FROM webhook_inbox WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut webhook = webhook_from_row(&row)?;
        webhook.apply(update);
        webhook.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE webhook_inbox
            SET status = ?, processed_at = ?, error_message = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(webhook.status.as_str())
        .bind(webhook.processed_at)
        .bind(&webhook.error_message)
        .bind(webhook.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(webhook))
    }

    /// Returns false when no row had this id
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM webhook_inbox WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &WebhookFilter) {
    if let Some(source) = &filter.source {
        builder.push(" AND source = ").push_bind(source.clone());
    }
    if let Some(event_type) = &filter.event_type {
        builder.push(" AND event_type = ").push_bind(event_type.clone());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

fn webhook_from_row(row: &SqliteRow) -> Result<WebhookInbox> {
    Ok(WebhookInbox {
        id: row.try_get("id")?,
        source: row.try_get("source")?,
        event_type: row.try_get("event_type")?,
        method: row.try_get("method")?,
        path: row.try_get("path")?,
        headers: json_column(row, "headers")?,
        query_params: json_column(row, "query_params")?,
        body: optional_json_column(row, "body")?,
        raw_body: row.try_get("raw_body")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        status: enum_column(row, "status")?,
        processed_at: row.try_get("processed_at")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
