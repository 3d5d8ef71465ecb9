/// Request log persistence and aggregate statistics

use super::{json_column, optional_json_column, to_json, to_optional_json};
use crate::models::{
    api_log::round2, ApiLog, ApiLogFilter, ApiLogStats, NewApiLog, Page, PageParams,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqlitePool, SqliteRow},
    QueryBuilder, Row, Sqlite,
};

#[derive(Debug, Clone)]
pub struct ApiLogStorage {
    pool: SqlitePool,
}

impl ApiLogStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write one log row, returning its id
    pub async fn insert(&self, log: &NewApiLog) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO api_logs (
                correlation_id, method, path, full_url, status_code,
                request_headers, request_body, response_headers, response_body,
                duration_ms, ip_address, user_agent, user_id, error_message, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.correlation_id)
        .bind(&log.method)
        .bind(&log.path)
        .bind(&log.full_url)
        .bind(log.status_code)
        .bind(to_json(&log.request_headers)?)
        .bind(to_optional_json(&log.request_body)?)
        .bind(to_json(&log.response_headers)?)
        .bind(to_optional_json(&log.response_body)?)
        .bind(log.duration_ms)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(&log.user_id)
        .bind(&log.error_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<ApiLog>> {
        let row = sqlx::query("SELECT * FROM api_logs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(api_log_from_row).transpose()
    }

    /// Newest first
    pub async fn list(&self, filter: &ApiLogFilter, page: PageParams) -> Result<Page<ApiLog>> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM api_logs WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM api_logs WHERE 1 = 1");
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = query.build().fetch_all(&self.pool).await?;

        let items = rows.iter().map(api_log_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_logs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Aggregate every log row created within `[start, end]`
    pub async fn stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<ApiLogStats> {
        let (total, average, successes): (i64, f64, Option<i64>) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(AVG(duration_ms), 0.0),
                SUM(CASE WHEN status_code >= 200 AND status_code < 400 THEN 1 ELSE 0 END)
            FROM api_logs
            WHERE created_at >= ? AND created_at <= ?
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        if total == 0 {
            return Ok(ApiLogStats::empty());
        }

        let requests_by_status: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT status_code, COUNT(*) FROM api_logs
            WHERE created_at >= ? AND created_at <= ?
            GROUP BY status_code
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let requests_by_path: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT path, COUNT(*) FROM api_logs
            WHERE created_at >= ? AND created_at <= ?
            GROUP BY path
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let requests_by_method: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT method, COUNT(*) FROM api_logs
            WHERE created_at >= ? AND created_at <= ?
            GROUP BY method
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let successes = successes.unwrap_or(0);
        Ok(ApiLogStats {
            total_requests: total,
            success_rate: round2(successes as f64 / total as f64 * 100.0),
            average_duration_ms: round2(average),
            requests_by_status: requests_by_status.into_iter().collect(),
            requests_by_path: requests_by_path.into_iter().collect(),
            requests_by_method: requests_by_method.into_iter().collect(),
        })
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ApiLogFilter) {
    if let Some(path) = &filter.path {
        builder
            .push(" AND path LIKE '%' || ")
            .push_bind(path.clone())
            .push(" || '%'");
    }
    if let Some(method) = &filter.method {
        builder.push(" AND method = ").push_bind(method.to_ascii_uppercase());
    }
    if let Some(status_code) = filter.status_code {
        builder.push(" AND status_code = ").push_bind(status_code);
    }
    if let Some(user_id) = &filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id.clone());
    }
    if let Some(start) = filter.start_date {
        builder.push(" AND created_at >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND created_at <= ").push_bind(end);
    }
}

fn api_log_from_row(row: &SqliteRow) -> Result<ApiLog> {
    Ok(ApiLog {
        id: row.try_get("id")?,
        correlation_id: row.try_get("correlation_id")?,
        method: row.try_get("method")?,
        path: row.try_get("path")?,
        full_url: row.try_get("full_url")?,
        status_code: row.try_get("status_code")?,
        request_headers: json_column(row, "request_headers")?,
        request_body: optional_json_column(row, "request_body")?,
        response_headers: json_column(row, "response_headers")?,
        response_body: optional_json_column(row, "response_body")?,
        duration_ms: row.try_get("duration_ms")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        user_id: row.try_get("user_id")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
    })
}
