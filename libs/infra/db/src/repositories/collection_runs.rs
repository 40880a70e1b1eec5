//! Append-only ledger of scheduler ticks and manual triggers (P10).

use blacklist_domain_models::CollectionRun;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::instrument;

use crate::client::DbClient;
use crate::errors::DbError;

pub struct CollectionRunRepository {
    client: DbClient,
}

impl CollectionRunRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, details))]
    pub async fn record(
        &self,
        service_name: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        success: bool,
        items_collected: i64,
        new_count: i64,
        updated_count: i64,
        error_message: Option<String>,
        details: serde_json::Value,
    ) -> Result<i64, DbError> {
        let conn = self.client.get_connection().await?;
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0);

        conn.execute(
            r#"
            INSERT INTO collection_history (
                service_name, started_at, finished_at, success, items_collected,
                new_count, updated_count, duration_ms, error_message, details
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                service_name.to_string(),
                started_at.to_rfc3339(),
                finished_at.to_rfc3339(),
                success as i64,
                items_collected,
                new_count,
                updated_count,
                duration_ms,
                error_message,
                details.to_string(),
            ],
        )
        .await?;

        let mut rows = conn.query("SELECT last_insert_rowid()", ()).await?;
        let id: i64 = rows
            .next()
            .await?
            .ok_or_else(|| DbError::Mapping("no rowid returned for collection_history insert".into()))?
            .get(0)?;
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn recent(&self, service_name: &str, limit: i64) -> Result<Vec<CollectionRun>, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, service_name, started_at, finished_at, success, items_collected,
                       new_count, updated_count, duration_ms, error_message, details
                FROM collection_history
                WHERE service_name = ?1
                ORDER BY id DESC
                LIMIT ?2
                "#,
                params![service_name.to_string(), limit],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(row)?);
        }
        Ok(out)
    }
}

fn map_row(row: Row) -> Result<CollectionRun, DbError> {
    let started_at_text: String = row.get(2)?;
    let finished_at_text: String = row.get(3)?;
    let success_int: i64 = row.get(4)?;
    let details_text: String = row.get(10)?;

    Ok(CollectionRun {
        id: row.get(0)?,
        service_name: row.get(1)?,
        started_at: parse_timestamp(&started_at_text)?,
        finished_at: parse_timestamp(&finished_at_text)?,
        success: success_int != 0,
        items_collected: row.get(5)?,
        new_count: row.get(6)?,
        updated_count: row.get(7)?,
        duration_ms: row.get(8)?,
        error_message: row.get(9)?,
        details: serde_json::from_str(&details_text).unwrap_or(serde_json::Value::Null),
    })
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DbError::Mapping(format!("unparseable timestamp: {text}")))
}
