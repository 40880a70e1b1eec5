//! Repository for `blocked_ips` / `blocked_ips_active`: batched UPSERT (C5),
//! active-list reads honoring whitelist set-difference (C7), and the
//! periodic stale-active sweep.

use blacklist_domain_models::{BlockedIp, NormalizedRecord};
use chrono::Utc;
use libsql::{params, Row};
use tracing::{debug, instrument, warn};

use crate::client::DbClient;
use crate::errors::DbError;

/// Batch size for UPSERT transactions, matching the persistence layer's
/// throughput budget.
pub const BATCH_SIZE: usize = 2_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub new_count: u64,
    pub updated_count: u64,
}

pub struct BlockedIpRepository {
    client: DbClient,
}

impl BlockedIpRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    /// UPSERTs `records` (all attributed to `source`) in chunks of
    /// [`BATCH_SIZE`], each inside its own transaction. A batch failure
    /// rolls back that batch and continues with the next rather than
    /// aborting the whole call.
    #[instrument(skip(self, records), fields(source, count = records.len()))]
    pub async fn upsert_batch(
        &self,
        records: &[NormalizedRecord],
        source: &str,
    ) -> Result<UpsertOutcome, DbError> {
        let mut outcome = UpsertOutcome::default();

        for chunk in records.chunks(BATCH_SIZE) {
            match self.upsert_chunk(chunk, source).await {
                Ok(chunk_outcome) => {
                    outcome.new_count += chunk_outcome.new_count;
                    outcome.updated_count += chunk_outcome.updated_count;
                }
                Err(e) => {
                    warn!(error = %e, "batch upsert failed, rolling back and continuing");
                }
            }
        }

        Ok(outcome)
    }

    async fn upsert_chunk(
        &self,
        chunk: &[NormalizedRecord],
        source: &str,
    ) -> Result<UpsertOutcome, DbError> {
        let conn = self.client.get_connection().await?;
        conn.execute("BEGIN", ())
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        let mut outcome = UpsertOutcome::default();

        for record in chunk {
            match self.upsert_one(&conn, record, source).await {
                Ok(true) => outcome.new_count += 1,
                Ok(false) => outcome.updated_count += 1,
                Err(e) => {
                    conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e);
                }
            }
        }

        conn.execute("COMMIT", ())
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;
        Ok(outcome)
    }

    /// Returns `true` if this was a fresh insert, `false` if it updated an
    /// existing row, per the UPSERT semantics of §4.5.
    async fn upsert_one(
        &self,
        conn: &libsql::Connection,
        record: &NormalizedRecord,
        source: &str,
    ) -> Result<bool, DbError> {
        let existed = {
            let mut rows = conn
                .query(
                    "SELECT 1 FROM blocked_ips WHERE ip_address = ?1 AND source = ?2",
                    params![record.ip_address.clone(), source.to_string()],
                )
                .await?;
            rows.next().await?.is_some()
        };

        let now = Utc::now().to_rfc3339();
        let raw_payload = record.raw_payload.to_string();

        conn.execute(
            r#"
            INSERT INTO blocked_ips (
                ip_address, source, country, reason, confidence, detection_count,
                detection_date, removal_date, last_seen, is_active, created_at, updated_at, raw_payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9, ?8, ?8, ?10)
            ON CONFLICT(ip_address, source) DO UPDATE SET
                detection_count = detection_count + 1,
                last_seen = excluded.last_seen,
                updated_at = excluded.updated_at,
                reason = excluded.reason,
                removal_date = COALESCE(excluded.removal_date, blocked_ips.removal_date),
                is_active = CASE
                    WHEN COALESCE(excluded.removal_date, blocked_ips.removal_date) IS NOT NULL
                     AND COALESCE(excluded.removal_date, blocked_ips.removal_date) < date('now')
                    THEN 0
                    ELSE excluded.is_active
                END,
                country = COALESCE(excluded.country, blocked_ips.country),
                raw_payload = excluded.raw_payload
            "#,
            params![
                record.ip_address.clone(),
                source.to_string(),
                record.country.clone(),
                record.reason.clone(),
                record.confidence,
                record.detection_date.to_string(),
                record.removal_date.map(|d| d.to_string()),
                now.clone(),
                record.is_active as i64,
                raw_payload,
            ],
        )
        .await?;

        Ok(!existed)
    }

    /// Inserts a single manually-entered record under `source`. Unlike
    /// [`upsert_batch`](Self::upsert_batch), this rejects with
    /// `DbError::Conflict` when `(ip_address, source)` already exists rather
    /// than merging — the manual-add surface must surface a duplicate to
    /// its caller as a 409, not silently re-observe it.
    #[instrument(skip(self, record))]
    pub async fn insert_manual(&self, record: &NormalizedRecord, source: &str) -> Result<BlockedIp, DbError> {
        let conn = self.client.get_connection().await?;

        let existed = {
            let mut rows = conn
                .query(
                    "SELECT 1 FROM blocked_ips WHERE ip_address = ?1 AND source = ?2",
                    params![record.ip_address.clone(), source.to_string()],
                )
                .await?;
            rows.next().await?.is_some()
        };
        if existed {
            return Err(DbError::Conflict(record.ip_address.clone()));
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO blocked_ips (
                ip_address, source, country, reason, confidence, detection_count,
                detection_date, removal_date, last_seen, is_active, created_at, updated_at, raw_payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9, ?8, ?8, ?10)
            "#,
            params![
                record.ip_address.clone(),
                source.to_string(),
                record.country.clone(),
                record.reason.clone(),
                record.confidence,
                record.detection_date.to_string(),
                record.removal_date.map(|d| d.to_string()),
                now,
                record.is_active as i64,
                record.raw_payload.to_string(),
            ],
        )
        .await?;

        self.find_by_ip_and_source(&record.ip_address, source)
            .await?
            .ok_or_else(|| DbError::Mapping("manual insert returned no row".into()))
    }

    /// Looks up a record by its natural key `(ip_address, source)`,
    /// regardless of active state.
    #[instrument(skip(self))]
    pub async fn find_by_ip_and_source(&self, ip: &str, source: &str) -> Result<Option<BlockedIp>, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, ip_address, source, country, reason, confidence, detection_count,
                       detection_date, removal_date, last_seen, created_at, updated_at, raw_payload, is_active
                FROM blocked_ips_active
                WHERE ip_address = ?1 AND source = ?2
                LIMIT 1
                "#,
                params![ip.to_string(), source.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    /// Looks up an active record by IP across all sources, honoring the
    /// view-based `is_active` recomputation (I1, P2, P5).
    #[instrument(skip(self))]
    pub async fn find_active_by_ip(&self, ip: &str) -> Result<Option<BlockedIp>, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, ip_address, source, country, reason, confidence, detection_count,
                       detection_date, removal_date, last_seen, created_at, updated_at, raw_payload, is_active
                FROM blocked_ips_active
                WHERE ip_address = ?1 AND is_active = 1
                LIMIT 1
                "#,
                params![ip.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    /// The active blacklist with whitelisted IPs excluded via set-difference
    /// in the query itself, not in application memory.
    #[instrument(skip(self))]
    pub async fn list_active_excluding_whitelist(&self) -> Result<Vec<BlockedIp>, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, ip_address, source, country, reason, confidence, detection_count,
                       detection_date, removal_date, last_seen, created_at, updated_at, raw_payload, is_active
                FROM blocked_ips_active
                WHERE is_active = 1
                  AND ip_address NOT IN (
                      SELECT ip_address FROM whitelist_entries WHERE is_active = 1
                  )
                ORDER BY ip_address ASC
                "#,
                (),
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(row)?);
        }
        Ok(out)
    }

    /// A paginated view of the active blacklist (whitelist-excluded),
    /// ordered by most recently seen first, for the operator list endpoint.
    #[instrument(skip(self))]
    pub async fn list_active_page(&self, page: u32, per_page: u32) -> Result<(Vec<BlockedIp>, u64), DbError> {
        let conn = self.client.get_connection().await?;
        let offset = (page.saturating_sub(1)) as i64 * per_page as i64;

        let mut rows = conn
            .query(
                r#"
                SELECT id, ip_address, source, country, reason, confidence, detection_count,
                       detection_date, removal_date, last_seen, created_at, updated_at, raw_payload, is_active
                FROM blocked_ips_active
                WHERE is_active = 1
                  AND ip_address NOT IN (
                      SELECT ip_address FROM whitelist_entries WHERE is_active = 1
                  )
                ORDER BY last_seen DESC
                LIMIT ?1 OFFSET ?2
                "#,
                params![per_page as i64, offset],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(row)?);
        }

        let mut count_rows = conn
            .query(
                r#"
                SELECT COUNT(*) FROM blocked_ips_active
                WHERE is_active = 1
                  AND ip_address NOT IN (
                      SELECT ip_address FROM whitelist_entries WHERE is_active = 1
                  )
                "#,
                (),
            )
            .await?;
        let total: i64 = count_rows.next().await?.map(|r| r.get(0)).transpose()?.unwrap_or(0);

        Ok((out, total.max(0) as u64))
    }

    #[instrument(skip(self))]
    pub async fn count_by_source(&self) -> Result<Vec<(String, i64)>, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT source, COUNT(*) FROM blocked_ips_active WHERE is_active = 1 GROUP BY source",
                (),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let source: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            out.push((source, count));
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn count_active_inactive(&self) -> Result<(i64, i64), DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT COALESCE(SUM(is_active), 0), COALESCE(SUM(1 - is_active), 0) FROM blocked_ips_active",
                (),
            )
            .await?;
        if let Some(row) = rows.next().await? {
            Ok((row.get(0)?, row.get(1)?))
        } else {
            Ok((0, 0))
        }
    }

    #[instrument(skip(self))]
    pub async fn count_added_last_24h(&self) -> Result<i64, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM blocked_ips WHERE created_at >= datetime('now', '-1 day')",
                (),
            )
            .await?;
        if let Some(row) = rows.next().await? {
            Ok(row.get(0)?)
        } else {
            Ok(0)
        }
    }

    /// Flips rows whose stored `is_active` disagrees with the
    /// removal-date-derived truth. The view already hides the drift from
    /// readers; this sweep keeps the stored column from lagging indefinitely.
    #[instrument(skip(self))]
    pub async fn sweep_stale_actives(&self) -> Result<u64, DbError> {
        let conn = self.client.get_connection().await?;
        let affected = conn
            .execute(
                r#"
                UPDATE blocked_ips
                SET is_active = 0, updated_at = datetime('now')
                WHERE is_active = 1 AND removal_date IS NOT NULL AND removal_date < date('now')
                "#,
                (),
            )
            .await?;
        debug!(affected, "swept stale active rows");
        Ok(affected)
    }
}

fn map_row(row: Row) -> Result<BlockedIp, DbError> {
    let raw_payload_text: String = row.get(12)?;
    let is_active_int: i64 = row.get(13)?;
    let detection_date_text: String = row.get(7)?;
    let removal_date_text: Option<String> = row.get(8)?;
    let last_seen_text: String = row.get(9)?;
    let created_at_text: String = row.get(10)?;
    let updated_at_text: String = row.get(11)?;

    Ok(BlockedIp {
        id: row.get(0)?,
        ip_address: row.get(1)?,
        source: row.get(2)?,
        country: row.get(3)?,
        reason: row.get(4)?,
        confidence: row.get(5)?,
        detection_count: row.get(6)?,
        detection_date: detection_date_text
            .parse()
            .map_err(|_| DbError::Mapping("detection_date not a valid date".into()))?,
        removal_date: removal_date_text
            .map(|s| s.parse())
            .transpose()
            .map_err(|_| DbError::Mapping("removal_date not a valid date".into()))?,
        last_seen: parse_timestamp(&last_seen_text)?,
        is_active: is_active_int != 0,
        created_at: parse_timestamp(&created_at_text)?,
        updated_at: parse_timestamp(&updated_at_text)?,
        raw_payload: serde_json::from_str(&raw_payload_text)
            .map_err(|e| DbError::Mapping(format!("raw_payload not valid JSON: {e}")))?,
    })
}

fn parse_timestamp(text: &str) -> Result<chrono::DateTime<Utc>, DbError> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .map_err(|_| DbError::Mapping(format!("unparseable timestamp: {text}")))
}
