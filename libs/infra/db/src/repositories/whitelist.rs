//! Repository for `whitelist_entries`. Whitelist membership takes
//! unconditional priority over any blacklist verdict (P1); this repository
//! only exposes the primitives the decision service composes that ordering
//! from.

use blacklist_domain_models::WhitelistEntry;
use chrono::Utc;
use libsql::{params, Row};
use tracing::instrument;

use crate::client::DbClient;
use crate::errors::DbError;

pub struct WhitelistRepository {
    client: DbClient,
}

impl WhitelistRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn is_active_member(&self, ip: &str) -> Result<bool, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM whitelist_entries WHERE ip_address = ?1 AND is_active = 1 LIMIT 1",
                params![ip.to_string()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    #[instrument(skip(self))]
    pub async fn add(
        &self,
        ip: &str,
        country: Option<String>,
        reason: Option<String>,
        source: &str,
    ) -> Result<WhitelistEntry, DbError> {
        let conn = self.client.get_connection().await?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO whitelist_entries (ip_address, country, reason, source, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
            ON CONFLICT(ip_address) DO UPDATE SET
                country = excluded.country,
                reason = excluded.reason,
                source = excluded.source,
                is_active = 1,
                updated_at = excluded.updated_at
            "#,
            params![ip.to_string(), country, reason, source.to_string(), now],
        )
        .await?;

        self.find(ip)
            .await?
            .ok_or_else(|| DbError::Mapping("whitelist insert returned no row".into()))
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, ip: &str) -> Result<bool, DbError> {
        let conn = self.client.get_connection().await?;
        let affected = conn
            .execute(
                "UPDATE whitelist_entries SET is_active = 0, updated_at = datetime('now') WHERE ip_address = ?1",
                params![ip.to_string()],
            )
            .await?;
        Ok(affected > 0)
    }

    #[instrument(skip(self))]
    pub async fn find(&self, ip: &str) -> Result<Option<WhitelistEntry>, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT ip_address, country, reason, source, is_active, created_at, updated_at \
                 FROM whitelist_entries WHERE ip_address = ?1",
                params![ip.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<WhitelistEntry>, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT ip_address, country, reason, source, is_active, created_at, updated_at \
                 FROM whitelist_entries WHERE is_active = 1 ORDER BY ip_address ASC",
                (),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(row)?);
        }
        Ok(out)
    }
}

fn map_row(row: Row) -> Result<WhitelistEntry, DbError> {
    let is_active_int: i64 = row.get(4)?;
    let created_at_text: String = row.get(5)?;
    let updated_at_text: String = row.get(6)?;
    Ok(WhitelistEntry {
        ip_address: row.get(0)?,
        country: row.get(1)?,
        reason: row.get(2)?,
        source: row.get(3)?,
        is_active: is_active_int != 0,
        created_at: parse_timestamp(&created_at_text)?,
        updated_at: parse_timestamp(&updated_at_text)?,
    })
}

fn parse_timestamp(text: &str) -> Result<chrono::DateTime<Utc>, DbError> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").map(|naive| naive.and_utc())
        })
        .map_err(|_| DbError::Mapping(format!("unparseable timestamp: {text}")))
}
