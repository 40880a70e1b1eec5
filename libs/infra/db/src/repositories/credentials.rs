//! Repository for `credentials`. Encryption/decryption of the password
//! column is the caller's responsibility (`blacklist-core-crypto-vault`);
//! this repository only moves ciphertext.

use blacklist_domain_models::{Credential, CredentialSettingsUpdate};
use chrono::Utc;
use libsql::{params, Row};
use tracing::instrument;

use crate::client::DbClient;
use crate::errors::DbError;

pub struct CredentialRepository {
    client: DbClient,
}

impl CredentialRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, service_name: &str) -> Result<Option<Credential>, DbError> {
        let conn = self.client.get_connection().await?;
        let mut rows = conn
            .query(
                "SELECT service_name, username, password_ciphertext, enabled, \
                 collection_interval_seconds, last_collection FROM credentials WHERE service_name = ?1",
                params![service_name.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    /// Inserts or fully replaces a credential, including its ciphertext.
    #[instrument(skip(self, password_ciphertext))]
    pub async fn upsert(
        &self,
        service_name: &str,
        username: &str,
        password_ciphertext: &str,
        collection_interval_seconds: i64,
    ) -> Result<(), DbError> {
        let conn = self.client.get_connection().await?;
        conn.execute(
            r#"
            INSERT INTO credentials (service_name, username, password_ciphertext, enabled, collection_interval_seconds)
            VALUES (?1, ?2, ?3, 1, ?4)
            ON CONFLICT(service_name) DO UPDATE SET
                username = excluded.username,
                password_ciphertext = excluded.password_ciphertext,
                collection_interval_seconds = excluded.collection_interval_seconds
            "#,
            params![
                service_name.to_string(),
                username.to_string(),
                password_ciphertext.to_string(),
                collection_interval_seconds,
            ],
        )
        .await?;
        Ok(())
    }

    /// Settings-only update (interval, enabled); never touches the
    /// ciphertext column, so the password never needs re-supplying.
    #[instrument(skip(self))]
    pub async fn update_settings(
        &self,
        service_name: &str,
        update: &CredentialSettingsUpdate,
    ) -> Result<(), DbError> {
        let conn = self.client.get_connection().await?;
        if let Some(enabled) = update.enabled {
            conn.execute(
                "UPDATE credentials SET enabled = ?1 WHERE service_name = ?2",
                params![enabled as i64, service_name.to_string()],
            )
            .await?;
        }
        if let Some(interval) = update.collection_interval_seconds {
            conn.execute(
                "UPDATE credentials SET collection_interval_seconds = ?1 WHERE service_name = ?2",
                params![interval, service_name.to_string()],
            )
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn record_collection_attempt(&self, service_name: &str) -> Result<(), DbError> {
        let conn = self.client.get_connection().await?;
        conn.execute(
            "UPDATE credentials SET last_collection = ?1 WHERE service_name = ?2",
            params![Utc::now().to_rfc3339(), service_name.to_string()],
        )
        .await?;
        Ok(())
    }
}

fn map_row(row: Row) -> Result<Credential, DbError> {
    let enabled_int: i64 = row.get(3)?;
    let last_collection_text: Option<String> = row.get(5)?;
    Ok(Credential {
        service_name: row.get(0)?,
        username: row.get(1)?,
        password_ciphertext: row.get(2)?,
        enabled: enabled_int != 0,
        collection_interval_seconds: row.get(4)?,
        last_collection: last_collection_text
            .map(|s| {
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| DbError::Mapping(format!("unparseable timestamp: {s}")))
            })
            .transpose()?,
    })
}
