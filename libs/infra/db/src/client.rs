//! Connection client for the blacklist store.
//!
//! `libsql` is embeddable-or-hosted SQLite; this client detects remote
//! (`libsql://`/`https://`) vs. local vs. in-memory URLs and applies the
//! schema migration once at connect time. In memory mode a single anchor
//! connection is kept alive so the schema stays resident for the lifetime
//! of the process, since SQLite drops an in-memory database the instant its
//! last connection closes.

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::{info, instrument};

use crate::errors::DbError;
use crate::schema::apply_schema;

#[derive(Clone)]
pub struct DbClient {
    driver: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl DbClient {
    #[instrument(skip(auth_token))]
    pub async fn connect(database_url: &str, auth_token: Option<String>) -> Result<Self, DbError> {
        if database_url.is_empty() {
            return Err(DbError::Configuration("DATABASE_URL is empty".into()));
        }

        let is_remote = database_url.starts_with("libsql://") || database_url.starts_with("https://");
        let is_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        info!(database_url, is_remote, is_memory, "connecting to blacklist store");

        let driver = if is_remote {
            let token = auth_token
                .ok_or_else(|| DbError::Configuration("remote database requires an auth token".into()))?;
            Builder::new_remote(database_url.to_string(), token)
                .build()
                .await
        } else {
            Builder::new_local(database_url).build().await
        }
        .map_err(|e| DbError::Connection(e.to_string()))?;

        let driver = Arc::new(driver);

        let bootstrap = driver.connect().map_err(|e| DbError::Connection(e.to_string()))?;
        apply_schema(&bootstrap)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let anchor = if is_memory { Some(Arc::new(bootstrap)) } else { None };

        Ok(Self {
            driver,
            _memory_anchor: anchor,
        })
    }

    /// Returns a fresh connection tuned for batch throughput. libsql
    /// connections are cheap handles over the shared driver, not pooled
    /// sockets, so callers may acquire one per operation.
    pub async fn get_connection(&self) -> Result<Connection, DbError> {
        let conn = self.driver.connect().map_err(|e| DbError::Connection(e.to_string()))?;
        conn.execute("PRAGMA journal_mode = WAL", ()).await.ok();
        conn.execute("PRAGMA synchronous = NORMAL", ()).await.ok();
        Ok(conn)
    }
}
