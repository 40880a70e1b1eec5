//! Idempotent schema migration: tables, then additive column migrations
//! (ignoring "duplicate column name" so re-running is a no-op), then
//! indexes. Mirrors the persisted state layout of the external interfaces
//! contract.

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

const TABLES: &[(&str, &str)] = &[
    (
        "blocked_ips",
        r#"
        CREATE TABLE IF NOT EXISTS blocked_ips (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ip_address TEXT NOT NULL,
            source TEXT NOT NULL,
            country TEXT,
            reason TEXT NOT NULL,
            confidence INTEGER NOT NULL DEFAULT 50,
            detection_count INTEGER NOT NULL DEFAULT 1,
            detection_date TEXT NOT NULL,
            removal_date TEXT,
            last_seen TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            raw_payload TEXT NOT NULL DEFAULT '{}',
            UNIQUE(ip_address, source)
        );
    "#,
    ),
    (
        "whitelist_entries",
        r#"
        CREATE TABLE IF NOT EXISTS whitelist_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ip_address TEXT NOT NULL UNIQUE,
            country TEXT,
            reason TEXT,
            source TEXT NOT NULL DEFAULT 'MANUAL',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#,
    ),
    (
        "collection_history",
        r#"
        CREATE TABLE IF NOT EXISTS collection_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service_name TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            success INTEGER NOT NULL,
            items_collected INTEGER NOT NULL DEFAULT 0,
            new_count INTEGER NOT NULL DEFAULT 0,
            updated_count INTEGER NOT NULL DEFAULT 0,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            details TEXT NOT NULL DEFAULT '{}'
        );
    "#,
    ),
    (
        "credentials",
        r#"
        CREATE TABLE IF NOT EXISTS credentials (
            service_name TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            password_ciphertext TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            collection_interval_seconds INTEGER NOT NULL DEFAULT 3600,
            last_collection TEXT
        );
    "#,
    ),
    (
        "pull_logs",
        r#"
        CREATE TABLE IF NOT EXISTS pull_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_ip TEXT,
            user_agent TEXT,
            request_path TEXT NOT NULL,
            ip_count INTEGER NOT NULL DEFAULT 0,
            response_time_ms INTEGER NOT NULL DEFAULT 0,
            response_status INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#,
    ),
];

/// Additive column migrations applied after table creation. `ALTER TABLE
/// ADD COLUMN` failures with "duplicate column name" mean the column is
/// already present and are swallowed; any other failure is surfaced.
const COLUMN_MIGRATIONS: &[(&str, &str)] = &[(
    "blocked_ips_confidence_default",
    "ALTER TABLE blocked_ips ADD COLUMN confidence INTEGER NOT NULL DEFAULT 50",
)];

const INDEXES: &[(&str, &str)] = &[
    (
        "idx_blocked_ips_active",
        "CREATE INDEX IF NOT EXISTS idx_blocked_ips_active ON blocked_ips(is_active, removal_date);",
    ),
    (
        "idx_blocked_ips_source",
        "CREATE INDEX IF NOT EXISTS idx_blocked_ips_source ON blocked_ips(source);",
    ),
    (
        "idx_whitelist_active",
        "CREATE INDEX IF NOT EXISTS idx_whitelist_active ON whitelist_entries(is_active);",
    ),
    (
        "idx_collection_history_service",
        "CREATE INDEX IF NOT EXISTS idx_collection_history_service ON collection_history(service_name, started_at);",
    ),
    (
        "idx_pull_logs_created_at",
        "CREATE INDEX IF NOT EXISTS idx_pull_logs_created_at ON pull_logs(created_at);",
    ),
];

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<()> {
    info!("applying blacklist schema");
    create_tables(conn).await?;
    apply_column_migrations(conn).await?;
    create_indexes(conn).await?;
    create_active_view(conn).await?;
    info!("schema up to date");
    Ok(())
}

async fn create_tables(conn: &Connection) -> Result<()> {
    for (name, sql) in TABLES {
        debug!(table = *name, "creating table if missing");
        conn.execute(sql, ())
            .await
            .with_context(|| format!("failed to create table {name}"))?;
    }
    Ok(())
}

async fn apply_column_migrations(conn: &Connection) -> Result<()> {
    for (name, sql) in COLUMN_MIGRATIONS {
        match conn.execute(sql, ()).await {
            Ok(_) => info!(migration = *name, "applied column migration"),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!(migration = *name, "column already present, skipping");
                } else {
                    warn!(migration = *name, error = %message, "column migration failed");
                }
            }
        }
    }
    Ok(())
}

async fn create_indexes(conn: &Connection) -> Result<()> {
    for (name, sql) in INDEXES {
        debug!(index = *name, "ensuring index");
        conn.execute(sql, ())
            .await
            .with_context(|| format!("failed to create index {name}"))?;
    }
    Ok(())
}

/// A read-time view that recomputes `is_active` from `removal_date` against
/// `date('now')`, so stale stored flags never surface to readers (I1, P2, P5).
async fn create_active_view(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        DROP VIEW IF EXISTS blocked_ips_active;
    "#,
        (),
    )
    .await
    .context("failed to drop stale blocked_ips_active view")?;

    conn.execute(
        r#"
        CREATE VIEW blocked_ips_active AS
        SELECT
            id, ip_address, source, country, reason, confidence, detection_count,
            detection_date, removal_date, last_seen, created_at, updated_at, raw_payload,
            CASE
                WHEN removal_date IS NULL THEN 1
                WHEN removal_date >= date('now') THEN 1
                ELSE 0
            END AS is_active
        FROM blocked_ips;
    "#,
        (),
    )
    .await
    .context("failed to create blocked_ips_active view")?;
    Ok(())
}
