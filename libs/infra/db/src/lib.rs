//! libsql-backed persistence adapter for the blacklist aggregation
//! pipeline: connection management, idempotent schema migration, and one
//! repository per entity (C5).

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::DbClient;
pub use errors::DbError;
pub use repositories::{
    BlockedIpRepository, CollectionRunRepository, CredentialRepository, PullLogRepository,
    UpsertOutcome, WhitelistRepository, BATCH_SIZE,
};
