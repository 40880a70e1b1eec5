use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One append-only ledger row per scheduler tick or manual trigger (P10).
/// Rows are immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionRun {
    pub id: i64,
    pub service_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub items_collected: i64,
    pub new_count: i64,
    pub updated_count: i64,
    pub duration_ms: i64,
    pub error_message: Option<String>,
    pub details: Value,
}

/// Parameters accepted by a manual or forced collection trigger.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CollectionRange {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Outcome of a single collection run, before it is persisted as a
/// [`CollectionRun`] row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionOutcome {
    pub success: bool,
    pub items_collected: u64,
    pub new_count: u64,
    pub updated_count: u64,
    pub error_message: Option<String>,
    pub details: Value,
}

impl CollectionOutcome {
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            items_collected: 0,
            new_count: 0,
            updated_count: 0,
            error_message: Some(error_message.into()),
            details: Value::Null,
        }
    }
}
