//! The core entity: an IP address observed as blocked by an upstream source.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A blocked-IP record, keyed by the natural key `(ip_address, source)`.
///
/// `is_active` is stored for query convenience but is never authoritative —
/// readers must treat `blocked_ips_active`-style recomputation from
/// `removal_date` as the source of truth (see [`BlockedIp::is_active_now`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedIp {
    pub id: i64,
    pub ip_address: String,
    pub source: String,
    pub country: Option<String>,
    pub reason: String,
    pub confidence: i32,
    pub detection_count: i32,
    pub detection_date: NaiveDate,
    pub removal_date: Option<NaiveDate>,
    pub last_seen: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub raw_payload: Value,
}

impl BlockedIp {
    /// Recomputes activity from `removal_date` against `today`, per invariant I1.
    /// This is the only computation a reader may trust; the stored `is_active`
    /// column may lag by up to one scheduler tick.
    pub fn is_active_now(&self, today: NaiveDate) -> bool {
        match self.removal_date {
            None => true,
            Some(removal_date) => removal_date >= today,
        }
    }
}

/// A normalized record ready for UPSERT, produced by the normalizer (C4) and
/// consumed by the persistence layer (C5). Distinct from [`BlockedIp`] because
/// it carries no `id`, `created_at`, or stored `is_active` — those are
/// assigned or recomputed by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedRecord {
    pub ip_address: String,
    pub source: String,
    pub country: Option<String>,
    pub reason: String,
    pub confidence: i32,
    pub detection_date: NaiveDate,
    pub removal_date: Option<NaiveDate>,
    pub is_active: bool,
    pub raw_payload: Value,
}

/// A raw, not-yet-validated record as produced by the scrape/parse engine (C3).
/// Fields are optional/stringly because upstream shape is inconsistent; the
/// normalizer is responsible for turning this into a [`NormalizedRecord`] or
/// rejecting it.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RawRecord {
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub reason: Option<String>,
    pub detection_date: Option<String>,
    pub removal_date: Option<String>,
    pub confidence_hint: Option<String>,
    /// The original row, preserved verbatim for `raw_payload`.
    pub raw: Value,
}

/// Outcome of one normalization pass over a batch of [`RawRecord`]s.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    pub excluded_private_or_invalid: u64,
    pub expired: u64,
    pub deduplicated: u64,
    pub accepted: u64,
}
