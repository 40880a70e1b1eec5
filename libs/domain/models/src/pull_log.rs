use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit row for a perimeter-firewall pull against the
/// active-blacklist read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullLog {
    pub id: i64,
    pub device_ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_path: String,
    pub ip_count: i64,
    pub response_time_ms: i64,
    pub response_status: i32,
    pub created_at: DateTime<Utc>,
}
