use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag for a [`WhitelistEntry`]: either a manual operator addition or
/// an upstream-tagged entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum WhitelistSource {
    Manual,
    #[serde(other)]
    Upstream,
}

impl std::fmt::Display for WhitelistSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WhitelistSource::Manual => write!(f, "MANUAL"),
            WhitelistSource::Upstream => write!(f, "UPSTREAM"),
        }
    }
}

/// An IP address exempted from blacklist decisions. An active whitelist
/// membership suppresses any blacklist verdict unconditionally (P1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WhitelistEntry {
    pub ip_address: String,
    pub country: Option<String>,
    pub reason: Option<String>,
    pub source: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
