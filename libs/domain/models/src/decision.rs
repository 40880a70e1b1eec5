use serde::{Deserialize, Serialize};

/// The output of the hot read path (C7): whether an IP is blocked, why, and
/// supporting metadata. Constructed fresh on every call; never carries a
/// reference back into cache or DB state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub blocked: bool,
    pub reason: String,
    pub metadata: DecisionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DecisionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
}

impl Decision {
    pub fn whitelisted() -> Self {
        Self {
            blocked: false,
            reason: "whitelist".to_string(),
            metadata: DecisionMetadata {
                source: Some("whitelist".to_string()),
                ..Default::default()
            },
        }
    }

    pub fn not_in_blacklist() -> Self {
        Self {
            blocked: false,
            reason: "not_in_blacklist".to_string(),
            metadata: DecisionMetadata::default(),
        }
    }

    /// Fail-open response for the hot path: DB/cache errors never block traffic.
    pub fn error_fail_open() -> Self {
        Self {
            blocked: false,
            reason: "error".to_string(),
            metadata: DecisionMetadata::default(),
        }
    }

    pub fn blocked(source: String, detection_count: i32, reason: String, cache_hit: bool) -> Self {
        Self {
            blocked: true,
            reason,
            metadata: DecisionMetadata {
                source: Some(source),
                detection_count: Some(detection_count),
                cache_hit: Some(cache_hit),
            },
        }
    }
}

/// Statistics snapshot served by the aggregated-views operations of C7.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BlacklistStatistics {
    pub total_active: i64,
    pub total_inactive: i64,
    pub by_source: Vec<SourceCount>,
    pub added_last_24h: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCount {
    pub source: String,
    pub count: i64,
}
