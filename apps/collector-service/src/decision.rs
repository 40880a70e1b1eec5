//! Read/Decision Service (C7): the hot path for perimeter consumers.
//! Whitelist membership is checked first and unconditionally suppresses any
//! blacklist verdict (P1) — this module is the one place that ordering is
//! allowed to be decided, so every caller (HTTP handlers, the text/export
//! views) routes through it rather than querying repositories directly.

use blacklist_domain_models::{BlacklistStatistics, Decision, SourceCount};
use blacklist_shared_heimdall::{DecisionLabels, Metrics};
use tracing::{info, warn};

use crate::state::AppState;

/// Checks whitelist membership for `ip`, consulting the cache before the
/// database and writing the result back regardless of outcome. A cache
/// write failure never fails the call — there simply is no cache backend
/// that can fail here (in-process `DashMap`), but the shape is kept
/// explicit so a future network-backed cache slots in without a signature
/// change.
pub async fn is_whitelisted(state: &AppState, ip: &str) -> bool {
    if let Some(cached) = state.decision_cache.get_whitelist(ip) {
        return !cached.blocked && cached.reason == "whitelist";
    }

    let member = match state.whitelist.is_active_member(ip).await {
        Ok(member) => member,
        Err(e) => {
            warn!(error = %e, ip, "whitelist lookup failed, fail-open (not whitelisted)");
            return false;
        }
    };

    let decision = if member {
        Decision::whitelisted()
    } else {
        Decision::not_in_blacklist()
    };
    state.decision_cache.set_whitelist(ip, decision);
    member
}

/// The critical-ordering decision: whitelist first, then cache, then
/// database. Errors at any DB/cache step fail open — the hot path never
/// blocks legitimate traffic because a backend hiccupped (§7).
pub async fn check_blacklist(state: &AppState, ip: &str) -> Decision {
    if is_whitelisted(state, ip).await {
        state.metrics.blacklist_whitelist_hits_total.inc();
        log_decision(state, "ALLOWED", ip, "whitelist");
        return Decision::whitelisted();
    }

    if let Some(cached) = state.decision_cache.get_blacklist(ip) {
        let mut cached = cached;
        cached.metadata.cache_hit = Some(true);
        log_decision(state, decision_tag(&cached), ip, &cached.reason);
        return cached;
    }

    let decision = match state.blocked_ips.find_active_by_ip(ip).await {
        Ok(Some(row)) => Decision::blocked(row.source, row.detection_count, row.reason, false),
        Ok(None) => Decision::not_in_blacklist(),
        Err(e) => {
            warn!(error = %e, ip, "blacklist lookup failed, fail-open");
            record_decision_metric(&state.metrics, "error", "error");
            return Decision::error_fail_open();
        }
    };

    state.decision_cache.set_blacklist(ip, decision.clone());
    log_decision(state, decision_tag(&decision), ip, &decision.reason);
    decision
}

fn decision_tag(decision: &Decision) -> &'static str {
    if decision.blocked {
        "BLOCKED"
    } else {
        "ALLOWED"
    }
}

fn log_decision(state: &AppState, tag: &str, ip: &str, reason: &str) {
    info!(decision = tag, ip, reason, "blacklist decision");
    record_decision_metric(&state.metrics, tag, reason);
}

fn record_decision_metric(metrics: &Metrics, decision: &str, reason: &str) {
    metrics
        .blacklist_decisions_total
        .get_or_create(&DecisionLabels {
            decision: decision.to_string(),
            reason: reason.to_string(),
        })
        .inc();
}

/// One entry of the `enhanced` active-blacklist view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnhancedEntry {
    pub ip_address: String,
    pub source: String,
    pub country: Option<String>,
    pub reason: String,
    pub confidence: i32,
    pub detection_count: i32,
}

/// Renderable forms of the active-blacklist view, per §4.7.
pub enum ActiveListFormat {
    Text,
    Enhanced,
    Fortigate,
}

pub enum ActiveListView {
    Text(String),
    Enhanced(Vec<EnhancedEntry>),
    Fortigate(serde_json::Value),
}

/// Builds the active-blacklist view, already whitelist-excluded by the
/// repository's set-difference query, in the requested rendering.
pub async fn active_blacklist(
    state: &AppState,
    format: ActiveListFormat,
) -> Result<ActiveListView, blacklist_infra_db::DbError> {
    let rows = state.blocked_ips.list_active_excluding_whitelist().await?;

    Ok(match format {
        ActiveListFormat::Text => {
            let mut ips: Vec<&str> = rows.iter().map(|r| r.ip_address.as_str()).collect();
            ips.sort();
            ActiveListView::Text(ips.join("\n"))
        }
        ActiveListFormat::Enhanced => ActiveListView::Enhanced(
            rows.into_iter()
                .map(|r| EnhancedEntry {
                    ip_address: r.ip_address,
                    source: r.source,
                    country: r.country,
                    reason: r.reason,
                    confidence: r.confidence,
                    detection_count: r.detection_count,
                })
                .collect(),
        ),
        ActiveListFormat::Fortigate => {
            let entries: Vec<_> = rows
                .iter()
                .map(|r| serde_json::json!({"ip": r.ip_address, "action": "block"}))
                .collect();
            ActiveListView::Fortigate(serde_json::json!({
                "entries": entries,
                "total": entries.len(),
                "format": "fortigate",
            }))
        }
    })
}

/// Aggregated statistics: counts by source, active/inactive split, and
/// additions in the last 24 hours.
pub async fn statistics(state: &AppState) -> Result<BlacklistStatistics, blacklist_infra_db::DbError> {
    let by_source = state.blocked_ips.count_by_source().await?;
    let (total_active, total_inactive) = state.blocked_ips.count_active_inactive().await?;
    let added_last_24h = state.blocked_ips.count_added_last_24h().await?;

    Ok(BlacklistStatistics {
        total_active,
        total_inactive,
        by_source: by_source
            .into_iter()
            .map(|(source, count)| SourceCount { source, count })
            .collect(),
        added_last_24h,
    })
}
