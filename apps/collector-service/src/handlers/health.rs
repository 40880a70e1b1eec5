//! Health/Control API read surfaces (C9): `/health`, `/status`, `/logs`,
//! `/metrics`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use crate::middleware::RequestId;
use crate::state::AppState;

/// Liveness + dependency probe. Always responds HTTP 200 with a `status`
/// field of `healthy`/`degraded`/`unhealthy` — graceful degradation means a
/// struggling dependency never turns into a 5xx that a load balancer would
/// use to pull the instance from rotation.
pub async fn health(State(state): State<AppState>, Extension(request_id): Extension<RequestId>) -> Response {
    let db_ok = state.blocked_ips.count_by_source().await.is_ok();
    let cache_size = state.decision_cache.len();

    let status = if db_ok { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "components": {
            "database": if db_ok { "up" } else { "down" },
            "cache": "up",
        },
        "cache_entries": cache_size,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "request_id": request_id.0,
    }))
    .into_response()
}

/// Scheduler snapshot for every known upstream source, plus that source's
/// rate-limiter stats.
pub async fn status(State(state): State<AppState>, Extension(request_id): Extension<RequestId>) -> Response {
    let snapshots = state.scheduler.all_snapshots().await;

    let mut sources = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        let limiter = state.rate_limiters.get_or_create(&snapshot.service_name);
        let limiter_stats = limiter.stats().await;
        sources.push(json!({
            "service_name": snapshot.service_name,
            "total_runs": snapshot.total_runs,
            "successful_runs": snapshot.successful_runs,
            "failed_runs": snapshot.failed_runs,
            "last_run": snapshot.last_run,
            "last_success": snapshot.last_success,
            "last_failure": snapshot.last_failure,
            "consecutive_failures": snapshot.consecutive_failures,
            "adaptive_interval_seconds": snapshot.adaptive_interval_seconds,
            "rate_limiter": {
                "rate": limiter_stats.rate,
                "burst_size": limiter_stats.burst_size,
                "current_tokens": limiter_stats.current_tokens,
                "current_backoff": limiter_stats.current_backoff,
                "total_requests": limiter_stats.total_requests,
                "total_waits": limiter_stats.total_waits,
            },
        }));
    }

    crate::envelope::ok(
        &request_id.0,
        json!({
            "auto_collection_disabled": state.config.disable_auto_collection,
            "sources": sources,
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_minutes")]
    pub minutes: i64,
    pub level: Option<String>,
}

fn default_minutes() -> i64 {
    60
}

/// Last `minutes` of ring-buffered structured log entries (cap 100
/// regardless of window, since the buffer itself never holds more).
pub async fn logs(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let cutoff = chrono::Utc::now() - chrono::Duration::minutes(query.minutes.max(0));
    let level_filter = query.level.map(|l| l.to_uppercase());

    let entries: Vec<_> = state
        .log_buffer
        .snapshot()
        .into_iter()
        .filter(|entry| entry.timestamp >= cutoff)
        .filter(|entry| level_filter.as_ref().map(|l| &entry.level == l).unwrap_or(true))
        .collect();

    crate::envelope::ok(&request_id.0, json!({ "entries": entries, "count": entries.len() }))
}

/// Prometheus text exposition for all series named in §4.10.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
