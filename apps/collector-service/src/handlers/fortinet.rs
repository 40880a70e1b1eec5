//! FortiGate/perimeter pull endpoints. These are the read-only consumer
//! side of the active blacklist: every pull is logged to `pull_logs` for
//! audit, and the active list is always whitelist-excluded (P1) before it
//! reaches a firewall.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;
use serde_json::json;

use crate::decision::{self, ActiveListFormat, ActiveListView};
use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

fn risk_level(confidence: i32) -> &'static str {
    if confidence >= 80 {
        "high"
    } else if confidence >= 40 {
        "medium"
    } else {
        "low"
    }
}

async fn log_pull(state: &AppState, headers: &HeaderMap, path: &str, ip_count: i64, elapsed_ms: i64, status: u16) {
    let device_ip = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
    let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok());
    if let Err(e) = state
        .pull_logs
        .record(device_ip, user_agent, path, ip_count, elapsed_ms, status as i32)
        .await
    {
        tracing::warn!(error = %e, "failed to record pull_logs row");
    }
}

#[derive(Debug, Deserialize)]
pub struct BlocklistQuery {
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "text".to_string()
}

/// `GET /api/fortinet/blocklist?format=text|json`.
pub async fn blocklist(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<BlocklistQuery>,
) -> Result<Response, ApiError> {
    let started_at = Instant::now();

    if query.format == "json" {
        let view = decision::active_blacklist(&state, ActiveListFormat::Enhanced).await?;
        let ActiveListView::Enhanced(entries) = view else {
            return Err(ApiError::internal("unexpected view format"));
        };
        let count = entries.len() as i64;
        log_pull(&state, &headers, "/api/fortinet/blocklist", count, started_at.elapsed().as_millis() as i64, 200).await;
        return Ok(crate::envelope::ok(&request_id.0, json!({ "entries": entries, "total": count })));
    }

    let view = decision::active_blacklist(&state, ActiveListFormat::Text).await?;
    let ActiveListView::Text(body) = view else {
        return Err(ApiError::internal("unexpected view format"));
    };
    let count = if body.is_empty() { 0 } else { body.lines().count() as i64 };
    let elapsed_ms = started_at.elapsed().as_millis() as i64;
    log_pull(&state, &headers, "/api/fortinet/blocklist", count, elapsed_ms, 200).await;

    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/plain; charset=utf-8".to_string()),
            ("x-total-ips", count.to_string()),
            ("x-generated-at", chrono::Utc::now().to_rfc3339()),
            ("x-whitelist-excluded", "true".to_string()),
            ("x-request-id", request_id.0.clone()),
            ("cache-control", "no-cache, must-revalidate".to_string()),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ThreatFeedQuery {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_command() -> String {
    "snapshot".to_string()
}

/// `GET /api/fortinet/threat-feed?command=snapshot|add|remove&format=json|text`.
///
/// All three commands render the same active, whitelist-excluded entry set
/// — `command` only tags how the receiving connector should apply it
/// (replace vs. incremental), since this endpoint has no notion of a diff
/// against a previous pull.
pub async fn threat_feed(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<ThreatFeedQuery>,
) -> Result<Response, ApiError> {
    let started_at = Instant::now();
    let view = decision::active_blacklist(&state, ActiveListFormat::Text).await?;
    let ActiveListView::Text(body) = view else {
        return Err(ApiError::internal("unexpected view format"));
    };
    let entries: Vec<&str> = if body.is_empty() { vec![] } else { body.lines().collect() };
    let count = entries.len() as i64;
    log_pull(&state, &headers, "/api/fortinet/threat-feed", count, started_at.elapsed().as_millis() as i64, 200).await;

    if query.format == "text" {
        return Ok((
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            body,
        )
            .into_response());
    }

    Ok(crate::envelope::ok(
        &request_id.0,
        json!({
            "commands": [{
                "name": "ip-blacklist",
                "command": query.command,
                "entries": entries,
            }],
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct JsonConnectorQuery {
    pub limit: Option<usize>,
    pub risk_level: Option<String>,
    pub country: Option<String>,
}

/// `GET /api/fortinet/json-connector?limit=&risk_level=&country=`.
pub async fn json_connector(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Query(query): Query<JsonConnectorQuery>,
) -> Result<Response, ApiError> {
    let started_at = Instant::now();
    let view = decision::active_blacklist(&state, ActiveListFormat::Enhanced).await?;
    let ActiveListView::Enhanced(entries) = view else {
        return Err(ApiError::internal("unexpected view format"));
    };

    let total = entries.len();
    let mut filtered: Vec<_> = entries
        .into_iter()
        .filter(|e| {
            query
                .risk_level
                .as_deref()
                .map(|r| risk_level(e.confidence).eq_ignore_ascii_case(r))
                .unwrap_or(true)
        })
        .filter(|e| {
            query
                .country
                .as_deref()
                .map(|c| e.country.as_deref().map(|ec| ec.eq_ignore_ascii_case(c)).unwrap_or(false))
                .unwrap_or(true)
        })
        .collect();

    if let Some(limit) = query.limit {
        filtered.truncate(limit);
    }

    let results: Vec<_> = filtered
        .into_iter()
        .map(|e| {
            json!({
                "ip": e.ip_address,
                "source": e.source,
                "country": e.country,
                "reason": e.reason,
                "confidence": e.confidence,
                "risk_level": risk_level(e.confidence),
            })
        })
        .collect();

    let filtered_count = results.len() as i64;
    log_pull(
        &state,
        &headers,
        "/api/fortinet/json-connector",
        filtered_count,
        started_at.elapsed().as_millis() as i64,
        200,
    )
    .await;

    Ok(crate::envelope::ok(
        &request_id.0,
        json!({
            "results": results,
            "metadata": {
                "total": total,
                "filtered": filtered_count,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "version": "1",
                "filters": {
                    "limit": query.limit,
                    "risk_level": query.risk_level,
                    "country": query.country,
                },
            },
        }),
    ))
}
