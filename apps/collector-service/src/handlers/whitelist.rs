//! Whitelist management HTTP surface. Every mutation invalidates the
//! decision cache for the affected IP (P7) so the hot path can never keep
//! serving a stale verdict past a whitelist change.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::envelope;
use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddBody {
    pub ip_address: String,
    pub country: Option<String>,
    pub reason: Option<String>,
}

/// `POST /api/whitelist` — add or reactivate a whitelist entry.
pub async fn add(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<AddBody>,
) -> Result<Response, ApiError> {
    let entry = state
        .whitelist
        .add(&body.ip_address, body.country, body.reason, "MANUAL")
        .await?;
    state.decision_cache.invalidate_ip(&entry.ip_address);
    Ok(envelope::ok(&request_id.0, entry))
}

/// `DELETE /api/whitelist/:ip` — deactivate a whitelist entry.
pub async fn remove(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(ip): Path<String>,
) -> Result<Response, ApiError> {
    let removed = state.whitelist.remove(&ip).await?;
    if !removed {
        return Err(ApiError::new(
            axum::http::StatusCode::NOT_FOUND,
            "not_found",
            format!("no whitelist entry for {ip}"),
        ));
    }
    state.decision_cache.invalidate_ip(&ip);
    Ok(envelope::ok(&request_id.0, serde_json::json!({ "ip_address": ip, "removed": true })))
}

/// `GET /api/whitelist` — all active whitelist entries.
pub async fn list(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Response, ApiError> {
    let entries = state.whitelist.list_active().await?;
    Ok(envelope::ok(&request_id.0, entries))
}
