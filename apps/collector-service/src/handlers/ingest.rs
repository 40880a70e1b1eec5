//! Agent-to-central ingest contract (C8): a remote agent authenticates with
//! a shared-secret `X-API-Key` header and pushes a batch of raw records,
//! which are run through the same normalizer and UPSERT path a scheduled
//! collection would use.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::{Extension, Json};
use blacklist_domain_models::RawRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";
const INGEST_BATCH_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub service_name: String,
    pub items: Vec<RawRecord>,
    #[serde(default)]
    pub collection_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct IngestStats {
    inserted: u64,
    updated: u64,
    errors: u64,
    total: u64,
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let supplied = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if supplied.is_empty() || supplied != state.config.ingest_api_key {
        return Err(ApiError::unauthorized("missing or invalid X-API-Key"));
    }
    Ok(())
}

/// `POST /api/collection/ingest` — the remote-agent push path. Items are run
/// through the same C4 normalizer the scheduled collector uses, then
/// UPSERTed in chunks of [`INGEST_BATCH_SIZE`] so one oversized push cannot
/// hold a single transaction open indefinitely.
pub async fn ingest(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<IngestBody>,
) -> Result<Response, ApiError> {
    authenticate(&state, &headers)?;

    if body.service_name.trim().is_empty() {
        return Err(ApiError::bad_request("service_name must not be empty"));
    }

    let total = body.items.len() as u64;
    let today = body
        .collection_date
        .as_deref()
        .and_then(blacklist_domain_normalizer::parse_flexible_date)
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let (normalized, report) = blacklist_domain_normalizer::normalize_batch(body.items, today);

    let normalized: Vec<_> = normalized
        .into_iter()
        .map(|mut r| {
            r.source = body.service_name.clone();
            r
        })
        .collect();

    // Items the normalizer dropped (private/invalid, expired, in-batch
    // duplicate) surface to the caller the same way a DB-level failure
    // would: as an `errors` count against `total`, not a silent drop.
    let mut inserted = 0u64;
    let mut updated = 0u64;
    let mut errors = report.excluded_private_or_invalid + report.expired + report.deduplicated;

    for chunk in normalized.chunks(INGEST_BATCH_SIZE) {
        match state.blocked_ips.upsert_batch(chunk, &body.service_name).await {
            Ok(outcome) => {
                inserted += outcome.new_count;
                updated += outcome.updated_count;
            }
            Err(_) => errors += chunk.len() as u64,
        }
    }

    for record in &normalized {
        state.decision_cache.invalidate_ip(&record.ip_address);
    }

    let stats = IngestStats {
        inserted,
        updated,
        errors,
        total,
    };

    Ok(crate::envelope::ok(&request_id.0, json!({ "stats": stats })))
}
