//! Read/Decision Service HTTP surface (C7): single-IP checks, the operator
//! list/stats views, manual add, and a CSV export.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use blacklist_domain_models::{NormalizedRecord, RawRecord};
use serde::Deserialize;
use serde_json::json;

use crate::decision::{self, ActiveListFormat, ActiveListView};
use crate::envelope::{self, Page};
use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckBody {
    pub ip: String,
}

/// `GET /api/blacklist/check?ip=` — query-string form of the hot decision path.
pub async fn check_get(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<CheckQuery>,
) -> Result<Response, ApiError> {
    let ip = query.ip.ok_or_else(|| ApiError::bad_request("ip query parameter is required"))?;
    let decision = decision::check_blacklist(&state, &ip).await;
    Ok(envelope::ok(&request_id.0, decision))
}

/// `POST /api/blacklist/check` — body form of the hot decision path, for
/// callers that prefer not to URL-encode an IP.
pub async fn check_post(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<CheckBody>,
) -> Result<Response, ApiError> {
    let decision = decision::check_blacklist(&state, &body.ip).await;
    Ok(envelope::ok(&request_id.0, decision))
}

#[derive(Debug, Deserialize)]
pub struct ManualAddBody {
    pub ip_address: String,
    pub country: Option<String>,
    pub reason: Option<String>,
    pub confidence: Option<String>,
}

/// `POST /api/blacklist/manual-add` — a single operator-entered record.
/// Unlike the scheduled/ingest UPSERT path, this rejects a duplicate
/// `(ip_address, source="MANUAL")` with 409 rather than re-observing it.
pub async fn manual_add(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<ManualAddBody>,
) -> Result<Response, ApiError> {
    let today = chrono::Utc::now().date_naive();
    let raw = RawRecord {
        ip_address: Some(body.ip_address.clone()),
        country: body.country,
        reason: body.reason,
        detection_date: None,
        removal_date: None,
        confidence_hint: body.confidence,
        raw: json!({}),
    };

    let (mut normalized, report) = blacklist_domain_normalizer::normalize_batch(vec![raw], today);
    if normalized.is_empty() {
        let cause = if report.excluded_private_or_invalid > 0 {
            "ip_address is private, reserved, or not a valid public address"
        } else {
            "removal_date already expired"
        };
        return Err(ApiError::bad_request(cause));
    }

    let record: NormalizedRecord = normalized.remove(0);
    let row = state.blocked_ips.insert_manual(&record, "MANUAL").await?;
    state.decision_cache.invalidate_ip(&row.ip_address);

    Ok((StatusCode::CREATED, envelope::ok(&request_id.0, row)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    50
}

/// `GET /api/blacklist/list` — paginated, whitelist-excluded active list for
/// operator dashboards.
pub async fn list(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 1000);

    let (items, total) = state.blocked_ips.list_active_page(page, per_page).await?;
    Ok(envelope::ok(&request_id.0, Page::new(items, page, per_page, total)))
}

/// `GET /api/blacklist/stats` — aggregated counts (C7).
pub async fn stats(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Response, ApiError> {
    let stats = decision::statistics(&state).await?;
    Ok(envelope::ok(&request_id.0, stats))
}

/// `GET /api/blacklist/export.csv` — the active, whitelist-excluded list as
/// a CSV download, for operators who want to load it into a spreadsheet or
/// a device that only accepts CSV.
pub async fn export_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let view = decision::active_blacklist(&state, ActiveListFormat::Enhanced).await?;
    let ActiveListView::Enhanced(entries) = view else {
        return Err(ApiError::internal("unexpected view format"));
    };

    let mut writer = csv::Writer::from_writer(vec![]);
    writer
        .write_record(["ip_address", "source", "country", "reason", "confidence", "detection_count"])
        .map_err(|e| ApiError::internal(e.to_string()))?;
    for entry in entries {
        writer
            .write_record([
                entry.ip_address.as_str(),
                entry.source.as_str(),
                entry.country.as_deref().unwrap_or(""),
                entry.reason.as_str(),
                &entry.confidence.to_string(),
                &entry.detection_count.to_string(),
            ])
            .map_err(|e| ApiError::internal(e.to_string()))?;
    }
    let body = writer.into_inner().map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/csv; charset=utf-8"),
            ("content-disposition", "attachment; filename=\"blacklist.csv\""),
        ],
        body,
    )
        .into_response())
}
