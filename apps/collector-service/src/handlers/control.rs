//! Health/Control API mutation surfaces (C9): manual trigger, auth test,
//! and forced collection.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::scheduler::{default_collectors, run_collection};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct TriggerBody {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn parse_range(body: &TriggerBody) -> Result<Option<(NaiveDate, NaiveDate)>, ApiError> {
    match (&body.start_date, &body.end_date) {
        (Some(start), Some(end)) => {
            let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request("start_date must be YYYY-MM-DD"))?;
            let end = NaiveDate::parse_from_str(end, "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request("end_date must be YYYY-MM-DD"))?;
            Ok(Some((start, end)))
        }
        (None, None) => Ok(None),
        _ => Err(ApiError::bad_request("start_date and end_date must be supplied together")),
    }
}

fn collector_by_name(name: &str) -> Result<std::sync::Arc<dyn crate::collector::Collector>, ApiError> {
    default_collectors()
        .into_iter()
        .find(|c| c.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| ApiError::new(axum::http::StatusCode::NOT_FOUND, "not_found", format!("unknown source {name}")))
}

/// `POST /trigger` — out-of-band manual collection against the default
/// source, bounded by `MAX_PAGES_PER_COLLECTION`. Runs through the same
/// per-source tick lock as the scheduled daemon, so it never races a
/// scheduled tick.
pub async fn trigger(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<TriggerBody>,
) -> Result<Response, ApiError> {
    let range = parse_range(&body)?;
    let collector = collector_by_name("REGTECH")?;

    let outcome = run_collection(&state, collector.as_ref(), range, state.config.max_pages_per_collection)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(crate::envelope::ok(&request_id.0, outcome))
}

/// `POST /api/test-auth/:source` — exercises the two-step login against
/// the stored credential without collecting anything.
pub async fn test_auth(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(source): Path<String>,
) -> Result<Response, ApiError> {
    let collector = collector_by_name(&source)?;
    let ok = collector.authenticate(&state).await.map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(crate::envelope::ok(&request_id.0, json!({ "source": source, "authenticated": ok })))
}

/// `POST /api/force-collection/:source` — a one-shot 50-page forced run.
pub async fn force_collection(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(source): Path<String>,
) -> Result<Response, ApiError> {
    let collector = collector_by_name(&source)?;
    let outcome = run_collection(&state, collector.as_ref(), None, 50)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(crate::envelope::ok(&request_id.0, outcome))
}
