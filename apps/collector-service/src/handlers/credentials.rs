//! Credential administration surface (C5): seeds and updates the stored
//! upstream-source credential the scheduler and manual-trigger routes
//! authenticate with. Mirrors the original's collection-credentials API —
//! without it nothing ever writes a `credentials` row and every collection
//! attempt bails with "no credential stored".

use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use blacklist_core_crypto_vault as vault;
use blacklist_domain_models::CredentialSettingsUpdate;
use serde::Deserialize;
use serde_json::json;

use crate::envelope;
use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
    pub username: String,
    pub password: String,
    pub collection_interval_seconds: Option<i64>,
}

/// `PUT /api/credentials/:source` — seeds or replaces the stored
/// credential for `source`, encrypting the password before it ever reaches
/// the repository. Never echoes the ciphertext or plaintext back.
pub async fn upsert(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(source): Path<String>,
    Json(body): Json<UpsertBody>,
) -> Result<Response, ApiError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("username and password must not be empty"));
    }
    let interval = body
        .collection_interval_seconds
        .unwrap_or(state.config.collection_interval_seconds);

    let ciphertext = vault::encrypt_password(&body.password, &state.config.credentials_master_key, &state.config.encryption_salt)
        .map_err(|e| ApiError::internal(format!("credential encrypt failed: {e}")))?;

    state
        .credentials
        .upsert(&source, &body.username, &ciphertext, interval)
        .await?;

    Ok(envelope::ok(
        &request_id.0,
        json!({ "service_name": source, "username": body.username, "collection_interval_seconds": interval }),
    ))
}

/// `PATCH /api/credentials/:source` — settings-only update (enabled,
/// interval); never touches the password, so callers never re-supply it.
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(source): Path<String>,
    Json(update): Json<CredentialSettingsUpdate>,
) -> Result<Response, ApiError> {
    if state.credentials.get(&source).await?.is_none() {
        return Err(ApiError::new(
            axum::http::StatusCode::NOT_FOUND,
            "not_found",
            format!("no credential for {source}"),
        ));
    }
    state.credentials.update_settings(&source, &update).await?;
    Ok(envelope::ok(&request_id.0, json!({ "service_name": source, "updated": true })))
}

/// `GET /api/credentials/:source` — status only; `password_ciphertext` is
/// never exposed through this surface.
pub async fn get(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(source): Path<String>,
) -> Result<Response, ApiError> {
    let credential = state.credentials.get(&source).await?.ok_or_else(|| {
        ApiError::new(axum::http::StatusCode::NOT_FOUND, "not_found", format!("no credential for {source}"))
    })?;
    Ok(envelope::ok(
        &request_id.0,
        json!({
            "service_name": credential.service_name,
            "username": credential.username,
            "enabled": credential.enabled,
            "collection_interval_seconds": credential.collection_interval_seconds,
            "last_collection": credential.last_collection,
        }),
    ))
}
