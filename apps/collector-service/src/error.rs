//! Single `ApiError` mapping every crate's error taxonomy into the JSON
//! error envelope of §6, so handlers return `Result<T, ApiError>` instead of
//! hand-rolling a status+body pair at each call site.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "database", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl From<blacklist_infra_db::DbError> for ApiError {
    fn from(err: blacklist_infra_db::DbError) -> Self {
        match err {
            blacklist_infra_db::DbError::Conflict(ip) => {
                ApiError::conflict(format!("entry already exists for {ip}"))
            }
            blacklist_infra_db::DbError::CredentialNotFound(service) => {
                ApiError::new(StatusCode::NOT_FOUND, "not_found", format!("no credential for {service}"))
            }
            other => ApiError::database(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.code,
                "message": self.message,
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "request_id": Uuid::new_v4().to_string(),
        }));
        (self.status, body).into_response()
    }
}
