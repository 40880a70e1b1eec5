//! The stable JSON envelope (§6): `{success, data?, error?, timestamp,
//! request_id}`. Every operator-facing route wraps its payload with
//! [`ok`] rather than returning a bare `Json<T>`, so the shape is uniform
//! across handlers.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

pub fn ok<T: Serialize>(request_id: &str, data: T) -> Response {
    Json(json!({
        "success": true,
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "request_id": request_id,
    }))
    .into_response()
}

/// A paginated payload, per §6's `{page, per_page, total, pages}` convention.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub pages: u64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page as u64)
        };
        Self {
            items,
            page,
            per_page,
            total,
            pages,
        }
    }
}
