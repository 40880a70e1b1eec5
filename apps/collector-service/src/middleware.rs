//! Per-request observability middleware (C10): assigns/propagates a request
//! ID, times the request, and records the `http_requests_total` /
//! `http_request_duration_seconds` / `http_requests_inprogress` /
//! `http_errors_total` series named in §4.10.

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use blacklist_shared_heimdall::{HttpErrorLabels, HttpRequestLabels, HttpRouteLabels};

use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";
const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// Stamps `X-Request-ID` (propagating an inbound one if present, generating
/// a UUID otherwise), times the handler, records the request/duration/
/// in-progress/error metrics, and stamps `X-Response-Time` on the way out.
pub async fn observe(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = req.method().to_string();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    req.extensions_mut().insert(RequestId(request_id.clone()));

    let route_labels = HttpRouteLabels {
        method: method.clone(),
        endpoint: endpoint.clone(),
    };
    state.metrics.http_requests_inprogress.get_or_create(&route_labels).inc();

    let started_at = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = started_at.elapsed();

    state.metrics.http_requests_inprogress.get_or_create(&route_labels).dec();
    state
        .metrics
        .http_request_duration_seconds
        .get_or_create(&route_labels)
        .observe(elapsed.as_secs_f64());

    let status = response.status();
    state
        .metrics
        .http_requests_total
        .get_or_create(&HttpRequestLabels {
            method: method.clone(),
            endpoint: endpoint.clone(),
            status: status.as_u16().to_string(),
        })
        .inc();

    if status.is_client_error() || status.is_server_error() {
        state
            .metrics
            .http_errors_total
            .get_or_create(&HttpErrorLabels {
                method,
                endpoint,
                error_type: if status.is_server_error() { "server" } else { "client" }.to_string(),
                status: status.as_u16().to_string(),
            })
            .inc();
    }

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", header_value);
    }
    if let Ok(header_value) = HeaderValue::from_str(&format!("{}ms", elapsed.as_millis())) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, header_value);
    }

    response
}

/// The request ID assigned by [`observe`], available to handlers via the
/// request extension map so the JSON envelope can echo it back.
#[derive(Clone)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
