//! Route composition: every handler module mounted under its external
//! interface group (§6), the observability middleware layered over the
//! whole tree, and a permissive CORS policy for the operator dashboard.

use std::time::Duration;

use axum::http::{header, HeaderName, Method};
use axum::routing::{delete, get, post, put};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{blacklist, control, credentials, fortinet, health, ingest, whitelist};
use crate::middleware::observe;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-api-key"),
        ])
        .max_age(Duration::from_secs(3600));

    let blacklist_routes = Router::new()
        .route("/check", get(blacklist::check_get).post(blacklist::check_post))
        .route("/manual-add", post(blacklist::manual_add))
        .route("/list", get(blacklist::list))
        .route("/stats", get(blacklist::stats))
        .route("/export.csv", get(blacklist::export_csv));

    let whitelist_routes = Router::new()
        .route("/", get(whitelist::list).post(whitelist::add))
        .route("/:ip", delete(whitelist::remove));

    let fortinet_routes = Router::new()
        .route("/blocklist", get(fortinet::blocklist))
        .route("/threat-feed", get(fortinet::threat_feed))
        .route("/json-connector", get(fortinet::json_connector));

    let control_routes = Router::new()
        .route("/test-auth/:source", post(control::test_auth))
        .route("/force-collection/:source", post(control::force_collection));

    let credentials_routes = Router::new().route(
        "/:source",
        put(credentials::upsert)
            .patch(credentials::update_settings)
            .get(credentials::get),
    );

    Router::new()
        .route("/health", get(health::health))
        .route("/status", get(health::status))
        .route("/logs", get(health::logs))
        .route("/metrics", get(health::metrics))
        .route("/trigger", post(control::trigger))
        .nest("/api/blacklist", blacklist_routes)
        .nest("/api/whitelist", whitelist_routes)
        .nest("/api/fortinet", fortinet_routes)
        .nest("/api", control_routes)
        .nest("/api/credentials", credentials_routes)
        .route("/api/collection/ingest", post(ingest::ingest))
        .layer(middleware::from_fn_with_state(state.clone(), observe))
        .layer(cors)
        .with_state(state)
}
