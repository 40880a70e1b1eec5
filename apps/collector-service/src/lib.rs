//! Collection scheduler, decision service, and HTTP surface for the
//! IP-blacklist aggregation pipeline.
//!
//! `main.rs` is a thin bootstrap over this library: load config, build
//! `AppState`, spawn the per-source scheduler daemons and the stale-active
//! sweep, then serve the Axum router built here.

pub mod collector;
pub mod config;
pub mod decision;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use config::Config;
pub use routes::build_router;
pub use state::AppState;
