//! Process entry point: load configuration, wire up state, spawn the
//! background daemons (per-source scheduler ticks, the stale-active sweep),
//! and serve the HTTP surface.

use blacklist_collector_service::scheduler::{default_collectors, spawn_daemon};
use blacklist_collector_service::{build_router, AppState, Config};
use tracing::{error, info};

const STALE_SWEEP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let log_buffer = blacklist_shared_heimdall::init_tracing("blacklist-collector-service");

    let state = AppState::bootstrap(config, log_buffer).await?;
    let port = state.config.port;

    for collector in default_collectors() {
        spawn_daemon(state.clone(), collector);
    }
    spawn_stale_sweep(state.clone());

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "blacklist-collector-service listening");
    axum::serve(listener, router).await?;

    Ok(())
}

/// Periodically flips `is_active` on rows whose stored value has drifted
/// from the removal-date-derived truth. Readers never depend on this —
/// `blocked_ips_active` recomputes on every query — but letting the stored
/// column lag indefinitely would confuse anything that queries the base
/// table directly (ad hoc reporting, a future export job).
fn spawn_stale_sweep(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(STALE_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match state.blocked_ips.sweep_stale_actives().await {
                Ok(affected) if affected > 0 => info!(affected, "swept stale active rows"),
                Ok(_) => {}
                Err(e) => error!(error = %e, "stale-active sweep failed"),
            }
        }
    });
}
