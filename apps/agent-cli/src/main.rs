//! Standalone remote-agent binary (C8, agent side): authenticates against
//! the upstream portal, sweeps for records, and pushes the batch to a
//! central `blacklist-collector-service` deployment's ingest endpoint.
//!
//! Exit codes: `0` success; `1` configuration error (missing secret or
//! credentials) or push failure — matching the fail-fast convention the
//! collector service's own `Config::load` uses.

use std::process::ExitCode;

use blacklist_core_rate_limiter::RateLimiter;
use blacklist_infra_portal_client::{sweep, PortalAuthClient};
use clap::Parser;
use serde_json::json;
use tracing::{error, info};

#[derive(Parser, Debug)]
struct AgentConfig {
    #[arg(long, env = "REGTECH_BASE_URL", default_value = "https://regtech.fsec.or.kr")]
    base_url: String,

    #[arg(long, env = "REGTECH_USERNAME")]
    username: String,

    #[arg(long, env = "REGTECH_PASSWORD")]
    password: String,

    /// Name this agent reports records under; becomes `service_name` in the
    /// ingest payload and `source` once persisted.
    #[arg(long, env = "AGENT_SOURCE_NAME", default_value = "REGTECH")]
    source_name: String,

    /// Base URL of the central collector service's ingest endpoint.
    #[arg(long, env = "CENTRAL_INGEST_URL")]
    central_ingest_url: String,

    /// Shared secret presented via `X-API-Key`.
    #[arg(long, env = "INGEST_API_KEY")]
    ingest_api_key: String,

    #[arg(long, env = "MAX_PAGES_PER_COLLECTION", default_value = "50")]
    max_pages: u32,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let config = match AgentConfig::try_parse() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "missing or invalid agent configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "agent run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let auth = PortalAuthClient::new(config.base_url.clone());
    let limiter = RateLimiter::with_defaults();

    let authenticated = auth.authenticate(&config.username, &config.password).await?;
    if !authenticated {
        anyhow::bail!("upstream portal rejected credentials");
    }

    let today = chrono::Utc::now().date_naive();
    let (strategy, records) = sweep(&auth, &limiter, today, None, config.max_pages).await?;
    info!(?strategy, count = records.len(), "swept records from upstream");

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/collection/ingest", config.central_ingest_url.trim_end_matches('/')))
        .header("X-API-Key", &config.ingest_api_key)
        .json(&json!({
            "service_name": config.source_name,
            "items": records,
            "collection_date": today.to_string(),
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("central ingest rejected the push: HTTP {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    info!(stats = %body, "push accepted by central");
    Ok(())
}
