//! Shared application state handed to every Axum handler: the persistence
//! repositories, the decision caches, the rate-limiter registry, the
//! scheduler, and the observability primitives. Built once in `main` and
//! cloned cheaply (everything inside is `Arc`-backed) per request.

use std::sync::Arc;
use std::time::Instant;

use blacklist_core_crypto_vault as vault;
use blacklist_core_rate_limiter::RateLimiterRegistry;
use blacklist_infra_cache::{AuthValidityCache, DecisionCache};
use blacklist_infra_db::{
    BlockedIpRepository, CollectionRunRepository, CredentialRepository, DbClient, PullLogRepository,
    WhitelistRepository,
};
use blacklist_infra_portal_client::PortalAuthClient;
use blacklist_shared_heimdall::{LogRingBuffer, Metrics};

use crate::config::Config;
use crate::scheduler::SchedulerRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub blocked_ips: Arc<BlockedIpRepository>,
    pub whitelist: Arc<WhitelistRepository>,
    pub collection_runs: Arc<CollectionRunRepository>,
    pub credentials: Arc<CredentialRepository>,
    pub pull_logs: Arc<PullLogRepository>,
    pub decision_cache: Arc<DecisionCache>,
    pub auth_validity_cache: AuthValidityCache,
    pub rate_limiters: Arc<RateLimiterRegistry>,
    pub portal_clients: Arc<dashmap::DashMap<String, Arc<PortalAuthClient>>>,
    pub scheduler: Arc<SchedulerRegistry>,
    pub metrics: Arc<Metrics>,
    pub log_buffer: LogRingBuffer,
    pub started_at: Instant,
}

impl AppState {
    pub async fn bootstrap(config: Config, log_buffer: LogRingBuffer) -> anyhow::Result<Self> {
        let db = DbClient::connect(&config.database_url, config.database_auth_token.clone()).await?;

        Ok(Self {
            config: Arc::new(config),
            blocked_ips: Arc::new(BlockedIpRepository::new(db.clone())),
            whitelist: Arc::new(WhitelistRepository::new(db.clone())),
            collection_runs: Arc::new(CollectionRunRepository::new(db.clone())),
            credentials: Arc::new(CredentialRepository::new(db.clone())),
            pull_logs: Arc::new(PullLogRepository::new(db)),
            decision_cache: Arc::new(DecisionCache::new()),
            auth_validity_cache: AuthValidityCache::new(),
            rate_limiters: Arc::new(RateLimiterRegistry::new()),
            portal_clients: Arc::new(dashmap::DashMap::new()),
            scheduler: Arc::new(SchedulerRegistry::new()),
            metrics: Arc::new(Metrics::new()),
            log_buffer,
            started_at: Instant::now(),
        })
    }

    /// Returns the portal client for `source`, creating one bound to the
    /// configured base URL on first use.
    pub fn portal_client(&self, source: &str) -> Arc<PortalAuthClient> {
        if let Some(client) = self.portal_clients.get(source) {
            return client.clone();
        }
        let client = Arc::new(PortalAuthClient::new(self.config.regtech_base_url.clone()));
        self.portal_clients.insert(source.to_string(), client.clone());
        client
    }

    /// Decrypts the stored credential for `service_name` into a usable
    /// plaintext pair, or `None` if no credential row exists.
    pub async fn plaintext_credential(
        &self,
        service_name: &str,
    ) -> Result<Option<blacklist_domain_models::PlaintextCredential>, blacklist_infra_db::DbError> {
        let Some(credential) = self.credentials.get(service_name).await? else {
            return Ok(None);
        };
        let password = vault::decrypt_password(
            &credential.password_ciphertext,
            &self.config.credentials_master_key,
            &self.config.encryption_salt,
        )
        .map_err(|e| blacklist_infra_db::DbError::Mapping(format!("credential decrypt failed: {e}")))?;

        Ok(Some(blacklist_domain_models::PlaintextCredential {
            service_name: credential.service_name,
            username: credential.username,
            password,
        }))
    }
}
