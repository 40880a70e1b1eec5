//! The `Collector` trait: a small interface any upstream source implements
//! so the scheduler and decision service never need to know about a
//! specific portal's quirks (§9's dynamic-dispatch/plugin-collector
//! redesign note, made concrete). REGTECH is the only implementation
//! today; adding a second source means implementing this trait, not
//! touching the scheduler.

use async_trait::async_trait;
use blacklist_domain_models::{NormalizedRecord, RawRecord};
use chrono::NaiveDate;

use crate::state::AppState;

#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Authenticates against the upstream source using its stored
    /// credential. Returns `Ok(true)` on a successful login, `Ok(false)` on
    /// a rejected login, `Err` on a transport fault.
    async fn authenticate(&self, state: &AppState) -> anyhow::Result<bool>;

    /// Runs the full sweep for a date range (or `None` for all-data), capped
    /// at `max_pages` per strategy, and returns whatever raw records were
    /// collected, unfiltered.
    async fn collect(
        &self,
        state: &AppState,
        range: Option<(NaiveDate, NaiveDate)>,
        max_pages: u32,
    ) -> anyhow::Result<Vec<RawRecord>>;
}

/// The REGTECH-equivalent collector: wraps `blacklist-infra-portal-client`'s
/// auth and sweep modules behind the `Collector` interface.
pub struct RegtechCollector;

#[async_trait]
impl Collector for RegtechCollector {
    fn name(&self) -> &'static str {
        "REGTECH"
    }

    async fn authenticate(&self, state: &AppState) -> anyhow::Result<bool> {
        let Some(credential) = state.plaintext_credential(self.name()).await? else {
            anyhow::bail!("no credential stored for {}", self.name());
        };
        let client = state.portal_client(self.name());
        let ok = client.authenticate(&credential.username, &credential.password).await?;
        if ok {
            state.auth_validity_cache.mark_valid(self.name());
        } else {
            state.auth_validity_cache.invalidate(self.name());
        }
        Ok(ok)
    }

    async fn collect(
        &self,
        state: &AppState,
        range: Option<(NaiveDate, NaiveDate)>,
        max_pages: u32,
    ) -> anyhow::Result<Vec<RawRecord>> {
        let client = state.portal_client(self.name());
        let limiter = state.rate_limiters.get_or_create(self.name());
        let today = chrono::Utc::now().date_naive();
        let user_range = range.map(|(start, end)| blacklist_infra_portal_client::DateRange { start, end });

        let (strategy, records) =
            blacklist_infra_portal_client::sweep(&client, &limiter, today, user_range, max_pages).await?;
        tracing::info!(source = self.name(), ?strategy, count = records.len(), "sweep completed");
        Ok(records)
    }
}

/// Normalizes `raw` under `today` and assigns `source`, matching the
/// pipeline both the scheduler and the ingest API route through (C4).
pub fn normalize_for_source(
    raw: Vec<RawRecord>,
    source: &str,
    today: NaiveDate,
) -> (Vec<NormalizedRecord>, blacklist_domain_models::NormalizationReport) {
    let (mut records, report) = blacklist_domain_normalizer::normalize_batch(raw, today);
    for record in &mut records {
        record.source = source.to_string();
    }
    (records, report)
}

/// Renders a normalization pass as the `details` JSON stored alongside a
/// `CollectionRun` row, so an operator can see why `items_collected` is
/// smaller than the raw page count without re-running the sweep.
pub fn report_to_json(report: &blacklist_domain_models::NormalizationReport) -> serde_json::Value {
    serde_json::json!({
        "accepted": report.accepted,
        "excluded_private_or_invalid": report.excluded_private_or_invalid,
        "expired": report.expired,
        "deduplicated": report.deduplicated,
    })
}
