//! Scheduler (C6): one daemon task per upstream source driving the adaptive
//! tick, plus the manual/force trigger path both the HTTP control surface
//! and the daemon loop funnel through. A per-source `tokio::sync::Mutex`
//! serializes ticks so a manual trigger can never race a scheduled one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::collector::{normalize_for_source, report_to_json, Collector, RegtechCollector};
use crate::state::AppState;

/// Daily full-sweep wall-clock hour (local time is out of scope for a
/// server process; this runs against UTC, matching the teacher's
/// `chronos.rs` use of `tokio::time::interval` over wall-clock ticks rather
/// than a timezone-aware cron).
const DAILY_TICK_HOUR_UTC: u32 = 2;
const DAILY_FULL_SWEEP_MAX_PAGES: u32 = 50;
const FORCE_COLLECTION_MAX_PAGES: u32 = 50;

const FLOOR_INTERVAL_SECS: i64 = 300;
const CEILING_INTERVAL_SECS: i64 = 3_600;
const SHORTEN_FACTOR: f64 = 0.8;
const LENGTHEN_FACTOR: f64 = 1.5;
const LENGTHEN_AFTER_FAILURES: u32 = 3;

/// Per-source adaptive scheduler bookkeeping, exposed verbatim via `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerState {
    pub service_name: String,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub adaptive_interval_seconds: i64,
}

impl SchedulerState {
    fn new(service_name: &str, initial_interval_seconds: i64) -> Self {
        Self {
            service_name: service_name.to_string(),
            total_runs: 0,
            successful_runs: 0,
            failed_runs: 0,
            last_run: None,
            last_success: None,
            last_failure: None,
            consecutive_failures: 0,
            adaptive_interval_seconds: initial_interval_seconds,
        }
    }

    fn record(&mut self, success: bool) {
        let now = Utc::now();
        self.total_runs += 1;
        self.last_run = Some(now);
        if success {
            self.successful_runs += 1;
            self.last_success = Some(now);
            self.consecutive_failures = 0;
            self.adaptive_interval_seconds =
                ((self.adaptive_interval_seconds as f64 * SHORTEN_FACTOR) as i64).max(FLOOR_INTERVAL_SECS);
        } else {
            self.failed_runs += 1;
            self.last_failure = Some(now);
            self.consecutive_failures += 1;
            if self.consecutive_failures >= LENGTHEN_AFTER_FAILURES {
                self.adaptive_interval_seconds = ((self.adaptive_interval_seconds as f64 * LENGTHEN_FACTOR) as i64)
                    .min(CEILING_INTERVAL_SECS);
            }
        }
    }
}

struct SourceSlot {
    state: RwLock<SchedulerState>,
    tick_lock: Mutex<()>,
}

/// Registry of per-source scheduler state and daemon handles, keyed by
/// `service_name`.
pub struct SchedulerRegistry {
    sources: RwLock<HashMap<String, Arc<SourceSlot>>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
        }
    }

    async fn slot(&self, service_name: &str, initial_interval_seconds: i64) -> Arc<SourceSlot> {
        if let Some(slot) = self.sources.read().await.get(service_name) {
            return slot.clone();
        }
        let mut sources = self.sources.write().await;
        sources
            .entry(service_name.to_string())
            .or_insert_with(|| {
                Arc::new(SourceSlot {
                    state: RwLock::new(SchedulerState::new(service_name, initial_interval_seconds)),
                    tick_lock: Mutex::new(()),
                })
            })
            .clone()
    }

    pub async fn snapshot(&self, service_name: &str) -> Option<SchedulerState> {
        let sources = self.sources.read().await;
        match sources.get(service_name) {
            Some(slot) => Some(slot.state.read().await.clone()),
            None => None,
        }
    }

    pub async fn all_snapshots(&self) -> Vec<SchedulerState> {
        let sources = self.sources.read().await;
        let mut out = Vec::with_capacity(sources.len());
        for slot in sources.values() {
            out.push(slot.state.read().await.clone());
        }
        out
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the adaptive-tick daemon for `collector` unless
/// `DISABLE_AUTO_COLLECTION=true`, in which case the registry still answers
/// `/status` from whatever state a manual trigger has recorded.
pub fn spawn_daemon(state: AppState, collector: Arc<dyn Collector>) {
    let service_name = collector.name().to_string();
    let initial_interval = state.config.collection_interval_seconds;

    tokio::spawn(async move {
        state.scheduler.slot(&service_name, initial_interval).await;

        if state.config.disable_auto_collection {
            info!(source = %service_name, "auto collection disabled, scheduler answers /status only");
            return;
        }

        let mut last_daily_sweep: Option<NaiveDate> = None;
        loop {
            use chrono::Timelike;
            let today = Utc::now().date_naive();
            let hour = Utc::now().time().hour();

            let due_for_daily = hour >= DAILY_TICK_HOUR_UTC && last_daily_sweep != Some(today);
            if due_for_daily {
                last_daily_sweep = Some(today);
                info!(source = %service_name, "daily full sweep tick");
                let _ = run_collection(&state, collector.as_ref(), None, DAILY_FULL_SWEEP_MAX_PAGES).await;
            } else {
                let _ = run_collection(&state, collector.as_ref(), None, FORCE_COLLECTION_MAX_PAGES).await;
            }

            let interval_secs = state
                .scheduler
                .snapshot(&service_name)
                .await
                .map(|s| s.adaptive_interval_seconds)
                .unwrap_or(initial_interval)
                .max(1) as u64;
            tokio::time::sleep(std::time::Duration::from_secs(interval_secs)).await;
        }
    });
}

/// Runs one collection pass end to end: authenticate, sweep, normalize,
/// UPSERT, and append a `CollectionRun` ledger row — strictly sequential
/// within a source, serialized against concurrent ticks by the per-source
/// mutex (§5). Used by the daemon loop, the manual trigger, and the forced
/// one-shot path alike.
pub async fn run_collection(
    state: &AppState,
    collector: &dyn Collector,
    range: Option<(NaiveDate, NaiveDate)>,
    max_pages: u32,
) -> anyhow::Result<blacklist_domain_models::CollectionOutcome> {
    let service_name = collector.name();
    let slot = state.scheduler.slot(service_name, state.config.collection_interval_seconds).await;
    let _guard = slot.tick_lock.lock().await;

    let started_at = Utc::now();
    let outcome = execute_collection(state, collector, range, max_pages).await;

    let (success, items_collected, new_count, updated_count, error_message, details) = match &outcome {
        Ok(o) => (
            o.success,
            o.items_collected as i64,
            o.new_count as i64,
            o.updated_count as i64,
            o.error_message.clone(),
            o.details.clone(),
        ),
        Err(e) => (false, 0, 0, 0, Some(e.to_string()), json!({})),
    };

    let finished_at = Utc::now();
    if let Err(e) = state
        .collection_runs
        .record(
            service_name,
            started_at,
            finished_at,
            success,
            items_collected,
            new_count,
            updated_count,
            error_message.clone(),
            details,
        )
        .await
    {
        error!(error = %e, "failed to record collection_history row");
    }

    {
        let mut guard = slot.state.write().await;
        guard.record(success);
    }
    if let Err(e) = state.credentials.record_collection_attempt(service_name).await {
        warn!(error = %e, "failed to record last_collection timestamp");
    }

    outcome.or_else(|e| Ok(blacklist_domain_models::CollectionOutcome::failed(e.to_string())))
}

async fn execute_collection(
    state: &AppState,
    collector: &dyn Collector,
    range: Option<(NaiveDate, NaiveDate)>,
    max_pages: u32,
) -> anyhow::Result<blacklist_domain_models::CollectionOutcome> {
    let authenticated = collector.authenticate(state).await?;
    if !authenticated {
        anyhow::bail!("authentication rejected by upstream");
    }

    let raw_records = collector.collect(state, range, max_pages).await?;
    let today = Utc::now().date_naive();
    let (normalized, report) = normalize_for_source(raw_records, collector.name(), today);

    let upsert_outcome = state.blocked_ips.upsert_batch(&normalized, collector.name()).await?;
    for record in &normalized {
        state.decision_cache.invalidate_ip(&record.ip_address);
    }

    Ok(blacklist_domain_models::CollectionOutcome {
        success: true,
        items_collected: normalized.len() as u64,
        new_count: upsert_outcome.new_count,
        updated_count: upsert_outcome.updated_count,
        error_message: None,
        details: report_to_json(&report),
    })
}

/// Returns the default collector registry: REGTECH today, extendable by
/// adding another `Arc<dyn Collector>` without touching the scheduler.
pub fn default_collectors() -> Vec<Arc<dyn Collector>> {
    vec![Arc::new(RegtechCollector)]
}
