//! In-memory TTL caches fronting the hot decision path (C7) and the auth
//! session validity check (C2 supplement). Both are pure read-through
//! caches: a miss means "go ask the database", never "not found".

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Decision cache TTL: 300 seconds, per `DecisionCacheEntry`.
pub const DECISION_CACHE_TTL: Duration = Duration::from_secs(300);

/// Auth session validity cache TTL: 5 minutes, so every ingest/perimeter
/// call doesn't re-hit the credential table.
pub const AUTH_VALIDITY_TTL: Duration = Duration::from_secs(300);

#[derive(Clone, Copy)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A single key-value cache with a fixed TTL per entry. Expired entries are
/// evicted lazily on the next `get`/`set` that touches them, not by a
/// background sweep.
pub struct TtlCache<V> {
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone());
        if hit.is_none() {
            self.entries.remove(key);
        }
        hit
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The decision cache proper: keys are `whitelist:{ip}` / `blacklist:{ip}`,
/// matching the spec's cache key convention so a dump of the underlying map
/// is self-describing during debugging.
pub struct DecisionCache {
    cache: TtlCache<blacklist_domain_models::Decision>,
}

impl DecisionCache {
    pub fn new() -> Self {
        Self {
            cache: TtlCache::new(DECISION_CACHE_TTL),
        }
    }

    pub fn get_whitelist(&self, ip: &str) -> Option<blacklist_domain_models::Decision> {
        self.cache.get(&whitelist_key(ip))
    }

    pub fn set_whitelist(&self, ip: &str, decision: blacklist_domain_models::Decision) {
        self.cache.set(whitelist_key(ip), decision);
    }

    pub fn get_blacklist(&self, ip: &str) -> Option<blacklist_domain_models::Decision> {
        self.cache.get(&blacklist_key(ip))
    }

    pub fn set_blacklist(&self, ip: &str, decision: blacklist_domain_models::Decision) {
        self.cache.set(blacklist_key(ip), decision);
    }

    /// Drops both cache entries for an IP. Called after a whitelist or
    /// blacklist mutation so a stale decision can't outlive the TTL window.
    pub fn invalidate_ip(&self, ip: &str) {
        self.cache.invalidate(&whitelist_key(ip));
        self.cache.invalidate(&blacklist_key(ip));
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new()
    }
}

fn whitelist_key(ip: &str) -> String {
    format!("whitelist:{ip}")
}

fn blacklist_key(ip: &str) -> String {
    format!("blacklist:{ip}")
}

/// Caches "is this credential's session still good" for 5 minutes per
/// service, so the scheduler and ingest paths don't re-authenticate on
/// every call.
#[derive(Clone, Default)]
pub struct AuthValidityCache {
    cache: Arc<TtlCache<bool>>,
}

impl AuthValidityCache {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(TtlCache::new(AUTH_VALIDITY_TTL)),
        }
    }

    pub fn is_valid(&self, service_name: &str) -> Option<bool> {
        self.cache.get(service_name)
    }

    pub fn mark_valid(&self, service_name: &str) {
        self.cache.set(service_name, true);
    }

    pub fn invalidate(&self, service_name: &str) {
        self.cache.invalidate(service_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blacklist_domain_models::Decision;

    #[test]
    fn ttl_cache_round_trips_before_expiry() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(60));
        cache.set("k", 42);
        assert_eq!(cache.get("k"), Some(42));
    }

    #[test]
    fn ttl_cache_expires_after_ttl() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_millis(1));
        cache.set("k", 42);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn decision_cache_keys_whitelist_and_blacklist_separately() {
        let cache = DecisionCache::new();
        cache.set_whitelist("1.2.3.4", Decision::whitelisted());
        cache.set_blacklist("5.6.7.8", Decision::blocked("REGTECH".into(), 3, "malware".into(), true));

        assert!(cache.get_whitelist("1.2.3.4").is_some());
        assert!(cache.get_blacklist("1.2.3.4").is_none());
        assert!(cache.get_blacklist("5.6.7.8").is_some());
    }

    #[test]
    fn invalidate_ip_clears_both_namespaces() {
        let cache = DecisionCache::new();
        cache.set_whitelist("1.2.3.4", Decision::whitelisted());
        cache.set_blacklist("1.2.3.4", Decision::blocked("REGTECH".into(), 1, "x".into(), true));
        cache.invalidate_ip("1.2.3.4");
        assert!(cache.get_whitelist("1.2.3.4").is_none());
        assert!(cache.get_blacklist("1.2.3.4").is_none());
    }

    #[test]
    fn auth_validity_cache_tracks_per_service() {
        let cache = AuthValidityCache::new();
        assert_eq!(cache.is_valid("REGTECH"), None);
        cache.mark_valid("REGTECH");
        assert_eq!(cache.is_valid("REGTECH"), Some(true));
        cache.invalidate("REGTECH");
        assert_eq!(cache.is_valid("REGTECH"), None);
    }
}
