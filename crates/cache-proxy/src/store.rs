//! Entries held by the proxy, namespaced by cache name.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use orchard_core::{CacheEntry, CacheProxyResponse, CacheStatus, Clock, SystemClock};

/// `(name, key)`.
type EntryKey = (String, String);

struct EntryExpiry;

impl Expiry<EntryKey, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &EntryKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.expires_after())
    }

    fn expire_after_update(
        &self,
        _key: &EntryKey,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_after())
    }
}

/// Shared proxy state. Cheap to clone.
#[derive(Clone)]
pub struct ProxyState {
    entries: Cache<EntryKey, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl ProxyState {
    /// Create a store holding at most `max_capacity` entries.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self::with_clock(max_capacity, Arc::new(SystemClock))
    }

    /// Create a store that classifies freshness against `clock`.
    #[must_use]
    pub fn with_clock(max_capacity: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Cache::builder()
                .name("cache-proxy")
                .max_capacity(max_capacity)
                .expire_after(EntryExpiry)
                .build(),
            clock,
        }
    }

    /// Look up `key` in namespace `name`.
    ///
    /// Expired entries are invalidated and reported as MISS.
    pub async fn lookup(&self, name: &str, key: &str) -> CacheProxyResponse {
        let entry_key = (name.to_string(), key.to_string());
        let Some(entry) = self.entries.get(&entry_key).await else {
            return CacheProxyResponse::miss();
        };

        match entry.classify(self.clock.now()) {
            CacheStatus::Miss => {
                self.entries.invalidate(&entry_key).await;
                CacheProxyResponse::miss()
            }
            status => CacheProxyResponse {
                value: Some(entry.value),
                status,
            },
        }
    }

    /// Store `value` under `key`. Returns `false` when the headers carry no
    /// storable directive and nothing was stored.
    pub async fn store(
        &self,
        name: String,
        key: String,
        value: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> bool {
        let Some(entry) = CacheEntry::new(key.clone(), value, headers, self.clock.now()) else {
            debug!(%name, %key, "Skipping put without a storable cache-control directive");
            return false;
        };
        self.entries.insert((name, key), entry).await;
        true
    }

    /// Remove `key` from namespace `name`.
    pub async fn remove(&self, name: &str, key: &str) {
        self.entries
            .invalidate(&(name.to_string(), key.to_string()))
            .await;
    }
}
