//! In-process cache store backed by `moka`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use orchard_core::{CacheEntry, CacheStatus, Clock, SystemClock};

use super::{CacheError, CacheKey, CacheMatch, CacheStore};

/// Evicts each entry once both of its freshness windows have passed.
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.expires_after())
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.expires_after())
    }
}

/// Cache store that keeps entries in process memory.
pub struct MemoryCacheStore {
    entries: Cache<String, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
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
                .name("subrequest-cache")
                .max_capacity(max_capacity)
                .expire_after(EntryExpiry)
                .build(),
            clock,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn match_key(&self, key: &CacheKey) -> Result<CacheMatch, CacheError> {
        let Some(entry) = self.entries.get(key.as_str()).await else {
            return Ok(CacheMatch::miss());
        };

        match entry.classify(self.clock.now()) {
            CacheStatus::Miss => {
                self.entries.invalidate(key.as_str()).await;
                Ok(CacheMatch::miss())
            }
            status => Ok(CacheMatch {
                value: Some(entry.value),
                status,
            }),
        }
    }

    async fn put(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> Result<(), CacheError> {
        let Some(entry) = CacheEntry::new(key.as_str(), value, headers, self.clock.now()) else {
            debug!(key = %key, "Skipping put without a storable cache-control directive");
            return Ok(());
        };
        self.entries.insert(key.as_str().to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.entries.invalidate(key.as_str()).await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use orchard_core::ManualClock;

    fn headers(directive: &str) -> Vec<(String, String)> {
        vec![("Cache-Control".to_string(), directive.to_string())]
    }

    #[tokio::test]
    async fn test_classifies_against_clock() {
        let clock = ManualClock::new();
        let store = MemoryCacheStore::with_clock(10, Arc::new(clock.clone()));
        let key = CacheKey::new("k");
        store
            .put(&key, b"A".to_vec(), headers("public, max-age=100, stale-while-revalidate=100"))
            .await
            .unwrap();

        clock.advance(50);
        assert_eq!(store.match_key(&key).await.unwrap().status, CacheStatus::Hit);

        clock.advance(100);
        let stale = store.match_key(&key).await.unwrap();
        assert_eq!(stale.status, CacheStatus::Stale);
        assert_eq!(stale.value.as_deref(), Some(&b"A"[..]));

        clock.advance(350);
        assert_eq!(store.match_key(&key).await.unwrap(), CacheMatch::miss());
    }

    #[tokio::test]
    async fn test_put_overwrites_and_resets_age() {
        let clock = ManualClock::new();
        let store = MemoryCacheStore::with_clock(10, Arc::new(clock.clone()));
        let key = CacheKey::new("k");
        store
            .put(&key, b"A".to_vec(), headers("public, max-age=10"))
            .await
            .unwrap();
        clock.advance(20);

        store
            .put(&key, b"B".to_vec(), headers("public, max-age=10"))
            .await
            .unwrap();

        let found = store.match_key(&key).await.unwrap();
        assert_eq!(found.status, CacheStatus::Hit);
        assert_eq!(found.value.as_deref(), Some(&b"B"[..]));
    }

    #[tokio::test]
    async fn test_no_store_put_is_ignored() {
        let store = MemoryCacheStore::new(10);
        let key = CacheKey::new("k");

        store.put(&key, b"A".to_vec(), headers("no-store")).await.unwrap();
        store.put(&key, b"A".to_vec(), vec![]).await.unwrap();

        assert_eq!(store.match_key(&key).await.unwrap(), CacheMatch::miss());
    }

    #[tokio::test]
    async fn test_delete_unknown_key_is_ok() {
        let store = MemoryCacheStore::new(10);
        store.delete(&CacheKey::new("missing")).await.unwrap();
    }
}
