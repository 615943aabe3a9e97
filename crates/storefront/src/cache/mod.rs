//! Subrequest cache with stale-while-revalidate semantics.
//!
//! # Architecture
//!
//! - [`SubrequestCache`] is the facade every read path goes through. It is
//!   constructed once per process and cloned (cheaply, via `Arc`) into
//!   whatever needs it; there is no global instance.
//! - [`CacheStore`] is the storage seam: [`MemoryCacheStore`] keeps entries
//!   in-process with `moka`, [`ProxyCacheStore`] delegates every operation to
//!   a remote cache proxy over HTTP.
//! - Freshness classification (HIT/STALE/MISS) lives with the stored entry in
//!   `orchard_core`, so both stores answer identically.
//!
//! # Revalidation
//!
//! A STALE lookup returns the stored value immediately and spawns a detached
//! task that re-runs the fetch and stores the fresh result. The triggering
//! request never waits on it and never sees its outcome; failures are logged.
//! At most one revalidation per key is in flight in this process.

mod key;
mod memory;
mod proxy;

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use orchard_core::{CACHE_CONTROL, CachePolicy, CacheStatus, ValidationError};

use crate::config::CacheConfig;

pub use key::CacheKey;
pub use memory::MemoryCacheStore;
pub use proxy::ProxyCacheStore;

/// Errors from the cache layer.
///
/// Proxy failures are always surfaced; they are never reported as a MISS.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The proxy could not be reached.
    #[error("cache proxy transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The proxy answered with a non-success status.
    #[error("cache proxy returned {status}: {body}")]
    Proxy {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The proxy answered with something that violates the wire protocol.
    #[error("cache proxy protocol error: {0}")]
    Protocol(String),

    /// A proxy message could not be decoded.
    #[error("cache decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The cache policy is invalid.
    #[error("invalid cache policy: {0}")]
    Validation(#[from] ValidationError),
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMatch {
    /// Stored value (HIT and STALE only).
    pub value: Option<Vec<u8>>,
    /// Freshness of the stored value.
    pub status: CacheStatus,
}

impl CacheMatch {
    /// A MISS.
    #[must_use]
    pub const fn miss() -> Self {
        Self {
            value: None,
            status: CacheStatus::Miss,
        }
    }
}

/// Storage backend of the subrequest cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short name for tracing (`memory`, `proxy`).
    fn name(&self) -> &'static str;

    /// Look up a key and classify its freshness.
    async fn match_key(&self, key: &CacheKey) -> Result<CacheMatch, CacheError>;

    /// Store a value with its headers; the `cache-control` header declares
    /// its freshness. Values without a storable directive are dropped.
    async fn put(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> Result<(), CacheError>;

    /// Remove a key.
    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError>;
}

/// Stale-while-revalidate cache facade.
#[derive(Clone)]
pub struct SubrequestCache {
    inner: Arc<SubrequestCacheInner>,
}

struct SubrequestCacheInner {
    store: Arc<dyn CacheStore>,
    revalidating: Mutex<HashSet<String>>,
}

impl SubrequestCache {
    /// Create a cache over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            inner: Arc::new(SubrequestCacheInner {
                store,
                revalidating: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Create an in-process cache.
    #[must_use]
    pub fn in_memory(max_capacity: u64) -> Self {
        Self::new(Arc::new(MemoryCacheStore::new(max_capacity)))
    }

    /// Create the cache described by configuration: the remote proxy when a
    /// proxy URL is set, otherwise an in-process store.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy HTTP client cannot be built.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let store: Arc<dyn CacheStore> = match &config.proxy_url {
            Some(url) => Arc::new(ProxyCacheStore::new(
                url.clone(),
                config.name.clone(),
                config.proxy_timeout,
            )?),
            None => Arc::new(MemoryCacheStore::new(config.max_capacity)),
        };
        Ok(Self::new(store))
    }

    /// Name of the underlying store.
    #[must_use]
    pub fn store_name(&self) -> &'static str {
        self.inner.store.name()
    }

    /// Look up a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn match_key(&self, key: &CacheKey) -> Result<CacheMatch, CacheError> {
        self.inner.store.match_key(key).await
    }

    /// Store a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn put(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> Result<(), CacheError> {
        self.inner.store.put(key, value, headers).await
    }

    /// Remove a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.inner.store.delete(key).await
    }

    /// Number of background revalidations currently running.
    #[must_use]
    pub fn revalidations_in_flight(&self) -> usize {
        self.inner.revalidating.lock().map_or(0, |set| set.len())
    }

    /// Serve `key` from cache under `policy`, calling `fetcher` when needed.
    ///
    /// - `None` policy: always fetch, never store.
    /// - HIT: stored value.
    /// - STALE: stored value now, revalidation in the background.
    /// - MISS: fetch, store, return the fresh value.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error, or a [`CacheError`] (converted into `E`)
    /// when the policy is invalid or the store fails.
    #[instrument(skip(self, policy, fetcher), fields(key = %key, store = self.store_name()))]
    pub async fn fetch<F, Fut, E>(
        &self,
        key: &CacheKey,
        policy: &CachePolicy,
        fetcher: F,
    ) -> Result<Vec<u8>, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, E>> + Send + 'static,
        E: From<CacheError> + Display + Send + 'static,
    {
        let directive = policy.directive().map_err(CacheError::from)?;
        if !policy.is_storable() {
            return fetcher().await;
        }

        let found = self.match_key(key).await?;
        match (found.status, found.value) {
            (CacheStatus::Hit, Some(value)) => {
                debug!("Cache hit");
                Ok(value)
            }
            (CacheStatus::Stale, Some(value)) => {
                debug!("Cache stale, revalidating in background");
                self.spawn_revalidation(key.clone(), directive, fetcher);
                Ok(value)
            }
            _ => {
                debug!("Cache miss");
                let value = fetcher().await?;
                self.put(key, value.clone(), cache_headers(&directive))
                    .await?;
                Ok(value)
            }
        }
    }

    /// Spawn a detached task that refreshes `key`.
    fn spawn_revalidation<F, Fut, E>(&self, key: CacheKey, directive: String, fetcher: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, E>> + Send + 'static,
        E: From<CacheError> + Display + Send + 'static,
    {
        let Ok(mut in_flight) = self.inner.revalidating.lock() else {
            warn!(key = %key, "Revalidation set poisoned, skipping revalidation");
            return;
        };
        if !in_flight.insert(key.as_str().to_string()) {
            debug!(key = %key, "Revalidation already in flight");
            return;
        }
        drop(in_flight);

        let cache = self.clone();
        tokio::spawn(async move {
            let _in_flight = InFlight {
                cache: cache.clone(),
                key: key.as_str().to_string(),
            };

            let outcome = match fetcher().await {
                Ok(value) => cache
                    .put(&key, value, cache_headers(&directive))
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(()) => debug!(key = %key, "Revalidated cache entry"),
                Err(error) => warn!(key = %key, %error, "Background revalidation failed"),
            }
        });
    }
}

/// Clears a key from the in-flight set when the revalidation task ends,
/// including when the fetcher panics.
struct InFlight {
    cache: SubrequestCache,
    key: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut in_flight = match self.cache.inner.revalidating.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        in_flight.remove(&self.key);
    }
}

/// Headers stored alongside a fetched value.
fn cache_headers(directive: &str) -> Vec<(String, String)> {
    vec![
        ("content-type".to_string(), "application/json".to_string()),
        (CACHE_CONTROL.to_string(), directive.to_string()),
    ]
}
