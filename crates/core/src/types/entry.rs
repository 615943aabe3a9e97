//! Stored cache entries and their freshness classification.
//!
//! The same classification runs in the in-process store and in the remote
//! cache proxy, so a key answers HIT/STALE/MISS identically wherever it lives.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::policy::Freshness;

/// Header carrying the declared directive of a stored value.
pub const CACHE_CONTROL: &str = "cache-control";

/// Source of the current time for freshness decisions.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when advanced. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    /// A clock starting at the current wall time.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Utc::now())))
    }

    /// Move the clock forward by `secs` seconds.
    pub fn advance(&self, secs: i64) {
        if let Ok(mut now) = self.0.lock() {
            *now += TimeDelta::seconds(secs);
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.lock().map_or_else(|_| Utc::now(), |now| *now)
    }
}

/// Freshness of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    /// Within `max-age`.
    Hit,
    /// Past `max-age` but inside the `stale-while-revalidate` window.
    Stale,
    /// Absent or past both windows.
    Miss,
}

impl CacheStatus {
    /// Wire representation (`HIT`, `STALE`, `MISS`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Stale => "STALE",
            Self::Miss => "MISS",
        }
    }
}

/// A value stored by a cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Cache key.
    pub key: String,
    /// Stored bytes.
    pub value: Vec<u8>,
    /// Headers supplied with the value, in order.
    pub stored_headers: Vec<(String, String)>,
    /// When the value was stored.
    pub put_timestamp: DateTime<Utc>,
    /// The `cache-control` directive the value was stored under.
    pub declared_directive: String,
    freshness: Freshness,
}

impl CacheEntry {
    /// Build an entry from a `put`.
    ///
    /// Returns `None` when the headers carry no storable `cache-control`
    /// directive (missing, `no-store`, or without `max-age`).
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        value: Vec<u8>,
        headers: Vec<(String, String)>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let declared_directive = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(CACHE_CONTROL))
            .map(|(_, value)| value.clone())?;
        let freshness = Freshness::parse(&declared_directive)?;

        Some(Self {
            key: key.into(),
            value,
            stored_headers: headers,
            put_timestamp: now,
            declared_directive,
            freshness,
        })
    }

    /// Parsed freshness windows.
    #[must_use]
    pub const fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// Classify this entry at `now`.
    ///
    /// `age <= max-age` is HIT, `age <= max-age + stale-while-revalidate` is
    /// STALE, anything older is MISS. Timestamps ahead of `now` count as HIT.
    #[must_use]
    pub fn classify(&self, now: DateTime<Utc>) -> CacheStatus {
        let age = now.signed_duration_since(self.put_timestamp);
        if age <= seconds(self.freshness.max_age) {
            CacheStatus::Hit
        } else if age <= seconds(self.freshness.usable_for()) {
            CacheStatus::Stale
        } else {
            CacheStatus::Miss
        }
    }

    /// How long a store must keep this entry before evicting it.
    #[must_use]
    pub const fn expires_after(&self) -> Duration {
        Duration::from_secs(self.freshness.usable_for())
    }
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(directive: &str) -> Vec<(String, String)> {
        vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Cache-Control".to_string(), directive.to_string()),
        ]
    }

    fn entry_at(directive: &str, put: DateTime<Utc>) -> CacheEntry {
        CacheEntry::new("k", b"A".to_vec(), headers(directive), put).unwrap()
    }

    #[test]
    fn test_classify_windows() {
        let put = Utc::now();
        let entry = entry_at("public, max-age=100, stale-while-revalidate=100", put);

        assert_eq!(entry.classify(put), CacheStatus::Hit);
        assert_eq!(entry.classify(put + TimeDelta::seconds(50)), CacheStatus::Hit);
        assert_eq!(entry.classify(put + TimeDelta::seconds(150)), CacheStatus::Stale);
        assert_eq!(entry.classify(put + TimeDelta::seconds(500)), CacheStatus::Miss);
    }

    #[test]
    fn test_classify_boundaries_are_inclusive() {
        let put = Utc::now();
        let entry = entry_at("public, max-age=10, stale-while-revalidate=5", put);

        assert_eq!(entry.classify(put + TimeDelta::seconds(10)), CacheStatus::Hit);
        assert_eq!(
            entry.classify(put + TimeDelta::milliseconds(10_001)),
            CacheStatus::Stale
        );
        assert_eq!(entry.classify(put + TimeDelta::seconds(15)), CacheStatus::Stale);
        assert_eq!(
            entry.classify(put + TimeDelta::milliseconds(15_001)),
            CacheStatus::Miss
        );
    }

    #[test]
    fn test_clock_skew_counts_as_hit() {
        let put = Utc::now();
        let entry = entry_at("public, max-age=0", put);
        assert_eq!(entry.classify(put - TimeDelta::seconds(30)), CacheStatus::Hit);
    }

    #[test]
    fn test_entry_keeps_headers_and_directive() {
        let entry = entry_at("public, max-age=60, stale-while-revalidate=30", Utc::now());
        assert_eq!(entry.stored_headers.len(), 2);
        assert_eq!(
            entry.declared_directive,
            "public, max-age=60, stale-while-revalidate=30"
        );
        assert_eq!(entry.expires_after(), Duration::from_secs(90));
    }

    #[test]
    fn test_no_store_is_not_an_entry() {
        assert!(CacheEntry::new("k", vec![], headers("no-store"), Utc::now()).is_none());
        assert!(CacheEntry::new("k", vec![], vec![], Utc::now()).is_none());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&CacheStatus::Stale).unwrap(), "\"STALE\"");
        assert_eq!(CacheStatus::Miss.as_str(), "MISS");
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let entry = entry_at("max-age=10", clock.now());
        let observer = clock.clone();

        clock.advance(20);

        assert_eq!(observer.now(), clock.now());
        assert_eq!(entry.classify(observer.now()), CacheStatus::Miss);
    }
}
