//! Cache policies and the `cache-control` directives they produce.
//!
//! A [`CachePolicy`] is chosen per call site and translated into a directive
//! string with [`build_directive`]. Stores read the directive back with
//! [`Freshness::parse`] to decide how long an entry stays fresh and how long
//! it may be served stale while it is revalidated.
//!
//! # Directive Grammar
//!
//! ```text
//! no-store
//! public, max-age=<int>
//! public, max-age=<int>, stale-while-revalidate=<int>
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `max-age` for [`CacheMode::Short`], in seconds.
pub const SHORT_MAX_AGE: i64 = 1;
/// `stale-while-revalidate` for [`CacheMode::Short`], in seconds.
pub const SHORT_STALE_WHILE_REVALIDATE: i64 = 9;
/// `max-age` for [`CacheMode::Long`], in seconds (one day).
pub const LONG_MAX_AGE: i64 = 86_400;
/// `stale-while-revalidate` for [`CacheMode::Long`], in seconds (two days).
pub const LONG_STALE_WHILE_REVALIDATE: i64 = 172_800;

const NO_STORE: &str = "no-store";

/// Invalid cache policy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A `Custom` policy is missing a required numeric field.
    #[error("custom cache policy is missing {0}")]
    MissingField(&'static str),
    /// A `Custom` policy has a negative duration.
    #[error("custom cache policy has negative {field}: {value}")]
    Negative {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },
}

/// Freshness mode of a cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Never store the result.
    None,
    /// Seconds-scale freshness for volatile data (inventory, prices).
    Short,
    /// Day-scale freshness for rarely changing data (menus, pages).
    Long,
    /// Caller-supplied durations.
    Custom,
}

/// Declarative freshness configuration for one read query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePolicy {
    /// Freshness mode.
    pub mode: CacheMode,
    /// Seconds the entry is fresh (`Custom` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<i64>,
    /// Seconds after `max_age_seconds` the entry may be served stale (`Custom` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_while_revalidate_seconds: Option<i64>,
}

impl CachePolicy {
    /// Policy that never stores.
    #[must_use]
    pub const fn none() -> Self {
        Self::from_mode(CacheMode::None)
    }

    /// Short-lived policy.
    #[must_use]
    pub const fn short() -> Self {
        Self::from_mode(CacheMode::Short)
    }

    /// Long-lived policy.
    #[must_use]
    pub const fn long() -> Self {
        Self::from_mode(CacheMode::Long)
    }

    /// Custom policy with explicit durations in seconds.
    #[must_use]
    pub const fn custom(max_age_seconds: i64, stale_while_revalidate_seconds: i64) -> Self {
        Self {
            mode: CacheMode::Custom,
            max_age_seconds: Some(max_age_seconds),
            stale_while_revalidate_seconds: Some(stale_while_revalidate_seconds),
        }
    }

    const fn from_mode(mode: CacheMode) -> Self {
        Self {
            mode,
            max_age_seconds: None,
            stale_while_revalidate_seconds: None,
        }
    }

    /// Whether results under this policy may be stored at all.
    #[must_use]
    pub const fn is_storable(&self) -> bool {
        !matches!(self.mode, CacheMode::None)
    }

    /// Build the `cache-control` directive for this policy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if a `Custom` policy is missing a duration or
    /// has a negative one.
    pub fn directive(&self) -> Result<String, ValidationError> {
        build_directive(self)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::short()
    }
}

/// Translate a cache policy into its `cache-control` directive.
///
/// # Errors
///
/// Returns [`ValidationError`] if a `Custom` policy is missing a duration or
/// has a negative one.
pub fn build_directive(policy: &CachePolicy) -> Result<String, ValidationError> {
    let (max_age, swr) = match policy.mode {
        CacheMode::None => return Ok(NO_STORE.to_string()),
        CacheMode::Short => (SHORT_MAX_AGE, SHORT_STALE_WHILE_REVALIDATE),
        CacheMode::Long => (LONG_MAX_AGE, LONG_STALE_WHILE_REVALIDATE),
        CacheMode::Custom => (
            require_non_negative("maxAgeSeconds", policy.max_age_seconds)?,
            require_non_negative(
                "staleWhileRevalidateSeconds",
                policy.stale_while_revalidate_seconds,
            )?,
        ),
    };

    Ok(format!(
        "public, max-age={max_age}, stale-while-revalidate={swr}"
    ))
}

fn require_non_negative(field: &'static str, value: Option<i64>) -> Result<i64, ValidationError> {
    match value {
        None => Err(ValidationError::MissingField(field)),
        Some(v) if v < 0 => Err(ValidationError::Negative { field, value: v }),
        Some(v) => Ok(v),
    }
}

/// Freshness windows parsed from a stored directive, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    /// Seconds the entry is fresh.
    pub max_age: u64,
    /// Seconds after `max_age` the entry may be served stale.
    pub stale_while_revalidate: u64,
}

impl Freshness {
    /// Parse a `cache-control` directive.
    ///
    /// Returns `None` when the directive forbids storage (`no-store`) or has no
    /// `max-age`. A missing `stale-while-revalidate` means no grace window.
    #[must_use]
    pub fn parse(directive: &str) -> Option<Self> {
        let mut max_age = None;
        let mut swr = 0;

        for token in directive.split(',').map(str::trim) {
            let (name, value) = token
                .split_once('=')
                .map_or((token, None), |(n, v)| (n.trim(), Some(v.trim())));

            match name.to_ascii_lowercase().as_str() {
                "no-store" => return None,
                "max-age" => max_age = value.and_then(|v| v.parse::<u64>().ok()),
                "stale-while-revalidate" => {
                    swr = value.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
                }
                _ => {}
            }
        }

        max_age.map(|max_age| Self {
            max_age,
            stale_while_revalidate: swr,
        })
    }

    /// Total seconds an entry is usable (fresh plus stale window).
    #[must_use]
    pub const fn usable_for(&self) -> u64 {
        self.max_age.saturating_add(self.stale_while_revalidate)
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "public, max-age={}, stale-while-revalidate={}",
            self.max_age, self.stale_while_revalidate
        )
    }
}
