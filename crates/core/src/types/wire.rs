//! Wire messages exchanged with the remote cache proxy.
//!
//! Every operation is one JSON message:
//!
//! ```json
//! {"name": "storefront", "key": "...", "method": "put",
//!  "value": "eyJkYXRhIjp7fX0=", "headers": [["cache-control", "public, max-age=1"]]}
//! ```
//!
//! Byte arrays travel as standard base64 strings. A `match` is answered with
//! `{"value": "...", "status": "HIT"}`; `value` is absent on MISS.

use serde::{Deserialize, Serialize};

use super::entry::CacheStatus;

/// Operation requested from the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMethod {
    /// Look up a key.
    Match,
    /// Store a value.
    Put,
    /// Remove a key.
    Delete,
}

/// Request sent to the cache proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheProxyRequest {
    /// Cache namespace.
    pub name: String,
    /// Cache key within the namespace.
    pub key: String,
    /// Requested operation.
    pub method: CacheMethod,
    /// Value to store (`put` only).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub value: Option<Vec<u8>>,
    /// Headers stored with the value (`put` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<(String, String)>>,
}

impl CacheProxyRequest {
    /// A `match` request.
    #[must_use]
    pub fn lookup(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            method: CacheMethod::Match,
            value: None,
            headers: None,
        }
    }

    /// A `put` request.
    #[must_use]
    pub fn put(
        name: impl Into<String>,
        key: impl Into<String>,
        value: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            method: CacheMethod::Put,
            value: Some(value),
            headers: Some(headers),
        }
    }

    /// A `delete` request.
    #[must_use]
    pub fn delete(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            method: CacheMethod::Delete,
            value: None,
            headers: None,
        }
    }
}

/// Proxy answer to a `match`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheProxyResponse {
    /// Stored value for HIT and STALE.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub value: Option<Vec<u8>>,
    /// Freshness of the stored value.
    pub status: CacheStatus,
}

impl CacheProxyResponse {
    /// A MISS answer.
    #[must_use]
    pub const fn miss() -> Self {
        Self {
            value: None,
            status: CacheStatus::Miss,
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)] // signature required by serde's `with`
    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}
