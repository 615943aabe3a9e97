//! Cache key derivation.
//!
//! Keys are `<namespace>:<sha256>` where the namespace isolates tenants (store
//! domain and API version) and the digest covers everything that changes the
//! result: operation name, query text, and every variable, including locale
//! and buyer context. Object keys are sorted before hashing, so the same
//! variables always produce the same key regardless of insertion order.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::shopify::Operation;

/// Key of a cached subrequest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Use a caller-built key verbatim.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key for a GraphQL operation.
    #[must_use]
    pub fn for_operation(namespace: &str, operation: &Operation) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(operation.operation_name.as_bytes());
        hasher.update([0]);
        hasher.update(operation.query.as_bytes());
        hasher.update([0]);
        write_canonical(&operation.variables, &mut hasher);

        Self(format!("{namespace}:{:x}", hasher.finalize()))
    }

    /// The key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Feed a JSON value into the hasher with object keys in sorted order.
fn write_canonical(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            hasher.update(b"{");
            for (key, value) in entries {
                // Keys are serialized as JSON strings so `"a,b"` cannot collide with two keys
                hasher.update(Value::String(key.clone()).to_string().as_bytes());
                hasher.update(b":");
                write_canonical(value, hasher);
                hasher.update(b",");
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                write_canonical(item, hasher);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        scalar => hasher.update(scalar.to_string().as_bytes()),
    }
}
