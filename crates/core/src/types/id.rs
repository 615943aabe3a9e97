//! Newtype ID for cart references.
//!
//! The commerce API addresses carts by global ID
//! (`gid://shopify/Cart/<token>`). Only the trailing token is persisted in the
//! buyer's credential; [`CartId::from_token`] restores the full ID.

use serde::{Deserialize, Serialize};

const CART_GID_PREFIX: &str = "gid://shopify/Cart/";

/// Global ID of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(String);

impl CartId {
    /// Wrap a full global ID as returned by the API.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Restore a cart ID from a persisted token.
    ///
    /// Values that are already global IDs are kept as-is.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        if token.starts_with("gid://") {
            Self(token.to_string())
        } else {
            Self(format!("{CART_GID_PREFIX}{token}"))
        }
    }

    /// The trailing segment of the global ID, suitable for persistence.
    #[must_use]
    pub fn token(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The full global ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ID is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CartId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CartId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for CartId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
