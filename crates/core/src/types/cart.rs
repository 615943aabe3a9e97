//! Cart snapshots and cart action results.
//!
//! A [`Cart`] is opaque beyond its `id`: every other field returned by the
//! commerce API is kept as JSON and handed to the caller untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::CartId;

/// A cart as returned by the commerce API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID.
    pub id: CartId,
    /// All remaining fields (`lines`, `cost`, `buyerIdentity`, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Cart {
    /// A cart carrying only its ID.
    #[must_use]
    pub fn with_id(id: CartId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    /// Look up a top-level field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// `totalQuantity`, when the API returned it.
    #[must_use]
    pub fn total_quantity(&self) -> Option<i64> {
        self.get("totalQuantity").and_then(Value::as_i64)
    }
}

/// Business-rule rejection reported by the commerce API.
///
/// These are data, never thrown: they sit next to a possibly valid cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartUserError {
    /// Error code (e.g. `INVALID`, `MERCHANDISE_NOT_FOUND`).
    #[serde(default)]
    pub code: Option<String>,
    /// Path to the input field that caused the error.
    #[serde(default)]
    pub field: Option<Vec<String>>,
    /// Human-readable error message.
    pub message: String,
}

impl CartUserError {
    /// Build an error with a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            field: None,
            message: message.into(),
        }
    }
}

/// Non-blocking notice from a cart mutation (e.g. reduced quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartWarning {
    /// Warning code.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable warning message.
    pub message: String,
    /// ID of the affected object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Outcome of one cart action.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CartActionResult {
    /// Cart after the mutation, if the API returned one.
    pub cart: Option<Cart>,
    /// User errors reported by the API.
    #[serde(default)]
    pub errors: Vec<CartUserError>,
    /// Warnings reported by the API.
    #[serde(default)]
    pub warnings: Vec<CartWarning>,
}

impl CartActionResult {
    /// A result with only a cart.
    #[must_use]
    pub fn from_cart(cart: Cart) -> Self {
        Self {
            cart: Some(cart),
            ..Self::default()
        }
    }

    /// A result with a single user error and no cart.
    #[must_use]
    pub fn from_error(error: CartUserError) -> Self {
        Self {
            errors: vec![error],
            ..Self::default()
        }
    }

    /// Whether the API reported any user error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
