//! Cart actions.
//!
//! # Flow
//!
//! ```text
//! CartForm ──into_request──▶ CartActionRequest
//!                               │
//!                   CartHandler::perform
//!                               │ registry lookup (before any I/O)
//!                               │ identity: override or CartIdentityStore::get
//!                               ▼
//!              CartActionRegistry::dispatch ──▶ CartCommand::execute
//!                               │                     │ StorefrontApi::mutate
//!                               ▼                     ▼
//!                 CartIdentityStore::set ◀── CartActionResult
//! ```
//!
//! User errors from the commerce API are data in [`CartActionResult`];
//! everything in [`CartError`] is a failure to complete the action at all.

mod commands;
mod handler;
mod identity;
mod registry;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use orchard_core::{CartAction, CartFormError, CartId, CartUserError, UnknownActionError};

use crate::shopify::{ShopifyError, StorefrontApi};

pub use commands::DefaultCommand;
pub use handler::{CartHandler, CartOutcome, DEFAULT_MUTATION_TIMEOUT};
pub use identity::{CartIdentityStore, CookieCartIdentity, SessionCartIdentity};
pub use registry::{CartActionRegistry, CartCommand, CommandFuture, FnCommand};

/// User error code returned when a non-creating action has no cart.
pub const CART_ID_REQUIRED: &str = "CART_ID_REQUIRED";

/// Errors that prevent a cart action from completing.
#[derive(Debug, Error)]
pub enum CartError {
    /// No command is registered for the action.
    #[error(transparent)]
    UnknownAction(#[from] UnknownActionError),

    /// The inputs do not fit the action.
    #[error("invalid inputs for {action}: {reason}")]
    InvalidInput {
        /// Action whose inputs were rejected.
        action: CartAction,
        /// What is wrong with them.
        reason: String,
    },

    /// The commerce API could not be reached or answered malformed data.
    #[error(transparent)]
    Api(#[from] ShopifyError),

    /// The action did not complete in time.
    #[error("cart action timed out after {0:?}")]
    Timeout(Duration),

    /// The cart identity could not be read or written.
    #[error("cart identity error: {0}")]
    Identity(String),

    /// The submitted form could not be decoded.
    #[error(transparent)]
    Form(#[from] CartFormError),
}

impl CartError {
    /// Whether the error is caused by the request rather than the server.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownAction(_) | Self::InvalidInput { .. } | Self::Form(_)
        )
    }
}

/// Everything a cart command needs besides its inputs.
#[derive(Clone)]
pub struct CommandContext {
    /// Commerce API.
    pub api: Arc<dyn StorefrontApi>,
    /// Cart to act on; `None` when the buyer has no cart yet.
    pub cart_id: Option<CartId>,
    /// Country context (ISO 3166-1 alpha-2).
    pub country: Option<String>,
    /// Language context (ISO 639-1).
    pub language: Option<String>,
}

impl CommandContext {
    /// A context without a cart or locale.
    #[must_use]
    pub fn new(api: Arc<dyn StorefrontApi>) -> Self {
        Self {
            api,
            cart_id: None,
            country: None,
            language: None,
        }
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("cart_id", &self.cart_id)
            .field("country", &self.country)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

pub(crate) fn cart_id_required(action: CartAction) -> CartUserError {
    CartUserError::new(
        CART_ID_REQUIRED,
        format!("{action} requires an existing cart"),
    )
}
