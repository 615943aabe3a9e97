//! Cart handler: runs one cart action for one buyer.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use orchard_core::{Cart, CartActionRequest, CartActionResult, CartId, UnknownActionError};

use super::identity::CartIdentityStore;
use super::registry::CartActionRegistry;
use super::{CartError, CommandContext};
use crate::shopify::queries::CART_QUERY;
use crate::shopify::{ShopifyError, StorefrontApi};

/// Upper bound on one cart mutation unless configured otherwise.
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of [`CartHandler::perform`].
#[derive(Debug, Clone, PartialEq)]
pub struct CartOutcome {
    /// What the action produced.
    pub result: CartActionResult,
    /// Cart identity written to the identity store, if any.
    pub identity_to_persist: Option<CartId>,
}

/// Runs cart actions against the commerce API.
#[derive(Clone)]
pub struct CartHandler {
    registry: Arc<CartActionRegistry>,
    api: Arc<dyn StorefrontApi>,
    timeout: Duration,
}

impl CartHandler {
    /// Create a handler with the default mutation timeout.
    #[must_use]
    pub fn new(registry: Arc<CartActionRegistry>, api: Arc<dyn StorefrontApi>) -> Self {
        Self {
            registry,
            api,
            timeout: DEFAULT_MUTATION_TIMEOUT,
        }
    }

    /// Set the mutation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The action registry.
    #[must_use]
    pub fn registry(&self) -> &CartActionRegistry {
        &self.registry
    }

    /// Perform one cart action.
    ///
    /// The cart identity is taken from the request override or the identity
    /// store. A returned cart ID (or the prior identity when the API returned
    /// no cart) is written back to the store.
    ///
    /// Whether an action may run without a cart is up to its command: the
    /// built-in commands answer a non-creating action with a
    /// `CART_ID_REQUIRED` user error and no API call, while a registered
    /// replacement receives `cart_id: None` and decides for itself.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownAction`] before any I/O if no command is
    /// registered, [`CartError::Timeout`] if the mutation outlives the
    /// timeout, and propagates API and identity failures. User errors from
    /// the API are part of the returned result.
    #[instrument(skip(self, identity, request), fields(action = %request.action))]
    pub async fn perform(
        &self,
        identity: &dyn CartIdentityStore,
        request: CartActionRequest,
    ) -> Result<CartOutcome, CartError> {
        let action = request.action;
        if !self.registry.contains(action) {
            return Err(UnknownActionError(action.as_str().to_string()).into());
        }

        let prior = match request.cart_id_override {
            Some(id) => Some(id),
            None => identity.get().await?,
        };

        let ctx = CommandContext {
            api: Arc::clone(&self.api),
            cart_id: prior.clone(),
            country: request.country_override,
            language: request.language_override,
        };

        let command = self.registry.dispatch(action, &request.inputs, &ctx)?;
        let result = tokio::time::timeout(self.timeout, command)
            .await
            .map_err(|_| CartError::Timeout(self.timeout))??;

        let identity_to_persist = result
            .cart
            .as_ref()
            .map(|cart| cart.id.clone())
            .filter(|id| !id.is_empty())
            .or(prior);

        if let Some(id) = &identity_to_persist {
            identity.set(id).await?;
            info!(cart_id = %id, errors = result.errors.len(), "Cart action completed");
        }

        Ok(CartOutcome {
            result,
            identity_to_persist,
        })
    }

    /// Fetch the buyer's current cart.
    ///
    /// Returns `None` when there is no identity or the cart no longer exists.
    ///
    /// # Errors
    ///
    /// Propagates API and identity failures.
    #[instrument(skip(self, identity))]
    pub async fn get(
        &self,
        identity: &dyn CartIdentityStore,
        country: Option<&str>,
        language: Option<&str>,
    ) -> Result<Option<Cart>, CartError> {
        let Some(cart_id) = identity.get().await? else {
            return Ok(None);
        };

        let mut variables = Map::new();
        variables.insert("cartId".to_string(), json!(cart_id));
        if let Some(country) = country {
            variables.insert("country".to_string(), json!(country));
        }
        if let Some(language) = language {
            variables.insert("language".to_string(), json!(language));
        }

        let data = tokio::time::timeout(
            self.timeout,
            self.api.query(&CART_QUERY.operation(Value::Object(variables))),
        )
        .await
        .map_err(|_| CartError::Timeout(self.timeout))??;

        match data.get(CART_QUERY.root) {
            None | Some(Value::Null) => Ok(None),
            Some(cart) => Ok(Some(
                serde_json::from_value(cart.clone()).map_err(ShopifyError::from)?,
            )),
        }
    }
}
