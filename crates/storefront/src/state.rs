//! Application state shared across handlers.

use std::sync::Arc;

use crate::cache::SubrequestCache;
use crate::cart::{CartActionRegistry, CartHandler};
use crate::config::StorefrontConfig;
use crate::error::AppError;
use crate::shopify::{CachedStorefront, StorefrontApi, StorefrontClient};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the cart handler, the cached read path and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    cart: CartHandler,
    storefront: CachedStorefront,
}

impl AppState {
    /// Create application state talking to the configured Storefront API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, AppError> {
        let api: Arc<dyn StorefrontApi> = Arc::new(StorefrontClient::new(&config.shopify)?);
        let cache = SubrequestCache::from_config(&config.cache)?;
        Ok(Self::with_api(
            config,
            api,
            cache,
            CartActionRegistry::with_defaults(),
        ))
    }

    /// Create application state around an existing API and cache.
    #[must_use]
    pub fn with_api(
        config: StorefrontConfig,
        api: Arc<dyn StorefrontApi>,
        cache: SubrequestCache,
        registry: CartActionRegistry,
    ) -> Self {
        let cart = CartHandler::new(Arc::new(registry), Arc::clone(&api))
            .with_timeout(config.cart.mutation_timeout);
        let storefront = CachedStorefront::new(api, cache, config.shopify.cache_namespace());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                cart,
                storefront,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cart handler.
    #[must_use]
    pub fn cart(&self) -> &CartHandler {
        &self.inner.cart
    }

    /// Get a reference to the cached Storefront API read path.
    #[must_use]
    pub fn storefront(&self) -> &CachedStorefront {
        &self.inner.storefront
    }

    /// Get a reference to the subrequest cache.
    #[must_use]
    pub fn cache(&self) -> &SubrequestCache {
        self.inner.storefront.cache()
    }
}
