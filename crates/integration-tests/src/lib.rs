//! Integration tests for the Orchard storefront data layer.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p orchard-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_flow` - Cart actions end to end through the HTTP routes
//! - `cache_proxy` - Subrequest cache against a real cache proxy socket
//!
//! Nothing here talks to Shopify: the commerce API is replaced by
//! [`FakeStorefront`], which records every operation.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use serde_json::{Value, json};

use orchard_storefront::config::{ConfigError, StorefrontConfig};
use orchard_storefront::shopify::{Operation, ShopifyError, StorefrontApi};

type Responder = dyn Fn(&Operation) -> Result<Value, ShopifyError> + Send + Sync;

/// Commerce API fake that records every call.
pub struct FakeStorefront {
    calls: Mutex<Vec<(String, Value)>>,
    respond: Box<Responder>,
}

impl FakeStorefront {
    /// Answers every operation with the cart `gid://shopify/Cart/<token>`.
    #[must_use]
    pub fn with_cart(token: &'static str) -> Self {
        Self::responding(move |op| {
            let cart = json!({
                "id": format!("gid://shopify/Cart/{token}"),
                "totalQuantity": 1,
                "lines": {"nodes": []},
            });
            if op.operation_name == "CartQuery" {
                return Ok(json!({ "cart": cart }));
            }
            Ok(json!({
                (root_field(op.operation_name)): {
                    "cart": cart,
                    "userErrors": [],
                    "warnings": [],
                }
            }))
        })
    }

    /// Answers with `respond`.
    pub fn responding(
        respond: impl Fn(&Operation) -> Result<Value, ShopifyError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Operations seen so far, as `(operation name, variables)`.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Number of operations seen so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().map_or(0, |calls| calls.len())
    }

    fn record(&self, operation: &Operation) -> Result<Value, ShopifyError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((operation.operation_name.to_string(), operation.variables.clone()));
        }
        (self.respond)(operation)
    }
}

#[async_trait]
impl StorefrontApi for FakeStorefront {
    async fn query(&self, operation: &Operation) -> Result<Value, ShopifyError> {
        self.record(operation)
    }

    async fn mutate(&self, operation: &Operation) -> Result<Value, ShopifyError> {
        self.record(operation)
    }
}

/// Payload root of a mutation: `CartLinesAdd` -> `cartLinesAdd`.
#[must_use]
pub fn root_field(operation_name: &str) -> String {
    let mut chars = operation_name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_lowercase().to_string() + chars.as_str()
    })
}

/// Storefront configuration with test credentials plus `overrides`.
///
/// # Errors
///
/// Returns an error if an override is invalid.
pub fn storefront_config(overrides: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
    let mut vars: HashMap<String, String> = [
        ("STOREFRONT_BASE_URL", "http://localhost:3000"),
        ("SHOPIFY_STORE", "orchard-test.myshopify.com"),
        ("SHOPIFY_STOREFRONT_PRIVATE_TOKEN", "shpat_Z7x2Lq9Vb4Nm8Kc1Rt6Yw3Pe5Uo0Ia"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in overrides {
        vars.insert((*key).to_string(), (*value).to_string());
    }
    StorefrontConfig::from_source(|key| vars.get(key).cloned())
}

/// Serve `app` on an ephemeral local port.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn spawn(app: Router) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            tracing::error!(%addr, %error, "Test server stopped");
        }
    });
    Ok(addr)
}
