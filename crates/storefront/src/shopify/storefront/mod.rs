//! Shopify Storefront API client implementation.
//!
//! Uses `reqwest` 0.13 for HTTP and `graphql_client` request/response
//! envelopes. Reads go through [`CachedStorefront`]; mutations are never cached.

pub mod queries;

use std::sync::Arc;

use graphql_client::Response;
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::instrument;
use url::Url;

use orchard_core::CachePolicy;

use crate::cache::{CacheKey, SubrequestCache};
use crate::config::ShopifyStorefrontConfig;
use crate::shopify::{GraphQLError, Operation, ShopifyError, StorefrontApi};

// =============================================================================
// StorefrontClient
// =============================================================================

/// Client for the Shopify Storefront API.
#[derive(Clone)]
pub struct StorefrontClient {
    inner: Arc<StorefrontClientInner>,
}

struct StorefrontClientInner {
    client: reqwest::Client,
    endpoint: Url,
    access_token: String,
}

impl StorefrontClient {
    /// Create a new Storefront API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ShopifyStorefrontConfig) -> Result<Self, ShopifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(StorefrontClientInner {
                client,
                endpoint: config.endpoint.clone(),
                access_token: config.storefront_private_token.expose_secret().to_string(),
            }),
        })
    }

    /// Execute a GraphQL operation and return its `data` member.
    async fn execute(&self, operation: &Operation) -> Result<Value, ShopifyError> {
        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            // Private access tokens use a different header than public tokens
            // See: https://shopify.dev/docs/storefronts/headless/building-with-the-storefront-api/getting-started
            .header(
                "Shopify-Storefront-Private-Token",
                &self.inner.access_token,
            )
            .header("Content-Type", "application/json")
            .json(operation)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&response_text, 500),
                "Shopify API returned non-success status"
            );
            return Err(ShopifyError::GraphQL(vec![GraphQLError::message(format!(
                "HTTP {status}: {}",
                truncate(&response_text, 200)
            ))]));
        }

        let response: Response<Value> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %truncate(&response_text, 500),
                    "Failed to parse Shopify GraphQL response"
                );
                return Err(ShopifyError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            tracing::debug!(errors = ?errors, "GraphQL errors in response");
            return Err(ShopifyError::GraphQL(
                errors.into_iter().map(GraphQLError::from).collect(),
            ));
        }

        response
            .data
            .filter(|data| !data.is_null())
            .ok_or_else(|| {
                tracing::error!(
                    body = %truncate(&response_text, 500),
                    "Shopify GraphQL response has no data and no errors"
                );
                ShopifyError::GraphQL(vec![GraphQLError::message("No data in response")])
            })
    }
}

#[async_trait::async_trait]
impl StorefrontApi for StorefrontClient {
    #[instrument(skip(self, operation), fields(operation = operation.operation_name))]
    async fn query(&self, operation: &Operation) -> Result<Value, ShopifyError> {
        self.execute(operation).await
    }

    #[instrument(skip(self, operation), fields(operation = operation.operation_name))]
    async fn mutate(&self, operation: &Operation) -> Result<Value, ShopifyError> {
        self.execute(operation).await
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// =============================================================================
// CachedStorefront
// =============================================================================

/// Read path through the subrequest cache.
#[derive(Clone)]
pub struct CachedStorefront {
    api: Arc<dyn StorefrontApi>,
    cache: SubrequestCache,
    namespace: String,
}

impl CachedStorefront {
    /// Create a read path over `api`, keying entries under `namespace`
    /// (store domain and API version).
    #[must_use]
    pub fn new(
        api: Arc<dyn StorefrontApi>,
        cache: SubrequestCache,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            api,
            cache,
            namespace: namespace.into(),
        }
    }

    /// The underlying API.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn StorefrontApi> {
        &self.api
    }

    /// The subrequest cache.
    #[must_use]
    pub const fn cache(&self) -> &SubrequestCache {
        &self.cache
    }

    /// Run a read query under `policy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails and no usable cached value exists,
    /// or if the cache store fails.
    #[instrument(
        skip(self, operation, policy),
        fields(operation = operation.operation_name, mode = ?policy.mode)
    )]
    pub async fn query(
        &self,
        operation: &Operation,
        policy: &CachePolicy,
    ) -> Result<Value, ShopifyError> {
        let key = CacheKey::for_operation(&self.namespace, operation);
        let api = Arc::clone(&self.api);
        let operation = Arc::new(crate::shopify::operation(
            operation.operation_name,
            operation.query,
            operation.variables.clone(),
        ));

        let bytes = self
            .cache
            .fetch(&key, policy, move || {
                let api = Arc::clone(&api);
                let operation = Arc::clone(&operation);
                async move {
                    let data = api.query(&operation).await?;
                    Ok::<_, ShopifyError>(serde_json::to_vec(&data)?)
                }
            })
            .await?;

        Ok(serde_json::from_slice(&bytes)?)
    }
}
