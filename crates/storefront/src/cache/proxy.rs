//! Cache store that delegates to a remote cache proxy.
//!
//! Every operation is a single `POST` of a [`CacheProxyRequest`] to the proxy
//! endpoint. Transport failures and non-success answers are errors; they are
//! never reported as a MISS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;
use url::Url;

use orchard_core::{CacheProxyRequest, CacheProxyResponse, CacheStatus};

use super::{CacheError, CacheKey, CacheMatch, CacheStore};

/// Longest proxy error body kept in [`CacheError::Proxy`].
const MAX_ERROR_BODY: usize = 512;

/// Cache store backed by a remote cache proxy.
#[derive(Clone)]
pub struct ProxyCacheStore {
    client: Client,
    endpoint: Url,
    name: String,
}

impl std::fmt::Debug for ProxyCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCacheStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ProxyCacheStore {
    /// Create a store talking to `endpoint` under cache namespace `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: Url,
        name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CacheError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            name: name.into(),
        })
    }

    async fn send(&self, request: &CacheProxyRequest) -> Result<reqwest::Response, CacheError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(CacheError::Proxy {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CacheStore for ProxyCacheStore {
    fn name(&self) -> &'static str {
        "proxy"
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn match_key(&self, key: &CacheKey) -> Result<CacheMatch, CacheError> {
        let request = CacheProxyRequest::lookup(&self.name, key.as_str());
        let body = self.send(&request).await?.bytes().await?;
        let answer: CacheProxyResponse = serde_json::from_slice(&body)?;

        match (answer.status, answer.value) {
            (CacheStatus::Miss, _) => Ok(CacheMatch::miss()),
            (status, Some(value)) => Ok(CacheMatch {
                value: Some(value),
                status,
            }),
            (status, None) => Err(CacheError::Protocol(format!(
                "{} answer without a value",
                status.as_str()
            ))),
        }
    }

    #[instrument(skip(self, value, headers), fields(key = %key, bytes = value.len()))]
    async fn put(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        headers: Vec<(String, String)>,
    ) -> Result<(), CacheError> {
        let request = CacheProxyRequest::put(&self.name, key.as_str(), value, headers);
        self.send(&request).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let request = CacheProxyRequest::delete(&self.name, key.as_str());
        self.send(&request).await?;
        Ok(())
    }
}
