//! Shopify Storefront API access.
//!
//! # Architecture
//!
//! - [`StorefrontApi`] is the injected query/mutate interface. Cart commands
//!   and the cached read path only ever see this trait, so tests substitute
//!   fakes without any HTTP.
//! - [`StorefrontClient`] implements it over `reqwest`.
//! - [`CachedStorefront`] is the read path: every query goes through the
//!   [`SubrequestCache`](crate::cache::SubrequestCache) under a caller-chosen
//!   [`CachePolicy`](orchard_core::CachePolicy).
//! - Operations are `graphql_client` request bodies with untyped variables;
//!   responses are the raw `data` member as JSON.
//!
//! # Example
//!
//! ```rust,ignore
//! use orchard_core::CachePolicy;
//! use orchard_storefront::shopify::{CachedStorefront, operation};
//!
//! let products = storefront
//!     .query(
//!         &operation("Products", PRODUCTS_QUERY, json!({"first": 10, "country": "CA"})),
//!         &CachePolicy::short(),
//!     )
//!     .await?;
//! ```

mod storefront;

pub use storefront::queries;
pub use storefront::{CachedStorefront, StorefrontClient};

use async_trait::async_trait;
use graphql_client::QueryBody;
use serde_json::Value;
use thiserror::Error;

use crate::cache::CacheError;

/// A GraphQL request: operation name, document and variables.
pub type Operation = QueryBody<Value>;

/// Build an [`Operation`].
#[must_use]
pub fn operation(name: &'static str, query: &'static str, variables: Value) -> Operation {
    QueryBody {
        variables,
        query,
        operation_name: name,
    }
}

/// Query/mutate interface to the commerce API.
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    /// Run a read query and return its `data` member.
    async fn query(&self, operation: &Operation) -> Result<Value, ShopifyError>;

    /// Run a mutation and return its `data` member.
    async fn mutate(&self, operation: &Operation) -> Result<Value, ShopifyError>;
}

/// Errors that can occur when interacting with the Storefront API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The response lacks the expected root field.
    #[error("Response is missing the {0} payload")]
    MissingPayload(String),

    /// The subrequest cache failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// A GraphQL error returned by the Shopify API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<Value>,
}

impl GraphQLError {
    /// An error with only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: vec![],
            path: vec![],
        }
    }
}

impl From<graphql_client::Error> for GraphQLError {
    fn from(e: graphql_client::Error) -> Self {
        Self {
            message: e.message,
            locations: e.locations.map_or_else(Vec::new, |locs| {
                locs.into_iter()
                    .map(|l| GraphQLErrorLocation {
                        line: i64::from(l.line),
                        column: i64::from(l.column),
                    })
                    .collect()
            }),
            path: e.path.map_or_else(Vec::new, |p| {
                p.into_iter()
                    .map(|fragment| match fragment {
                        graphql_client::PathFragment::Key(s) => Value::String(s),
                        graphql_client::PathFragment::Index(i) => Value::Number(i.into()),
                    })
                    .collect()
            }),
        }
    }
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
