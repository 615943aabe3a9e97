//! Orchard cache proxy.
//!
//! A small HTTP service that lets several storefront instances share one
//! subrequest cache. Each request is one JSON message (see
//! [`orchard_core::CacheProxyRequest`]); freshness is classified with the
//! same rules as the in-process store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod routes;
pub mod store;

use axum::Router;
use axum::http::HeaderName;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use config::ProxyConfig;
pub use store::ProxyState;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The proxy application with tracing and request IDs.
pub fn app(state: ProxyState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    routes::routes()
        .with_state(state)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}
