//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//!
//! # Cart (JSON)
//! GET  /cart                   - Current cart, or null
//! POST /cart                   - Perform a cart action (form body)
//! ```

pub mod cart;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create the main routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/cart", get(cart::show).post(cart::perform))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
