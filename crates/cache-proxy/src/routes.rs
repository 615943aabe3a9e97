//! Cache proxy HTTP surface.
//!
//! ```text
//! POST /        - One cache operation (`match`, `put` or `delete`)
//! GET  /health  - Health check
//! ```

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::{debug, instrument};

use orchard_core::{CacheMethod, CacheProxyRequest};

use crate::error::ProxyError;
use crate::store::ProxyState;

/// Create the proxy router.
pub fn routes() -> Router<ProxyState> {
    Router::new()
        .route("/", post(handle))
        .route("/health", get(health))
}

/// Serve one cache operation.
#[instrument(
    skip(state, request),
    fields(name = %request.name, key = %request.key, method = ?request.method)
)]
async fn handle(
    State(state): State<ProxyState>,
    Json(request): Json<CacheProxyRequest>,
) -> Result<Response, ProxyError> {
    match request.method {
        CacheMethod::Match => {
            let response = state.lookup(&request.name, &request.key).await;
            debug!(status = response.status.as_str(), "Cache match");
            Ok(Json(response).into_response())
        }
        CacheMethod::Put => {
            let value = request
                .value
                .ok_or_else(|| ProxyError::MissingValue(request.key.clone()))?;
            state
                .store(
                    request.name,
                    request.key,
                    value,
                    request.headers.unwrap_or_default(),
                )
                .await;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        CacheMethod::Delete => {
            state.remove(&request.name, &request.key).await;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use orchard_core::ManualClock;

    fn app(state: ProxyState) -> Router {
        routes().with_state(state)
    }

    fn message(body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(state: &ProxyState, body: Value) -> (StatusCode, Value) {
        let response = app(state.clone()).oneshot(message(&body)).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_put_then_match() {
        let clock = ManualClock::new();
        let state = ProxyState::with_clock(10, Arc::new(clock.clone()));

        let (status, _) = send(
            &state,
            json!({
                "name": "sf", "key": "k", "method": "put", "value": "QQ==",
                "headers": [["cache-control", "public, max-age=1, stale-while-revalidate=9"]],
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) =
            send(&state, json!({"name": "sf", "key": "k", "method": "match"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"value": "QQ==", "status": "HIT"}));

        clock.advance(5);
        let (_, body) = send(&state, json!({"name": "sf", "key": "k", "method": "match"})).await;
        assert_eq!(body["status"], "STALE");

        clock.advance(10);
        let (_, body) = send(&state, json!({"name": "sf", "key": "k", "method": "match"})).await;
        assert_eq!(body, json!({"status": "MISS"}));
    }

    #[tokio::test]
    async fn test_delete() {
        let state = ProxyState::new(10);
        send(
            &state,
            json!({
                "name": "sf", "key": "k", "method": "put", "value": "QQ==",
                "headers": [["cache-control", "public, max-age=60"]],
            }),
        )
        .await;

        let (status, _) = send(&state, json!({"name": "sf", "key": "k", "method": "delete"})).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(&state, json!({"name": "sf", "key": "k", "method": "match"})).await;
        assert_eq!(body["status"], "MISS");
    }

    #[tokio::test]
    async fn test_put_without_value_is_bad_request() {
        let state = ProxyState::new(10);
        let (status, body) = send(&state, json!({"name": "sf", "key": "k", "method": "put"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "put for key k has no value");
    }

    #[tokio::test]
    async fn test_non_storable_put_is_accepted_but_not_stored() {
        let state = ProxyState::new(10);
        let (status, _) = send(
            &state,
            json!({
                "name": "sf", "key": "k", "method": "put", "value": "QQ==",
                "headers": [["cache-control", "no-store"]],
            }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(&state, json!({"name": "sf", "key": "k", "method": "match"})).await;
        assert_eq!(body["status"], "MISS");
    }

    #[tokio::test]
    async fn test_unknown_method_is_rejected() {
        let state = ProxyState::new(10);
        let (status, _) = send(&state, json!({"name": "sf", "key": "k", "method": "purge"})).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(ProxyState::new(1))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
