//! Proxy error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Request the proxy cannot serve.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A `put` arrived without a value.
    #[error("put for key {0} has no value")]
    MissingValue(String),
}

impl ProxyError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingValue(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(error = %self, "Rejected cache request");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
