//! Errors that fail a proxied round trip

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while proxying a single request.
///
/// None of these are recovered locally: each one ends the round trip and is
/// reported to the caller as an HTTP error. A JSON-RPC `error` member in an
/// upstream reply is payload, not a `ProxyError`.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The inbound body could not be read
    #[error("failed to read request body: {0}")]
    ReadBody(#[source] axum::Error),

    /// The inbound body is neither a JSON-RPC call nor an array of calls
    #[error("malformed JSON-RPC payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    /// The upstream could not be reached or its body could not be received
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] reqwest::Error),

    /// A response selected for rewriting is not a JSON-RPC response or array of responses
    #[error("malformed upstream JSON-RPC response: {0}")]
    MalformedUpstreamResponse(#[source] serde_json::Error),

    /// Rewritten responses could not be serialized again
    #[error("failed to serialize rewritten response: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl ProxyError {
    /// HTTP status reported to the caller for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ReadBody(_) | Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable(_) | Self::MalformedUpstreamResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        warn!("Proxy round trip failed: {}", self);
        (self.status_code(), self.to_string()).into_response()
    }
}
