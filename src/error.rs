//! Protocol error type shared between the wire and local failure paths.
//!
//! A single [`Error`] struct serves both purposes: it serializes directly as
//! the JSON-RPC 2.0 error object, and it is the error type every local
//! operation returns.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Implementation-reserved codes
pub const CONNECTION_CLOSED: i64 = -32000;
pub const REQUEST_TIMEOUT: i64 = -32001;
pub const REQUEST_CANCELLED: i64 = -32800;

/// A JSON-RPC error: a numeric code, a human-readable message, and an
/// optional structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct Error {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Error {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a structured payload to this error.
    pub fn data(mut self, data: impl Into<Option<Value>>) -> Self {
        self.data = data.into();
        self
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid request")
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal_error() -> Self {
        Self::new(INTERNAL_ERROR, "Internal error")
    }

    /// Wrap an arbitrary error as an internal error, preserving its
    /// rendering in the data payload.
    pub fn into_internal_error(error: impl std::fmt::Display) -> Self {
        Self::internal_error().data(Value::String(error.to_string()))
    }

    /// The request exceeded its deadline. Carries the configured timeout in
    /// milliseconds so the peer-facing reason is actionable.
    pub fn request_timeout(timeout: Duration) -> Self {
        Self::new(REQUEST_TIMEOUT, "Request timed out")
            .data(serde_json::json!({ "timeout": timeout.as_millis() as u64 }))
    }

    pub fn request_cancelled(reason: Option<&str>) -> Self {
        Self::new(
            REQUEST_CANCELLED,
            reason.unwrap_or("Request cancelled"),
        )
    }

    pub fn connection_closed() -> Self {
        Self::new(CONNECTION_CLOSED, "Connection closed")
    }

    pub fn not_connected() -> Self {
        Self::new(CONNECTION_CLOSED, "Not connected")
    }
}
