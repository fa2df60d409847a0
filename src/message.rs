//! JSON-RPC 2.0 envelope types.
//!
//! Incoming frames are classified by field presence: a frame without a
//! `method` is a response, a frame with `method` and `id` is a request, and
//! a frame with only `method` is a notification. The untagged [`Message`]
//! enum encodes that rule through its variant order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::Error;

/// JSON-RPC version string (always "2.0")
pub const JSONRPC_VERSION: &str = "2.0";

/// Reserved notification sent when a requester withdraws interest in a
/// pending request.
pub const CANCELLED_METHOD: &str = "notifications/cancelled";

/// Reserved notification carrying out-of-band progress for a request that
/// asked for it via `_meta.progressToken`.
pub const PROGRESS_METHOD: &str = "notifications/progress";

/// Liveness request answered automatically unless overridden.
pub const PING_METHOD: &str = "ping";

pub(crate) const META_KEY: &str = "_meta";
pub(crate) const PROGRESS_TOKEN_KEY: &str = "progressToken";

/// Request ID - a number or a string, unique per in-flight request from a
/// given sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl RequestId {
    /// The numeric value, if this id is a number. Outbound ids always are;
    /// progress tokens echo them back in either representation.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            RequestId::Number(n) => Some(*n),
            RequestId::String(_) => None,
        }
    }
}

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (request without an id; no reply expected)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 success response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: Value,
}

impl Response {
    pub fn new(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result,
        }
    }
}

/// JSON-RPC 2.0 error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub error: Error,
}

impl ErrorResponse {
    pub fn new(id: impl Into<RequestId>, error: Error) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            error,
        }
    }
}

/// Any JSON-RPC 2.0 frame. Variant order matters: deserialization tries
/// requests before notifications (both carry `method`) and success
/// responses before error responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Response(Response),
    Error(ErrorResponse),
}

/// Parameters of the reserved `notifications/cancelled` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    /// The id of the request being cancelled.
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Progress fields delivered to a registered progress callback, with the
/// routing token already stripped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Parameters of the reserved `notifications/progress` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    /// Token correlating this notification back to the originating request.
    pub progress_token: RequestId,
    #[serde(flatten)]
    pub progress: Progress,
}

/// Merges entries into the `_meta` object of a params payload, creating the
/// payload and/or `_meta` as needed. Non-object params (positional arrays)
/// are returned untouched: there is nowhere to put `_meta`.
pub(crate) fn inject_meta(
    params: Option<Value>,
    entries: impl IntoIterator<Item = (&'static str, Value)>,
) -> Option<Value> {
    let mut map = match params {
        None => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => return Some(other),
    };

    let meta = map
        .entry(META_KEY.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(meta) = meta {
        for (key, value) in entries {
            meta.insert(key.to_string(), value);
        }
    }

    Some(Value::Object(map))
}

/// The `_meta` object of a params payload, if present.
pub(crate) fn meta_object(params: Option<&Value>) -> Option<&Map<String, Value>> {
    params?.as_object()?.get(META_KEY)?.as_object()
}
