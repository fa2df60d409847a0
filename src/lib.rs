//! Bidirectional JSON-RPC 2.0 protocol engine.
//!
//! `tandem` implements JSON-RPC framing on top of a pluggable duplex
//! [`Transport`]: request/response correlation, notifications, progress
//! routing, cancellation propagation in both directions, per-request
//! timeouts, capability negotiation, and explicit W3C trace-context
//! propagation through `params._meta`.
//!
//! The engine is event-driven and cooperative: one io task pumps the
//! transport, inbound handlers run as spawned local futures, and any
//! number of outbound requests can be in flight at once, each settled
//! exactly once.
//!
//! ```no_run
//! use tandem::{Protocol, ProtocolOptions, RequestOptions};
//!
//! # async fn run() -> Result<(), tandem::Error> {
//! let protocol = Protocol::new(
//!     |fut| {
//!         tokio::task::spawn_local(fut);
//!     },
//!     ProtocolOptions::default(),
//! );
//!
//! protocol.set_request_handler("echo", |params: serde_json::Value, _cx| async move {
//!     Ok(params)
//! })?;
//!
//! let io_task = protocol.connect(tandem::stdio())?;
//! tokio::task::spawn_local(io_task);
//!
//! let reply: serde_json::Value = protocol
//!     .request(
//!         "echo",
//!         Some(serde_json::json!({ "text": "hi" })),
//!         RequestOptions::default(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod abort;
pub mod capabilities;
pub mod error;
pub mod message;
pub mod observability;
pub mod protocol;
pub mod trace;
pub mod transport;

pub use abort::{AbortController, AbortSignal};
pub use capabilities::{AllowAll, Capabilities, CapabilityPolicy, merge_capabilities};
pub use error::Error;
pub use message::{
    CANCELLED_METHOD, CancelledParams, ErrorResponse, JSONRPC_VERSION, Message, Notification,
    PING_METHOD, PROGRESS_METHOD, Progress, ProgressParams, Request, RequestId, Response,
};
pub use protocol::{
    DEFAULT_REQUEST_TIMEOUT, Protocol, ProtocolOptions, RequestCx, RequestOptions,
};
pub use trace::TraceContext;
pub use transport::{
    ByteStreamSender, ByteStreams, ChannelSender, ChannelTransport, MessageStream, Transport,
    TransportSender, pair, stdio,
};
