//! The protocol engine.
//!
//! [`Protocol`] implements JSON-RPC 2.0 framing on top of a pluggable
//! [`Transport`], including request/response correlation, notifications,
//! progress routing, cancellation propagation, per-request timeouts, and
//! explicit trace-context propagation.
//!
//! The engine is event-driven and `!Send`: all table mutations happen
//! either on the io task's dispatch path or inside `request()` futures
//! running on the same local executor, serialized behind one mutex per
//! table. Inbound handlers run as spawned futures and never block
//! dispatch.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use futures::{FutureExt as _, StreamExt as _, pin_mut, select_biased};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::Instrument as _;

use crate::abort::{AbortController, AbortSignal};
use crate::capabilities::{AllowAll, CapabilityPolicy};
use crate::error::Error;
use crate::message::{
    CANCELLED_METHOD, CancelledParams, ErrorResponse, Message, Notification, PING_METHOD,
    PROGRESS_METHOD, PROGRESS_TOKEN_KEY, Progress, ProgressParams, Request, RequestId, Response,
    inject_meta, meta_object,
};
use crate::trace::TraceContext;
use crate::transport::{Transport, TransportSender};

/// The default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(60_000);

type RequestHandlerFn =
    Rc<dyn Fn(Request, RequestCx) -> LocalBoxFuture<'static, Result<Value, Error>>>;
type NotificationHandlerFn = Rc<dyn Fn(Notification) -> LocalBoxFuture<'static, Result<(), Error>>>;
type ProgressFn = Rc<dyn Fn(Progress)>;
type ErrorHook = Rc<dyn Fn(Error)>;
type CloseHook = Rc<dyn Fn()>;

/// Engine-level configuration.
pub struct ProtocolOptions {
    /// Whether to restrict emitted requests to those the capability policy
    /// permits. Off by default; the notification-side check always runs, as
    /// it is considered a logic error to mis-declare local capabilities.
    pub enforce_strict_capabilities: bool,

    /// Timeout applied to requests that do not carry their own.
    pub default_timeout: Duration,

    /// The capability checks consulted before traffic leaves this side.
    pub policy: Rc<dyn CapabilityPolicy>,
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            enforce_strict_capabilities: false,
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
            policy: Rc::new(AllowAll),
        }
    }
}

impl fmt::Debug for ProtocolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolOptions")
            .field(
                "enforce_strict_capabilities",
                &self.enforce_strict_capabilities,
            )
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

/// Per-request options.
#[derive(Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub signal: Option<AbortSignal>,
    pub trace: Option<TraceContext>,
    pub on_progress: Option<Box<dyn Fn(Progress)>>,
}

impl RequestOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(Progress) + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }
}

/// Context handed to inbound request handlers.
#[derive(Debug, Clone)]
pub struct RequestCx {
    /// The peer-assigned id of the request being handled.
    pub request_id: RequestId,

    /// Fires if the peer withdraws interest in this request. A handler that
    /// keeps running anyway has its result discarded.
    pub signal: AbortSignal,

    /// The trace context the peer propagated with the request, if any.
    pub trace: Option<TraceContext>,
}

struct PendingEntry {
    respond: oneshot::Sender<Result<Value, Error>>,
}

enum Outbound {
    Message(Message),
    Close,
}

struct Inner {
    options: ProtocolOptions,
    spawn: Box<dyn Fn(LocalBoxFuture<'static, ()>)>,
    ever_connected: AtomicBool,
    next_id: AtomicI64,
    outgoing: Mutex<Option<UnboundedSender<Outbound>>>,
    pending: Mutex<HashMap<i64, PendingEntry>>,
    progress: Mutex<HashMap<i64, ProgressFn>>,
    aborts: Mutex<HashMap<RequestId, AbortController>>,
    request_handlers: Mutex<HashMap<String, RequestHandlerFn>>,
    notification_handlers: Mutex<HashMap<String, NotificationHandlerFn>>,
    fallback_request_handler: Mutex<Option<RequestHandlerFn>>,
    fallback_notification_handler: Mutex<Option<NotificationHandlerFn>>,
    on_error: Mutex<Option<ErrorHook>>,
    on_close: Mutex<Option<CloseHook>>,
}

/// A bidirectional JSON-RPC endpoint bound to at most one transport for its
/// lifetime. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Protocol {
    inner: Rc<Inner>,
}

impl Protocol {
    /// Creates an engine. `spawn` is the executor hook used to run inbound
    /// request and notification handlers; with tokio, pass a closure over
    /// `tokio::task::spawn_local`.
    ///
    /// Handlers for `notifications/cancelled`, `notifications/progress`,
    /// and `ping` are installed here; all three can be replaced through the
    /// normal registration API.
    pub fn new(
        spawn: impl Fn(LocalBoxFuture<'static, ()>) + 'static,
        options: ProtocolOptions,
    ) -> Self {
        let protocol = Self {
            inner: Rc::new(Inner {
                options,
                spawn: Box::new(spawn),
                ever_connected: AtomicBool::new(false),
                next_id: AtomicI64::new(0),
                outgoing: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                progress: Mutex::new(HashMap::new()),
                aborts: Mutex::new(HashMap::new()),
                request_handlers: Mutex::new(HashMap::new()),
                notification_handlers: Mutex::new(HashMap::new()),
                fallback_request_handler: Mutex::new(None),
                fallback_notification_handler: Mutex::new(None),
                on_error: Mutex::new(None),
                on_close: Mutex::new(None),
            }),
        };
        protocol.install_builtins();
        protocol
    }

    /// Binds this engine to `transport` and returns the io task driving it.
    /// The caller spawns or awaits the task; it resolves when the
    /// connection closes. A `Protocol` is single-transport for its
    /// lifetime: repeated calls fail.
    pub fn connect<T: Transport>(
        &self,
        transport: T,
    ) -> Result<LocalBoxFuture<'static, Result<(), Error>>, Error> {
        if self.inner.ever_connected.swap(true, Ordering::SeqCst) {
            return Err(Error::invalid_request()
                .data(Value::String("already connected to a transport".into())));
        }

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded();
        *self.inner.outgoing.lock().unwrap() = Some(outgoing_tx);

        let inner = self.inner.clone();
        Ok(io_task(inner, transport, outgoing_rx).boxed_local())
    }

    /// Whether a transport is currently attached.
    pub fn is_connected(&self) -> bool {
        self.inner.outgoing.lock().unwrap().is_some()
    }

    /// Closes the connection. Pending requests are rejected with
    /// `ConnectionClosed` once the io task winds down.
    pub fn close(&self) -> Result<(), Error> {
        let outgoing = self.inner.outgoing.lock().unwrap().clone();
        match outgoing {
            Some(tx) => tx
                .unbounded_send(Outbound::Close)
                .map_err(|_| Error::connection_closed()),
            None => Ok(()),
        }
    }

    /// Callback for exceptional-but-nonfatal conditions: unknown response
    /// ids, unknown progress tokens, handler failures that cannot be
    /// reported to the peer. Without a hook these are logged at warn level.
    pub fn set_on_error(&self, hook: impl Fn(Error) + 'static) {
        *self.inner.on_error.lock().unwrap() = Some(Rc::new(hook));
    }

    /// Callback invoked when the connection closes for any reason,
    /// including a local `close()`.
    pub fn set_on_close(&self, hook: impl Fn() + 'static) {
        *self.inner.on_close.lock().unwrap() = Some(Rc::new(hook));
    }

    /// Sends a request and waits for the typed response.
    ///
    /// Settles exactly once: with the peer's response or error, with
    /// `RequestTimeout` after the deadline, with the abort reason if the
    /// caller's signal fires first, or with `ConnectionClosed` if the
    /// transport goes away. The timeout and abort paths also send a
    /// best-effort `notifications/cancelled` to the peer.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> Result<R, Error> {
        let span = tracing::info_span!(
            "rpc.request",
            rpc.method = %method,
            otel.kind = "client",
            trace_id = tracing::field::Empty,
        );
        let inner = self.inner.clone();
        let method = method.to_string();

        async move {
            let outgoing = inner
                .outgoing
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(Error::not_connected)?;

            if inner.options.enforce_strict_capabilities {
                inner.options.policy.assert_capability_for_method(&method)?;
            }

            if let Some(signal) = &options.signal {
                if signal.is_aborted() {
                    return Err(signal
                        .reason()
                        .unwrap_or_else(|| Error::request_cancelled(None)));
                }
            }

            let id = inner.next_id.fetch_add(1, Ordering::SeqCst);
            let mut params = params;

            if let Some(on_progress) = options.on_progress {
                inner
                    .progress
                    .lock()
                    .unwrap()
                    .insert(id, Rc::from(on_progress));
                params = inject_meta(params, [(PROGRESS_TOKEN_KEY, Value::from(id))]);
            }

            let trace = options.trace.as_ref().map(TraceContext::child);
            if let Some(trace) = &trace {
                params = inject_meta(params, trace.meta_entries());
                tracing::Span::current().record(
                    "trace_id",
                    tracing::field::display(format_args!("{:032x}", trace.trace_id())),
                );
            }

            let (respond_tx, respond_rx) = oneshot::channel();
            inner
                .pending
                .lock()
                .unwrap()
                .insert(id, PendingEntry { respond: respond_tx });

            let request = Message::Request(Request::new(id, method.as_str(), params));
            if outgoing.unbounded_send(Outbound::Message(request)).is_err() {
                inner.retire(id);
                return Err(Error::connection_closed());
            }

            let timeout = options.timeout.unwrap_or(inner.options.default_timeout);

            let abort_wait = async {
                match options.signal.as_ref() {
                    Some(signal) => {
                        signal.aborted().await;
                        signal
                            .reason()
                            .unwrap_or_else(|| Error::request_cancelled(None))
                    }
                    None => futures::future::pending::<Error>().await,
                }
            }
            .fuse();
            let deadline = tokio::time::sleep(timeout).fuse();
            let respond_rx = respond_rx.fuse();
            pin_mut!(abort_wait, deadline, respond_rx);

            select_biased! {
                reason = abort_wait => {
                    inner.cancel_pending(id, &reason);
                    Err(reason)
                }
                result = respond_rx => match result {
                    Ok(Ok(value)) => serde_json::from_value(value).map_err(|_| {
                        Error::internal_error()
                            .data(Value::String("failed to deserialize response".into()))
                    }),
                    Ok(Err(error)) => Err(error),
                    Err(_) => Err(Error::connection_closed()),
                },
                _ = deadline => {
                    let error = Error::request_timeout(timeout);
                    inner.cancel_pending(id, &error);
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Emits a notification: fire-and-forget, no reply, no bookkeeping.
    pub fn notification(&self, method: &str, params: Option<Value>) -> Result<(), Error> {
        let outgoing = self
            .inner
            .outgoing
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(Error::not_connected)?;

        self.inner
            .options
            .policy
            .assert_notification_capability(method)?;

        outgoing
            .unbounded_send(Outbound::Message(Message::Notification(Notification::new(
                method, params,
            ))))
            .map_err(|_| Error::connection_closed())
    }

    /// Registers a request handler for `method`, replacing any previous
    /// handler for the same method. Params are deserialized with serde; a
    /// mismatch answers the peer with `InvalidParams`.
    pub fn set_request_handler<P, R, F, Fut>(
        &self,
        method: impl Into<String>,
        handler: F,
    ) -> Result<(), Error>
    where
        P: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(P, RequestCx) -> Fut + 'static,
        Fut: Future<Output = Result<R, Error>> + 'static,
    {
        let method = method.into();
        self.inner
            .options
            .policy
            .assert_request_handler_capability(&method)?;
        self.inner
            .request_handlers
            .lock()
            .unwrap()
            .insert(method, erase_request_handler(handler));
        Ok(())
    }

    /// Removes the request handler for `method`. A no-op if none is
    /// registered.
    pub fn remove_request_handler(&self, method: &str) {
        self.inner.request_handlers.lock().unwrap().remove(method);
    }

    /// Asserts that no request handler exists for `method` yet, for layers
    /// that want single-registration semantics instead of
    /// last-registered-wins.
    pub fn assert_can_set_request_handler(&self, method: &str) -> Result<(), Error> {
        if self
            .inner
            .request_handlers
            .lock()
            .unwrap()
            .contains_key(method)
        {
            return Err(Error::invalid_request().data(Value::String(format!(
                "a request handler for {method} already exists"
            ))));
        }
        Ok(())
    }

    /// Registers a notification handler for `method`, replacing any
    /// previous handler for the same method.
    pub fn set_notification_handler<P, F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        P: DeserializeOwned + 'static,
        F: Fn(P) -> Fut + 'static,
        Fut: Future<Output = Result<(), Error>> + 'static,
    {
        self.inner
            .notification_handlers
            .lock()
            .unwrap()
            .insert(method.into(), erase_notification_handler(handler));
    }

    /// Removes the notification handler for `method`. A no-op if none is
    /// registered.
    pub fn remove_notification_handler(&self, method: &str) {
        self.inner
            .notification_handlers
            .lock()
            .unwrap()
            .remove(method);
    }

    /// Handler invoked for requests whose method has no registered handler.
    pub fn set_fallback_request_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Request, RequestCx) -> Fut + 'static,
        Fut: Future<Output = Result<Value, Error>> + 'static,
    {
        let handler = Rc::new(handler);
        let erased: RequestHandlerFn = Rc::new(move |request, cx| {
            let handler = handler.clone();
            async move { handler(request, cx).await }.boxed_local()
        });
        *self.inner.fallback_request_handler.lock().unwrap() = Some(erased);
    }

    /// Handler invoked for notifications whose method has no registered
    /// handler.
    pub fn set_fallback_notification_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Notification) -> Fut + 'static,
        Fut: Future<Output = Result<(), Error>> + 'static,
    {
        let handler = Rc::new(handler);
        let erased: NotificationHandlerFn = Rc::new(move |notification| {
            let handler = handler.clone();
            async move { handler(notification).await }.boxed_local()
        });
        *self.inner.fallback_notification_handler.lock().unwrap() = Some(erased);
    }

    fn install_builtins(&self) {
        let weak = Rc::downgrade(&self.inner);
        self.set_notification_handler(
            CANCELLED_METHOD,
            move |params: CancelledParams| {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        let controller =
                            inner.aborts.lock().unwrap().get(&params.request_id).cloned();
                        if let Some(controller) = controller {
                            controller.abort(Error::request_cancelled(params.reason.as_deref()));
                        }
                    }
                    Ok(())
                }
            },
        );

        let weak = Rc::downgrade(&self.inner);
        self.set_notification_handler(PROGRESS_METHOD, move |params: ProgressParams| {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return Ok(());
                };
                let callback = params
                    .progress_token
                    .as_number()
                    .and_then(|token| inner.progress.lock().unwrap().get(&token).cloned());
                match callback {
                    Some(callback) => callback(params.progress),
                    None => inner.report_error(Error::invalid_request().data(Value::String(
                        format!(
                            "received progress for unknown token: {}",
                            params.progress_token
                        ),
                    ))),
                }
                Ok(())
            }
        });

        // Automatic pong by default.
        self.inner.request_handlers.lock().unwrap().insert(
            PING_METHOD.to_string(),
            erase_request_handler(|_params: Value, _cx: RequestCx| async move {
                Ok(Value::Object(serde_json::Map::new()))
            }),
        );
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("connected", &self.is_connected())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

fn erase_request_handler<P, R, F, Fut>(handler: F) -> RequestHandlerFn
where
    P: DeserializeOwned + 'static,
    R: Serialize + 'static,
    F: Fn(P, RequestCx) -> Fut + 'static,
    Fut: Future<Output = Result<R, Error>> + 'static,
{
    let handler = Rc::new(handler);
    Rc::new(move |request: Request, cx: RequestCx| {
        let handler = handler.clone();
        async move {
            let params = parse_params::<P>(request.params)?;
            let result = handler(params, cx).await?;
            serde_json::to_value(result).map_err(Error::into_internal_error)
        }
        .boxed_local()
    })
}

fn erase_notification_handler<P, F, Fut>(handler: F) -> NotificationHandlerFn
where
    P: DeserializeOwned + 'static,
    F: Fn(P) -> Fut + 'static,
    Fut: Future<Output = Result<(), Error>> + 'static,
{
    let handler = Rc::new(handler);
    Rc::new(move |notification: Notification| {
        let handler = handler.clone();
        async move {
            let params = parse_params::<P>(notification.params)?;
            handler(params).await
        }
        .boxed_local()
    })
}

fn parse_params<P: DeserializeOwned>(params: Option<Value>) -> Result<P, Error> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|error| Error::invalid_params(error.to_string()))
}

async fn io_task<T: Transport>(
    inner: Rc<Inner>,
    transport: T,
    mut outgoing_rx: UnboundedReceiver<Outbound>,
) -> Result<(), Error> {
    let (mut sender, incoming) = match transport.start().await {
        Ok(started) => started,
        Err(error) => {
            inner.handle_close();
            return Err(error);
        }
    };
    let mut incoming = incoming.fuse();

    loop {
        select_biased! {
            item = outgoing_rx.next() => match item {
                Some(Outbound::Message(message)) => {
                    if let Err(error) = sender.send(message).await {
                        inner.report_error(error);
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    sender.close().await.ok();
                    break;
                }
            },
            frame = incoming.next() => match frame {
                Some(Ok(message)) => inner.dispatch(message),
                Some(Err(error)) => inner.report_error(error),
                None => break,
            },
        }
    }

    inner.handle_close();
    Ok(())
}

impl Inner {
    fn dispatch(self: &Rc<Self>, message: Message) {
        match message {
            Message::Response(response) => {
                self.dispatch_response(response.id, Ok(response.result));
            }
            Message::Error(response) => {
                self.dispatch_response(response.id, Err(response.error));
            }
            Message::Request(request) => self.dispatch_request(request),
            Message::Notification(notification) => self.dispatch_notification(notification),
        }
    }

    fn dispatch_response(&self, id: RequestId, result: Result<Value, Error>) {
        let entry = id.as_number().and_then(|id| {
            let entry = self.pending.lock().unwrap().remove(&id);
            if entry.is_some() {
                self.progress.lock().unwrap().remove(&id);
            }
            entry
        });
        match entry {
            // The requester may have stopped waiting; that's fine.
            Some(entry) => {
                entry.respond.send(result).ok();
            }
            None => self.report_error(Error::invalid_request().data(Value::String(format!(
                "received a response for an unknown request id: {id}"
            )))),
        }
    }

    fn dispatch_request(self: &Rc<Self>, request: Request) {
        let handler = {
            let handlers = self.request_handlers.lock().unwrap();
            handlers.get(&request.method).cloned()
        }
        .or_else(|| self.fallback_request_handler.lock().unwrap().clone());

        let Some(handler) = handler else {
            self.send_message(Message::Error(ErrorResponse::new(
                request.id,
                Error::method_not_found(),
            )));
            return;
        };

        let trace = meta_object(request.params.as_ref()).and_then(TraceContext::from_meta);
        let span = tracing::info_span!(
            "rpc.handle",
            rpc.method = %request.method,
            rpc.id = %request.id,
            otel.kind = "server",
            trace_id = tracing::field::Empty,
        );
        if let Some(trace) = &trace {
            span.record(
                "trace_id",
                tracing::field::display(format_args!("{:032x}", trace.trace_id())),
            );
        }

        let controller = AbortController::new();
        let signal = controller.signal();
        self.aborts
            .lock()
            .unwrap()
            .insert(request.id.clone(), controller);

        let cx = RequestCx {
            request_id: request.id.clone(),
            signal: signal.clone(),
            trace,
        };

        let inner = self.clone();
        let id = request.id.clone();
        let future = async move {
            let result = handler(request, cx).await;
            if !signal.is_aborted() {
                let reply = match result {
                    Ok(value) => Message::Response(Response::new(id.clone(), value)),
                    Err(error) => Message::Error(ErrorResponse::new(id.clone(), error)),
                };
                inner.send_message(reply);
            }
            inner.aborts.lock().unwrap().remove(&id);
        }
        .instrument(span)
        .boxed_local();
        (self.spawn)(future);
    }

    fn dispatch_notification(self: &Rc<Self>, notification: Notification) {
        let handler = {
            let handlers = self.notification_handlers.lock().unwrap();
            handlers.get(&notification.method).cloned()
        }
        .or_else(|| self.fallback_notification_handler.lock().unwrap().clone());

        // Ignore notifications not being subscribed to.
        let Some(handler) = handler else { return };

        let inner = self.clone();
        let method = notification.method.clone();
        let future = async move {
            if let Err(error) = handler(notification).await {
                inner.report_error(Error::into_internal_error(format_args!(
                    "uncaught error in notification handler for {method}: {error}"
                )));
            }
        }
        .boxed_local();
        (self.spawn)(future);
    }

    /// Retires a pending outbound request and tells the peer to stop
    /// working on it.
    fn cancel_pending(&self, id: i64, reason: &Error) {
        self.retire(id);
        self.send_message(Message::Notification(Notification::new(
            CANCELLED_METHOD,
            Some(serde_json::json!({
                "requestId": id,
                "reason": reason.to_string(),
            })),
        )));
    }

    fn retire(&self, id: i64) {
        self.pending.lock().unwrap().remove(&id);
        self.progress.lock().unwrap().remove(&id);
    }

    fn send_message(&self, message: Message) {
        let outgoing = self.outgoing.lock().unwrap().clone();
        if let Some(tx) = outgoing {
            if tx.unbounded_send(Outbound::Message(message)).is_err() {
                self.report_error(
                    Error::connection_closed()
                        .data(Value::String("failed to send message".into())),
                );
            }
        }
    }

    fn handle_close(&self) {
        let entries: Vec<PendingEntry> = {
            let mut pending = self.pending.lock().unwrap();
            pending.drain().map(|(_, entry)| entry).collect()
        };
        self.progress.lock().unwrap().clear();
        *self.outgoing.lock().unwrap() = None;

        if let Some(on_close) = self.on_close.lock().unwrap().clone() {
            on_close();
        }

        let error = Error::connection_closed();
        for entry in entries {
            entry.respond.send(Err(error.clone())).ok();
        }
    }

    fn report_error(&self, error: Error) {
        let hook = self.on_error.lock().unwrap().clone();
        match hook {
            Some(hook) => hook(error),
            None => tracing::warn!(%error, "protocol error"),
        }
    }
}
