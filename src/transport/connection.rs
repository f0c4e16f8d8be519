//! Reconnecting connection and event loop.
//!
//! A [`Connection`] is the caller-visible handle for one logical socket. It
//! survives any number of underlying transports: each call to
//! [`Connection::connect`] starts a session task that opens a transport,
//! pumps frames, and reconnects after drops within the attempt budget.
//!
//! # State Machine
//!
//! ```text
//!            connect()
//!               │
//!               ▼
//!         ┌────────────┐   transport open    ┌────────┐
//!    ┌───►│ Connecting │────────────────────►│  Open  │
//!    │    └────────────┘                     └────────┘
//!    │          │ connect failed                 │ transport closed
//!    │          ▼                                ▼
//!    │    ┌──────────────────────────────────────────┐
//!    └────│                 Closed                   │
//!  budget └──────────────────────────────────────────┘
//!  left,       budget exhausted or close(): terminal
//!  after interval
//! ```
//!
//! # Event Loop
//!
//! The session task owns the transport and handles:
//!
//! - Inbound frames, parsed into envelopes and routed to handlers
//! - Outbound frames queued by [`Connection::emit`]
//! - Synthetic `connect`, `disconnect` and `error` events
//! - Fixed-interval reconnect waits, abandoned on shutdown

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::HandlerId;
use crate::protocol::{CONNECT_EVENT, DISCONNECT_EVENT, ERROR_EVENT, Envelope, is_reserved};

use super::connector::{Connector, FrameSink, FrameStream};
use super::endpoint::resolve_socket_url;
use super::events::EventHandlers;
use super::options::ConnectionOptions;


// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A transport is being opened.
    Connecting,
    /// A transport is open; frames flow both ways.
    Open,
    /// No transport. Terminal once the reconnect budget is spent or after
    /// [`Connection::close`].
    Closed,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the session task.
enum ConnectionCommand {
    /// Send a serialized envelope.
    Send(String),
    /// Close the transport and stop reconnecting.
    Shutdown,
}

// ============================================================================
// Shared State
// ============================================================================

/// State and attempt counter, tagged with the owning session.
struct Status {
    state: ConnectionState,
    attempts: u32,
    session: u64,
}

/// State shared between the handle and its session task.
///
/// Every write from a session task is checked against `status.session`, so
/// a superseded or closed session can never change what callers observe.
struct Shared {
    status: Mutex<Status>,
    handlers: EventHandlers,
    url: Mutex<Option<Url>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            status: Mutex::new(Status {
                state: ConnectionState::Connecting,
                attempts: 0,
                session: 0,
            }),
            handlers: EventHandlers::new(),
            url: Mutex::new(None),
        }
    }

    /// Starts a new session, invalidating the previous one.
    fn begin_session(&self) -> u64 {
        let mut status = self.status.lock();
        status.session += 1;
        status.state = ConnectionState::Connecting;
        status.attempts = 0;
        status.session
    }

    /// Invalidates the current session and marks the connection closed.
    fn end_session(&self) -> ConnectionState {
        let mut status = self.status.lock();
        status.session += 1;
        std::mem::replace(&mut status.state, ConnectionState::Closed)
    }

    fn is_current(&self, session: u64) -> bool {
        self.status.lock().session == session
    }

    /// Applies a transition if `session` is still current.
    fn transition(&self, session: u64, next: ConnectionState) -> bool {
        let mut status = self.status.lock();
        if status.session != session {
            return false;
        }
        trace!(from = ?status.state, to = ?next, "Connection state transition");
        status.state = next;
        if next == ConnectionState::Open {
            status.attempts = 0;
        }
        true
    }

    /// Consumes one reconnect attempt if the budget allows.
    ///
    /// Returns the attempt number, or `None` when exhausted or superseded.
    fn take_attempt(&self, session: u64, budget: u32) -> Option<u32> {
        let mut status = self.status.lock();
        if status.session != session || status.attempts >= budget {
            return None;
        }
        status.attempts += 1;
        Some(status.attempts)
    }

    /// Fires `event` if `session` is still current.
    fn dispatch(&self, session: u64, event: &str, data: &Value) -> usize {
        if !self.is_current(session) {
            return 0;
        }
        self.handlers.dispatch(event, data)
    }

    /// Routes one inbound text frame.
    fn handle_frame(&self, session: u64, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Dropping malformed frame");
                return;
            }
        };

        if is_reserved(&envelope.event) {
            warn!(event = %envelope.event, "Dropping inbound frame with reserved event name");
            return;
        }

        if self.dispatch(session, &envelope.event, &envelope.data) == 0 {
            trace!(event = %envelope.event, "No handler for event");
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Handle for one logical persistent socket.
///
/// Cloning is cheap; clones share the same session and handlers. The
/// session is shut down when the last clone is dropped.
///
/// # Example
///
/// ```ignore
/// let connection = Connection::new(Arc::new(WebSocketConnector::new()), options);
/// connection.on("task.updated", |data| println!("task changed: {data}"));
/// connection.connect("/api/ws")?;
/// ```
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    options: ConnectionOptions,
    session: Mutex<Option<Session>>,
}

struct Session {
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    task: JoinHandle<()>,
}

impl Inner {
    fn take_session(&self) -> Option<Session> {
        let session = self.session.lock().take();
        if let Some(ref session) = session {
            let _ = session.command_tx.send(ConnectionCommand::Shutdown);
        }
        session
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shared.end_session();
        if self.take_session().is_some() {
            debug!("Connection dropped, session shut down");
        }
    }
}

impl Connection {
    /// Creates a connection handle. No transport is opened until
    /// [`connect`](Self::connect).
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, options: ConnectionOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared::new()),
                connector,
                options,
                session: Mutex::new(None),
            }),
        }
    }

    /// Opens the connection to `url`.
    ///
    /// The URL is normalized to a socket scheme (see
    /// [`resolve_socket_url`]). Any session already running on this handle is
    /// closed first and the reconnect counter restarts at zero. Must be
    /// called within a tokio runtime.
    ///
    /// Returns the resolved URL.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the URL cannot be resolved
    /// - [`Error::Config`] if the options are invalid
    pub fn connect(&self, url: &str) -> Result<Url> {
        let url = resolve_socket_url(url, self.inner.options.page.as_ref())?;
        self.inner.options.validate()?;

        if self.inner.take_session().is_some() {
            debug!("Closing previous session before reconnecting");
        }

        let session = self.inner.shared.begin_session();
        *self.inner.shared.url.lock() = Some(url.clone());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = SessionTask {
            shared: Arc::clone(&self.inner.shared),
            connector: Arc::clone(&self.inner.connector),
            options: self.inner.options.clone(),
            url: url.clone(),
            session,
            command_rx,
        };

        let handle = tokio::spawn(task.run());
        *self.inner.session.lock() = Some(Session {
            command_tx,
            task: handle,
        });

        info!(url = %url, session, "Connecting");
        Ok(url)
    }

    /// Registers a handler for `event`.
    ///
    /// Handlers for the same event fire in registration order. The reserved
    /// events `connect`, `disconnect` and `error` are fired by the
    /// connection itself.
    pub fn on<F>(&self, event: impl AsRef<str>, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.shared.handlers.on(event.as_ref(), Arc::new(handler))
    }

    /// Removes one handler, or all handlers for `event` when `handler` is
    /// `None`.
    ///
    /// Returns the number of handlers removed.
    pub fn off(&self, event: impl AsRef<str>, handler: Option<HandlerId>) -> usize {
        self.inner.shared.handlers.off(event.as_ref(), handler)
    }

    /// Number of handlers registered for `event`.
    #[inline]
    #[must_use]
    pub fn handler_count(&self, event: impl AsRef<str>) -> usize {
        self.inner.shared.handlers.count(event.as_ref())
    }

    /// Sends `{event, data}` over the transport.
    ///
    /// Only sends while the connection is [`ConnectionState::Open`];
    /// otherwise the frame is dropped with a warning. Returns whether the
    /// frame was queued. Never fails.
    pub fn emit(&self, event: &str, data: impl Serialize) -> bool {
        let state = self.state();
        if state != ConnectionState::Open {
            warn!(event, ?state, "Emit while connection is not open, frame dropped");
            return false;
        }

        let frame = match serde_json::to_value(data)
            .map_err(Error::from)
            .and_then(|data| Envelope::new(event, data).to_frame())
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event, error = %e, "Failed to serialize outbound frame");
                return false;
            }
        };

        match self.inner.session.lock().as_ref() {
            Some(session) => session
                .command_tx
                .send(ConnectionCommand::Send(frame))
                .is_ok(),
            None => false,
        }
    }

    /// Closes the connection.
    ///
    /// The state becomes [`ConnectionState::Closed`] immediately, the
    /// transport is closed, and any pending reconnect is abandoned. Handlers
    /// stay registered for a later [`connect`](Self::connect).
    pub fn close(&self) {
        let previous = self.inner.shared.end_session();
        if self.inner.take_session().is_some() {
            info!(?previous, "Connection closed by caller");
        }
    }

    /// Closes the connection and waits for the session task to finish.
    pub async fn shutdown(&self) {
        self.inner.shared.end_session();
        if let Some(session) = self.inner.take_session() {
            let _ = session.task.await;
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.status.lock().state
    }

    /// Returns `true` if the connection is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Reconnect attempts made since the last successful open.
    #[inline]
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.status.lock().attempts
    }

    /// The resolved URL of the latest [`connect`](Self::connect) call.
    #[must_use]
    pub fn url(&self) -> Option<Url> {
        self.inner.shared.url.lock().clone()
    }

    /// The options this connection was created with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.inner.options
    }
}

// ============================================================================
// SessionTask
// ============================================================================

/// How one open transport ended.
enum PumpExit {
    /// Transport closed; reconnect policy applies.
    Closed,
    /// Caller shut the session down.
    Shutdown,
}

/// Owns the transport for one `connect()` call.
struct SessionTask {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    options: ConnectionOptions,
    url: Url,
    session: u64,
    command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
}

impl SessionTask {
    async fn run(mut self) {
        loop {
            match self.open_transport().await {
                None => break,
                Some(Ok((sink, stream))) => {
                    if !self.shared.transition(self.session, ConnectionState::Open) {
                        break;
                    }
                    info!(url = %self.url, "Connection open");
                    self.shared
                        .dispatch(self.session, CONNECT_EVENT, &Value::Null);

                    if let PumpExit::Shutdown = self.pump(sink, stream).await {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(url = %self.url, error = %e, "Connection attempt failed");
                    self.shared.dispatch(
                        self.session,
                        ERROR_EVENT,
                        &json!({ "message": e.to_string() }),
                    );
                }
            }

            if !self.shared.transition(self.session, ConnectionState::Closed) {
                break;
            }
            self.shared
                .dispatch(self.session, DISCONNECT_EVENT, &Value::Null);

            let budget = self.options.reconnect_attempts;
            let Some(attempt) = self.shared.take_attempt(self.session, budget) else {
                warn!(url = %self.url, budget, "Reconnect budget exhausted, staying closed");
                break;
            };

            let delay = self.options.reconnect_interval;
            info!(
                attempt,
                budget,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect"
            );

            if self.until_shutdown(sleep(delay)).await.is_none() {
                break;
            }
            if !self
                .shared
                .transition(self.session, ConnectionState::Connecting)
            {
                break;
            }
        }

        debug!(session = self.session, "Session task terminated");
    }

    /// Opens one transport, bounded by the connect timeout.
    ///
    /// Returns `None` if the session was shut down meanwhile.
    async fn open_transport(&mut self) -> Option<Result<(FrameSink, FrameStream)>> {
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let limit = self.options.connect_timeout;

        let attempt = async move {
            match timeout(limit, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(Error::connection_timeout(limit.as_millis() as u64)),
            }
        };

        self.until_shutdown(attempt).await
    }

    /// Drives `fut` while watching for shutdown.
    ///
    /// Frames queued while no transport is open are dropped.
    async fn until_shutdown<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);

        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => match command {
                    Some(ConnectionCommand::Send(_)) => {
                        warn!("Dropping frame queued while transport is not open");
                    }
                    Some(ConnectionCommand::Shutdown) | None => return None,
                },

                output = &mut fut => return Some(output),
            }
        }
    }

    /// Pumps frames until the transport closes or the session shuts down.
    async fn pump(&mut self, mut sink: FrameSink, mut stream: FrameStream) -> PumpExit {
        loop {
            tokio::select! {
                biased;

                command = self.command_rx.recv() => match command {
                    Some(ConnectionCommand::Send(frame)) => {
                        if let Err(e) = sink.send(frame).await {
                            warn!(error = %e, "Failed to send frame");
                            self.shared.dispatch(
                                self.session,
                                ERROR_EVENT,
                                &json!({ "message": e.to_string() }),
                            );
                        } else {
                            trace!("Frame sent");
                        }
                    }
                    Some(ConnectionCommand::Shutdown) | None => {
                        close_sink(&mut sink, self.options.connect_timeout).await;
                        return PumpExit::Shutdown;
                    }
                },

                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.shared.handle_frame(self.session, &text),
                    Some(Err(e)) => {
                        warn!(error = %e, "Transport error");
                        self.shared.dispatch(
                            self.session,
                            ERROR_EVENT,
                            &json!({ "message": e.to_string() }),
                        );
                    }
                    None => {
                        debug!(url = %self.url, "Transport closed");
                        return PumpExit::Closed;
                    }
                },
            }
        }
    }
}

/// Closes the outbound half, giving up after `limit`.
async fn close_sink(sink: &mut FrameSink, limit: Duration) {
    match timeout(limit, sink.close()).await {
        Ok(Ok(())) => debug!("Transport closed gracefully"),
        Ok(Err(e)) => debug!(error = %e, "Transport close failed"),
        Err(_) => debug!("Transport close timed out"),
    }
}

// ============================================================================
// Tests
// ============================================================================
