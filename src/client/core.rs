use super::driver::Input;
use super::{ConnectionState, SmartSocketBuilder, SmartSocketOptions, SocketSnapshot};
use crate::messaging::{EventKind, EventNotifier, SocketEvent, Subscription, SubscriptionId};
use crate::transport::TransportFactory;
use crate::types::{Message, Result, SocketError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use url::Url;

/// A WebSocket connection that keeps itself alive.
///
/// `SmartSocket` reconnects with exponential backoff after unexpected closes, buffers
/// outbound messages while disconnected and flushes them once the connection reopens, and
/// detects dead links with an application-level heartbeat. Lifecycle changes are delivered
/// to subscribers as [`SocketEvent`]s.
///
/// Handles are cheap to clone and all drive the same connection. When the last handle is
/// dropped the connection is closed with code 1000.
///
/// # Example
///
/// ```no_run
/// use smart_socket_rs::{EventKind, SmartSocket, SmartSocketOptions, WebSocketFactory};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let socket = SmartSocket::new(
///     "wss://echo.websocket.org",
///     SmartSocketOptions::default(),
///     WebSocketFactory,
/// )?;
///
/// socket.subscribe(EventKind::Message, |event| println!("{:?}", event));
/// socket.send("hello")?;
/// socket.disconnect(None, None)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SmartSocket {
    pub(crate) url: Url,
    pub(crate) inputs: mpsc::UnboundedSender<Input>,
    pub(crate) notifier: EventNotifier,
    pub(crate) snapshot: watch::Receiver<SocketSnapshot>,
}

impl SmartSocket {
    /// Creates a socket and immediately starts connecting.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::UrlParse`] for a malformed URL, [`SocketError::Config`] for
    /// invalid options, or whatever the factory returns if the first transport cannot be
    /// created.
    pub fn new(
        url: impl AsRef<str>,
        options: SmartSocketOptions,
        factory: impl TransportFactory + 'static,
    ) -> Result<Self> {
        SmartSocketBuilder::new(url, options, factory)?.build()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot.borrow().state
    }

    /// Reconnect attempts since the last successful open
    pub fn retries(&self) -> u32 {
        self.snapshot.borrow().retries
    }

    /// Round-trip time of the last answered heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.snapshot.borrow().heartbeat.latency
    }

    pub fn last_ping(&self) -> Option<Instant> {
        self.snapshot.borrow().heartbeat.last_ping
    }

    pub fn last_pong(&self) -> Option<Instant> {
        self.snapshot.borrow().heartbeat.last_pong
    }

    pub fn snapshot(&self) -> SocketSnapshot {
        *self.snapshot.borrow()
    }

    /// Watch receiver that observes every published snapshot
    pub fn state_changes(&self) -> watch::Receiver<SocketSnapshot> {
        self.snapshot.clone()
    }

    /// Registers `handler` for events of `kind`.
    ///
    /// Handlers run on the connection's driver task, in registration order. A panicking
    /// handler is logged and skipped; it does not affect other handlers or the connection.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(kind, handler)
    }

    /// Removes a handler. Returns `false` if it was not registered for `kind`.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(kind, id)
    }

    /// Returns a receiver fed with every event of `kind`
    pub fn listen(&self, kind: EventKind) -> mpsc::UnboundedReceiver<SocketEvent> {
        self.notifier.listen(kind)
    }

    /// Sends a message, or buffers it while the connection is not open.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::Shutdown`] if the driver task has stopped.
    pub fn send(&self, message: impl Into<Message>) -> Result<()> {
        self.dispatch(Input::Send(message.into()))
    }

    /// Opens a new connection unless one is already connecting or open.
    ///
    /// Cancels any pending reconnect and clears a previous [`disconnect`](Self::disconnect).
    ///
    /// # Errors
    ///
    /// Propagates the factory's error if the transport cannot be created; the socket is then
    /// left closed.
    pub async fn connect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Input::Connect(tx))?;
        rx.await.map_err(|_| SocketError::Shutdown)?
    }

    /// Closes the connection and stops reconnecting until [`connect`](Self::connect) is
    /// called again.
    pub fn disconnect(&self, code: Option<u16>, reason: Option<&str>) -> Result<()> {
        self.dispatch(Input::Disconnect {
            code,
            reason: reason.map(str::to_string),
        })
    }

    /// Signals that the network became reachable again
    pub fn network_online(&self) -> Result<()> {
        self.dispatch(Input::Online)
    }

    /// Signals that the network went away. The current transport is force-closed.
    pub fn network_offline(&self) -> Result<()> {
        self.dispatch(Input::Offline)
    }

    fn dispatch(&self, input: Input) -> Result<()> {
        self.inputs.send(input).map_err(|_| SocketError::Shutdown)
    }
}

impl std::fmt::Debug for SmartSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartSocket")
            .field("url", &self.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
