//! Transport seam between the connection driver and the wire.
//!
//! A [`TransportFactory`] is asked for a fresh [`Transport`] on every connection attempt. The
//! transport reports its lifecycle back through the [`TransportEvents`] handle it was created
//! with; those reports are tagged with the attempt's generation so the driver can discard
//! anything a superseded transport says after it has been replaced.

mod websocket;

pub use websocket::WebSocketFactory;

use crate::client::driver::{Input, InputSender};
use crate::types::{CloseInfo, Frame, Result, SocketError};
use std::sync::atomic::{AtomicU8, Ordering};
use url::Url;

/// Connection phase of a single transport instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// [`ReadyState`] shared between a transport handle and its I/O task
#[derive(Debug)]
pub struct AtomicReadyState(AtomicU8);

impl AtomicReadyState {
    pub fn new(state: ReadyState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: ReadyState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// A single bidirectional connection attempt
pub trait Transport: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// Queues a frame for delivery. Fails with [`SocketError::NotConnected`] unless open.
    fn send(&self, frame: Frame) -> Result<()>;

    /// Starts the closing handshake. The close is reported later through
    /// [`TransportEvents::closed`]; calling this on a closing or closed transport is a no-op.
    fn close(&self, code: Option<u16>, reason: &str);
}

/// Produces a transport for each connection attempt.
///
/// Implemented for any `Fn(&Url, TransportEvents) -> Result<Box<dyn Transport>>`.
pub trait TransportFactory: Send + Sync {
    fn create(&self, url: &Url, events: TransportEvents) -> Result<Box<dyn Transport>>;
}

impl<F> TransportFactory for F
where
    F: Fn(&Url, TransportEvents) -> Result<Box<dyn Transport>> + Send + Sync,
{
    fn create(&self, url: &Url, events: TransportEvents) -> Result<Box<dyn Transport>> {
        self(url, events)
    }
}

#[derive(Debug)]
pub(crate) enum TransportEvent {
    Open,
    Message(Frame),
    Error(SocketError),
    Close(CloseInfo),
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::Close(_) => "close",
        }
    }
}

/// Callback handle a transport uses to report its lifecycle.
///
/// Each method returns `false` once the owning socket has shut down.
#[derive(Clone)]
pub struct TransportEvents {
    generation: u64,
    inputs: InputSender,
}

impl TransportEvents {
    pub(crate) fn new(generation: u64, inputs: InputSender) -> Self {
        Self { generation, inputs }
    }

    pub fn opened(&self) -> bool {
        self.dispatch(TransportEvent::Open)
    }

    pub fn message(&self, frame: Frame) -> bool {
        self.dispatch(TransportEvent::Message(frame))
    }

    pub fn error(&self, error: impl Into<SocketError>) -> bool {
        self.dispatch(TransportEvent::Error(error.into()))
    }

    pub fn closed(&self, info: CloseInfo) -> bool {
        self.dispatch(TransportEvent::Close(info))
    }

    fn dispatch(&self, event: TransportEvent) -> bool {
        match self.inputs.upgrade() {
            Some(tx) => tx
                .send(Input::Transport {
                    generation: self.generation,
                    event,
                })
                .is_ok(),
            None => false,
        }
    }
}

impl std::fmt::Debug for TransportEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEvents")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
