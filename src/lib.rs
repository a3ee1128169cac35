//! # Smart Socket
//!
//! A resilient WebSocket connection manager. It reconnects with jittered exponential
//! backoff, detects dead links with an application-level heartbeat, and buffers outbound
//! messages while the connection is down.
//!
//! ## Example
//!
//! ```no_run
//! use smart_socket_rs::{
//!     EventKind, SmartSocket, SmartSocketOptions, SocketEvent, WebSocketFactory,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let socket = SmartSocket::new(
//!         "wss://echo.websocket.org",
//!         SmartSocketOptions {
//!             json: true,
//!             ..Default::default()
//!         },
//!         WebSocketFactory,
//!     )?;
//!
//!     socket.subscribe(EventKind::Message, |event| {
//!         if let SocketEvent::Message(message) = event {
//!             println!("received {:?}", message);
//!         }
//!     });
//!
//!     socket.send(serde_json::json!({ "hello": "world" }))?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod transport;
pub mod types;

pub use client::{
    BufferOptions, ConnectionState, DropStrategy, HeartbeatOptions, ReconnectOptions,
    SmartSocket, SmartSocketBuilder, SmartSocketOptions, SocketSnapshot,
};
pub use messaging::{EventKind, SocketEvent, Subscription, SubscriptionId};
pub use transport::{ReadyState, Transport, TransportEvents, TransportFactory, WebSocketFactory};
pub use types::{CloseInfo, Frame, Message, Result, SocketError};
