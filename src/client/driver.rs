//! Connection state machine.
//!
//! The driver owns the transport, the backoff generator, the outbound buffer and the
//! heartbeat. Every stimulus (user calls, transport reports, timer fires, reachability
//! signals) arrives as an [`Input`] on one channel and is handled to completion before the
//! next, so no two of them ever interleave.

use super::builder::SmartSocketOptions;
use super::state::{ConnectionState, SocketSnapshot};
use crate::infrastructure::{Backoff, Enqueued, HeartbeatManager, OutboundBuffer, TimerSlot};
use crate::messaging::{EventNotifier, SocketEvent};
use crate::transport::{ReadyState, Transport, TransportEvent, TransportEvents, TransportFactory};
use crate::types::message::Codec;
use crate::types::{CloseInfo, Frame, Message, Result, SocketError, close_codes, close_reasons};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;
use url::Url;

/// Weak handle used by timers and transports to feed the driver
pub(crate) type InputSender = mpsc::WeakUnboundedSender<Input>;

pub(crate) enum Input {
    Connect(oneshot::Sender<Result<()>>),
    Disconnect {
        code: Option<u16>,
        reason: Option<String>,
    },
    Send(Message),
    Online,
    Offline,
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    ReconnectDue {
        token: u64,
    },
    HeartbeatTick {
        generation: u64,
    },
    HeartbeatTimeout {
        generation: u64,
        ping: u64,
    },
}

pub(crate) struct Driver {
    url: Url,
    factory: Arc<dyn TransportFactory>,
    codec: Codec,
    max_retries: Option<u32>,
    buffering: bool,
    notifier: EventNotifier,
    snapshot: watch::Sender<SocketSnapshot>,
    inputs: InputSender,

    state: ConnectionState,
    retries: u32,
    backoff: Backoff,
    buffer: OutboundBuffer,
    heartbeat: HeartbeatManager,

    transport: Option<Box<dyn Transport>>,
    /// Bumped for every transport created; reports and timers from older attempts are dropped
    generation: u64,
    close_requested: bool,
    reconnect_token: u64,
    reconnect_timer: TimerSlot,
}

impl Driver {
    pub fn new(
        url: Url,
        options: &SmartSocketOptions,
        factory: Arc<dyn TransportFactory>,
        notifier: EventNotifier,
        snapshot: watch::Sender<SocketSnapshot>,
        inputs: InputSender,
    ) -> Self {
        Self {
            url,
            factory,
            codec: Codec::new(options.json),
            max_retries: options.reconnect.retries,
            buffering: options.buffer.enabled,
            notifier,
            snapshot,
            inputs,
            state: ConnectionState::Idle,
            retries: 0,
            backoff: Backoff::from_options(&options.reconnect),
            buffer: OutboundBuffer::from_options(&options.buffer),
            heartbeat: HeartbeatManager::from_options(&options.heartbeat),
            transport: None,
            generation: 0,
            close_requested: false,
            reconnect_token: 0,
            reconnect_timer: TimerSlot::new(),
        }
    }

    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<Input>) {
        while let Some(input) = inputs.recv().await {
            self.handle(input);
        }
        self.shutdown();
    }

    fn handle(&mut self, input: Input) {
        match input {
            Input::Connect(reply) => {
                let result = self.connect();
                let _ = reply.send(result);
            }
            Input::Disconnect { code, reason } => self.disconnect(code, reason),
            Input::Send(message) => self.send(message),
            Input::Online => self.on_online(),
            Input::Offline => self.on_offline(),
            Input::Transport { generation, event } => {
                if generation != self.generation {
                    tracing::debug!(
                        "Ignoring {} from stale transport (generation {}, current {})",
                        event.name(),
                        generation,
                        self.generation
                    );
                    return;
                }
                match event {
                    TransportEvent::Open => self.on_open(),
                    TransportEvent::Message(frame) => self.on_message(frame),
                    TransportEvent::Error(error) => self.on_error(error),
                    TransportEvent::Close(info) => self.on_close(info),
                }
            }
            Input::ReconnectDue { token } => self.on_reconnect_due(token),
            Input::HeartbeatTick { generation } => self.on_heartbeat_tick(generation),
            Input::HeartbeatTimeout { generation, ping } => {
                self.on_heartbeat_timeout(generation, ping)
            }
        }
    }

    /// User-initiated connect. Factory failures are returned and leave the socket closed.
    pub fn connect(&mut self) -> Result<()> {
        match self.start_attempt() {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!("Failed to create transport for {}: {}", self.url, e);
                self.set_state(ConnectionState::Closed);
                Err(e)
            }
        }
    }

    fn start_attempt(&mut self) -> Result<()> {
        self.close_requested = false;
        self.cancel_reconnect();

        let live = self
            .transport
            .as_ref()
            .is_some_and(|t| matches!(t.ready_state(), ReadyState::Connecting | ReadyState::Open));
        if live && self.state != ConnectionState::Closing {
            tracing::debug!("Already {}, ignoring connect", self.state);
            return Ok(());
        }

        self.open_transport()
    }

    fn open_transport(&mut self) -> Result<()> {
        if let Some(stale) = self.transport.take() {
            self.heartbeat.stop();
            stale.close(Some(close_codes::NORMAL), "");
        }

        self.generation += 1;
        let next = if self.state == ConnectionState::Idle {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        };
        self.set_state(next);

        tracing::info!("Connecting to {} (attempt #{})", self.url, self.generation);
        let events = TransportEvents::new(self.generation, self.inputs.clone());
        let transport = self.factory.create(&self.url, events)?;
        self.transport = Some(transport);
        Ok(())
    }

    fn disconnect(&mut self, code: Option<u16>, reason: Option<String>) {
        self.close_requested = true;
        self.cancel_reconnect();
        self.heartbeat.stop();

        if self.transport.is_none() {
            self.set_state(ConnectionState::Closed);
            return;
        }

        tracing::info!("Disconnecting from {}", self.url);
        self.set_state(ConnectionState::Closing);
        if let Some(transport) = &self.transport {
            transport.close(code, reason.as_deref().unwrap_or(""));
        }
    }

    fn send(&mut self, message: Message) {
        if self.state == ConnectionState::Open && self.transport_ready() {
            self.send_now(&message);
        } else if self.buffering {
            self.buffer_message(message);
        } else {
            tracing::debug!("Buffering disabled, dropping message sent while {}", self.state);
        }
    }

    fn transport_ready(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|t| t.ready_state() == ReadyState::Open)
    }

    fn send_now(&self, message: &Message) {
        let Some(transport) = self.transport.as_ref() else {
            return;
        };

        let result = self
            .codec
            .encode(message)
            .and_then(|frame| transport.send(frame));
        if let Err(e) = result {
            tracing::error!("Failed to send message: {}", e);
            self.notifier.emit(SocketEvent::Error(Arc::new(e)));
        }
    }

    fn buffer_message(&mut self, message: Message) {
        match self.buffer.enqueue(message.clone()) {
            Enqueued::Rejected => {
                tracing::debug!("Outbound buffer full, dropping newest message");
            }
            outcome => {
                if let Enqueued::Evicted(_) = outcome {
                    tracing::debug!("Outbound buffer full, dropped oldest message");
                }
                tracing::debug!("Buffered message ({} pending)", self.buffer.len());
                self.notifier.emit(SocketEvent::BufferAdd(message));
            }
        }
    }

    /// Hands buffered messages to the transport in order. Messages the transport refuses stay
    /// buffered for the next open; only delivered ones are reported in `bufferFlush`.
    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        if !self.transport_ready() {
            tracing::debug!(
                "Transport closed before flush, keeping {} messages",
                self.buffer.len()
            );
            return;
        }
        let Some(transport) = self.transport.as_ref() else {
            return;
        };

        let mut pending = self.buffer.drain_all().into_iter();
        let mut flushed = Vec::new();
        let mut undelivered = Vec::new();
        tracing::debug!("Flushing {} buffered messages", pending.len());

        while let Some(message) = pending.next() {
            let frame = match self.codec.encode(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("Dropping buffered message that failed to encode: {}", e);
                    self.notifier.emit(SocketEvent::Error(Arc::new(e)));
                    continue;
                }
            };
            if let Err(e) = transport.send(frame) {
                tracing::error!(
                    "Flush interrupted, {} messages stay buffered: {}",
                    pending.len() + 1,
                    e
                );
                self.notifier.emit(SocketEvent::Error(Arc::new(e)));
                undelivered.push(message);
                undelivered.extend(pending);
                break;
            }
            flushed.push(message);
        }

        if !undelivered.is_empty() {
            self.buffer.restore(undelivered);
        }
        if !flushed.is_empty() {
            self.notifier.emit(SocketEvent::BufferFlush(flushed));
        }
    }

    fn on_open(&mut self) {
        self.retries = 0;
        self.backoff.reset();
        self.set_state(ConnectionState::Open);
        tracing::info!("Connected to {}", self.url);

        self.notifier.emit(SocketEvent::Open);
        self.heartbeat.start(self.generation, self.inputs.clone());
        self.flush_buffer();
    }

    fn on_message(&mut self, frame: Frame) {
        let message = match self.codec.decode(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("Failed to decode message: {}", e);
                self.notifier.emit(SocketEvent::Error(Arc::new(e)));
                return;
            }
        };

        if self.heartbeat.record_inbound() {
            self.publish();
            tracing::debug!(
                "Inbound message accepted as pong (latency {:?})",
                self.heartbeat.ledger().latency
            );
            self.notifier.emit(SocketEvent::Pong);
        }

        self.notifier.emit(SocketEvent::Message(message));
    }

    fn on_error(&mut self, error: SocketError) {
        tracing::error!("Transport error: {}", error);
        self.notifier.emit(SocketEvent::Error(Arc::new(error)));
    }

    fn on_close(&mut self, info: CloseInfo) {
        self.heartbeat.stop();
        self.transport = None;
        tracing::info!(
            "Connection closed: code={}, reason='{}'",
            info.code,
            info.reason
        );
        self.notifier.emit(SocketEvent::Close(info));

        if self.close_requested {
            self.set_state(ConnectionState::Closed);
            tracing::info!("Disconnected from {}", self.url);
            return;
        }

        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if let Some(max) = self.max_retries
            && self.retries >= max
        {
            tracing::info!("Retry budget of {} exhausted, giving up", max);
            self.set_state(ConnectionState::Closed);
            return;
        }

        self.retries += 1;
        let delay = self.backoff.next_delay();
        self.set_state(ConnectionState::Reconnecting);
        tracing::info!("Reconnecting in {:?} (retry {})", delay, self.retries);
        self.notifier.emit(SocketEvent::Reconnect(self.retries));

        self.reconnect_token += 1;
        let token = self.reconnect_token;
        let inputs = self.inputs.clone();
        self.reconnect_timer.arm(async move {
            time::sleep(delay).await;
            if let Some(tx) = inputs.upgrade() {
                let _ = tx.send(Input::ReconnectDue { token });
            }
        });
    }

    fn cancel_reconnect(&mut self) {
        self.reconnect_timer.cancel();
        self.reconnect_token += 1;
    }

    fn on_reconnect_due(&mut self, token: u64) {
        if token != self.reconnect_token || self.close_requested {
            tracing::debug!("Ignoring stale reconnect timer");
            return;
        }

        if let Err(e) = self.open_transport() {
            tracing::error!("Reconnection attempt failed: {}", e);
            self.notifier.emit(SocketEvent::Error(Arc::new(e)));
            self.schedule_reconnect();
        }
    }

    fn on_online(&mut self) {
        tracing::info!("Network reachable");
        self.notifier.emit(SocketEvent::Online);

        if matches!(
            self.state,
            ConnectionState::Closed | ConnectionState::Reconnecting
        ) && let Err(e) = self.start_attempt()
        {
            tracing::error!("Reconnection after network recovery failed: {}", e);
            self.notifier.emit(SocketEvent::Error(Arc::new(e)));
            self.schedule_reconnect();
        }
    }

    fn on_offline(&mut self) {
        tracing::info!("Network unreachable");
        self.notifier.emit(SocketEvent::Offline);

        if let Some(transport) = &self.transport {
            transport.close(Some(close_codes::OFFLINE), close_reasons::OFFLINE);
        }
    }

    fn on_heartbeat_tick(&mut self, generation: u64) {
        if generation != self.generation || self.state != ConnectionState::Open {
            return;
        }
        if !self.transport_ready() {
            tracing::debug!("Skipping heartbeat, transport not ready");
            return;
        }

        let ping = self.heartbeat.record_ping(generation, self.inputs.clone());
        self.publish();
        tracing::debug!("Sent heartbeat ping {}", ping);
        self.notifier.emit(SocketEvent::Ping);

        if let Some(message) = self.heartbeat.ping_message().cloned() {
            self.send_now(&message);
        }
    }

    fn on_heartbeat_timeout(&mut self, generation: u64, ping: u64) {
        if generation != self.generation || !self.heartbeat.is_unanswered(ping) {
            return;
        }

        tracing::warn!("Heartbeat timeout detected, closing connection");
        self.heartbeat.stop();
        if let Some(transport) = &self.transport {
            transport.close(
                Some(close_codes::HEARTBEAT_TIMEOUT),
                close_reasons::HEARTBEAT_TIMEOUT,
            );
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!("Connection state {} -> {}", self.state, next);
        }
        self.state = next;
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(SocketSnapshot {
            state: self.state,
            retries: self.retries,
            heartbeat: self.heartbeat.ledger(),
        });
    }

    fn shutdown(&mut self) {
        self.cancel_reconnect();
        self.heartbeat.stop();
        if let Some(transport) = self.transport.take() {
            transport.close(Some(close_codes::NORMAL), close_reasons::CLIENT_DROPPED);
        }
        self.set_state(ConnectionState::Closed);
        tracing::info!("Socket driver for {} stopped", self.url);
    }
}
