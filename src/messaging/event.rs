use crate::types::{CloseInfo, Message, SocketError};
use std::sync::Arc;

/// Event names a subscriber can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Close,
    Error,
    Message,
    Reconnect,
    Online,
    Offline,
    Ping,
    Pong,
    BufferAdd,
    BufferFlush,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        Self::Open,
        Self::Close,
        Self::Error,
        Self::Message,
        Self::Reconnect,
        Self::Online,
        Self::Offline,
        Self::Ping,
        Self::Pong,
        Self::BufferAdd,
        Self::BufferFlush,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Error => "error",
            Self::Message => "message",
            Self::Reconnect => "reconnect",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::BufferAdd => "bufferAdd",
            Self::BufferFlush => "bufferFlush",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle and traffic events emitted by a [`SmartSocket`](crate::SmartSocket)
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Transport opened
    Open,
    /// Transport closed
    Close(CloseInfo),
    /// Transport or decoding error; never changes connection status by itself
    Error(Arc<SocketError>),
    /// Decoded inbound message
    Message(Message),
    /// Reconnect scheduled; carries the retry counter after increment
    Reconnect(u32),
    /// Network became reachable
    Online,
    /// Network became unreachable
    Offline,
    /// Heartbeat ping recorded
    Ping,
    /// Implicit pong recorded
    Pong,
    /// Message queued while disconnected
    BufferAdd(Message),
    /// Queued messages sent on open, in insertion order
    BufferFlush(Vec<Message>),
}

impl SocketEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Close(_) => EventKind::Close,
            Self::Error(_) => EventKind::Error,
            Self::Message(_) => EventKind::Message,
            Self::Reconnect(_) => EventKind::Reconnect,
            Self::Online => EventKind::Online,
            Self::Offline => EventKind::Offline,
            Self::Ping => EventKind::Ping,
            Self::Pong => EventKind::Pong,
            Self::BufferAdd(_) => EventKind::BufferAdd,
            Self::BufferFlush(_) => EventKind::BufferFlush,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_matches_variant() {
        assert_eq!(SocketEvent::Open.kind(), EventKind::Open);
        assert_eq!(SocketEvent::Reconnect(3).kind(), EventKind::Reconnect);
        assert_eq!(
            SocketEvent::BufferFlush(vec![Message::from("a")]).kind(),
            EventKind::BufferFlush
        );
        assert_eq!(
            SocketEvent::Close(CloseInfo::new(1000, "bye")).kind(),
            EventKind::Close
        );
    }

    #[test]
    fn test_event_names_are_unique() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }
}
