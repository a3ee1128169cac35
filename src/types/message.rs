use crate::types::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Application-level message sent or received through a [`SmartSocket`](crate::SmartSocket).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Json(Value),
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Self::Binary(data)
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Wire-level frame exchanged with a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Close notification reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    /// Whether the closing handshake completed
    pub was_clean: bool,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean: true,
        }
    }

    pub fn unclean(mut self) -> Self {
        self.was_clean = false;
        self
    }
}

/// Encodes outbound messages and decodes inbound frames.
///
/// With `json` off, text and binary pass through untouched. With `json` on, every text
/// frame is parsed into [`Message::Json`] and every outbound text or JSON message is
/// serialized as a JSON document. Binary frames always pass through.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Codec {
    json: bool,
}

impl Codec {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn encode(&self, message: &Message) -> Result<Frame> {
        let frame = match message {
            Message::Binary(data) => Frame::Binary(data.clone()),
            Message::Text(text) if self.json => Frame::Text(serde_json::to_string(text)?),
            Message::Text(text) => Frame::Text(text.clone()),
            Message::Json(value) => Frame::Text(serde_json::to_string(value)?),
        };
        Ok(frame)
    }

    pub fn decode(&self, frame: Frame) -> Result<Message> {
        match frame {
            Frame::Text(text) if self.json => Ok(Message::Json(serde_json::from_str(&text)?)),
            Frame::Text(text) => Ok(Message::Text(text)),
            Frame::Binary(data) => Ok(Message::Binary(data)),
        }
    }
}
