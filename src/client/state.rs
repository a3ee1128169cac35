use crate::infrastructure::HeartbeatLedger;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`SmartSocket`](crate::SmartSocket)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of the driver's observable state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocketSnapshot {
    pub state: ConnectionState,
    /// Reconnect attempts since the last successful open
    pub retries: u32,
    pub heartbeat: HeartbeatLedger,
}
