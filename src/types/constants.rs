use std::time::Duration;

/// WebSocket close codes (RFC 6455 plus application range)
pub mod close_codes {
    /// Normal closure
    pub const NORMAL: u16 = 1000;
    /// Peer closed without a status code
    pub const NO_STATUS: u16 = 1005;
    /// No close frame was received (connection dropped)
    pub const ABNORMAL: u16 = 1006;
    /// Forced close after an unanswered heartbeat ping
    pub const HEARTBEAT_TIMEOUT: u16 = 4000;
    /// Forced close after the network became unreachable
    pub const OFFLINE: u16 = 4001;
}

/// Close reasons paired with [`close_codes`]
pub mod close_reasons {
    pub const HEARTBEAT_TIMEOUT: &str = "Heartbeat timeout";
    pub const OFFLINE: &str = "Offline";
    pub const CLIENT_DROPPED: &str = "Client dropped";
    pub const CONNECTION_LOST: &str = "Connection lost";
}

/// Default minimum reconnect delay
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(500);

/// Default maximum reconnect delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(20_000);

/// Default backoff growth factor
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Default symmetric jitter fraction
pub const DEFAULT_JITTER: f64 = 0.2;

/// Default heartbeat interval
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(25_000);

/// Default heartbeat timeout
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Max outbound buffer size
pub const MAX_BUFFER_SIZE: usize = 200;

/// How long the WebSocket transport waits for the peer to answer a close frame
pub const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(1_000);
