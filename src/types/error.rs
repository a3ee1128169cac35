use thiserror::Error;

/// Errors that can occur when using a [`SmartSocket`](crate::SmartSocket).
#[derive(Error, Debug)]
pub enum SocketError {
    /// WebSocket protocol error (connection failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid options or transport factory failure at connect time
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint URL)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Attempted to write to a transport that is not open
    #[error("Not connected")]
    NotConnected,

    /// The connection driver has stopped
    #[error("Socket driver has shut down")]
    Shutdown,
}

/// Convenience type alias for `Result<T, SocketError>`.
pub type Result<T> = std::result::Result<T, SocketError>;
