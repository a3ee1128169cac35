// Module declarations
mod builder;
mod core;
pub(crate) mod driver;
mod state;


// Public API exports
pub use builder::{
    BufferOptions, DropStrategy, HeartbeatOptions, ReconnectOptions, SmartSocketBuilder,
    SmartSocketOptions,
};
pub use self::core::SmartSocket;
pub use state::{ConnectionState, SocketSnapshot};
