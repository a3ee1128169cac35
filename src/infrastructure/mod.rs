// Infrastructure module - timers, backoff, buffering and liveness used by the driver
pub mod backoff;
pub mod buffer;
pub mod heartbeat;
pub mod timer;

pub use backoff::Backoff;
pub use buffer::{Enqueued, OutboundBuffer};
pub use heartbeat::{HeartbeatLedger, HeartbeatManager};
pub use timer::TimerSlot;
