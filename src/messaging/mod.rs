pub mod event;
pub mod notifier;

pub use event::{EventKind, SocketEvent};
pub use notifier::{EventNotifier, Subscription, SubscriptionId};
