use super::{EventKind, SocketEvent};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

type Handler = Arc<dyn Fn(&SocketEvent) + Send + Sync + 'static>;

/// Identifies one registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
}

impl Registry {
    fn handlers(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<(SubscriptionId, Handler)>>> {
        // Handlers never run under this lock, so a poisoned map is still consistent
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(&kind);
        }
        removed
    }
}

/// Cancel handle returned by [`EventNotifier::subscribe`].
///
/// Dropping the handle keeps the handler registered; call [`Subscription::cancel`] to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    kind: EventKind,
    id: SubscriptionId,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Removes the handler. Returns `false` if it was already removed.
    pub fn cancel(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.kind, self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}

/// Publish/subscribe registry fanning events out to every current handler.
///
/// Handlers run synchronously on the emitting task. A panicking handler is caught and
/// logged; the remaining handlers still receive the event.
#[derive(Clone, Default)]
pub struct EventNotifier {
    registry: Arc<Registry>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry
            .handlers()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            kind,
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.registry.remove(kind, id)
    }

    /// Registers a channel-backed listener. The handler unregisters itself once the
    /// receiver is dropped.
    pub fn listen(&self, kind: EventKind) -> mpsc::UnboundedReceiver<SocketEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::downgrade(&self.registry);
        let id = SubscriptionId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));

        let handler = move |event: &SocketEvent| {
            if tx.send(event.clone()).is_err()
                && let Some(registry) = registry.upgrade()
            {
                registry.remove(kind, id);
            }
        };
        self.registry
            .handlers()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        rx
    }

    pub fn emit(&self, event: SocketEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = match self.registry.handlers().get(&kind) {
            Some(list) => list.iter().map(|(_, handler)| Arc::clone(handler)).collect(),
            None => return,
        };

        for handler in handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::warn!("Handler for '{}' event panicked, continuing", kind);
            }
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry.handlers().get(&kind).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter(notifier: &EventNotifier, kind: EventKind) -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let sub = notifier.subscribe(kind, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        (hits, sub)
    }

    #[test]
    fn test_emit_reaches_every_subscriber_of_kind() {
        let notifier = EventNotifier::new();
        let (a, _sa) = counter(&notifier, EventKind::Open);
        let (b, _sb) = counter(&notifier, EventKind::Open);
        let (other, _so) = counter(&notifier, EventKind::Close);

        notifier.emit(SocketEvent::Open);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let notifier = EventNotifier::new();
        let (hits, sub) = counter(&notifier, EventKind::Ping);

        notifier.emit(SocketEvent::Ping);
        assert!(sub.cancel());
        notifier.emit(SocketEvent::Ping);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!sub.cancel(), "second cancel is a no-op");
        assert_eq!(notifier.subscriber_count(EventKind::Ping), 0);
    }

    #[test]
    fn test_unsubscribe_by_id() {
        let notifier = EventNotifier::new();
        let (hits, sub) = counter(&notifier, EventKind::Pong);

        assert!(notifier.unsubscribe(EventKind::Pong, sub.id()));
        notifier.emit(SocketEvent::Pong);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!notifier.unsubscribe(EventKind::Open, sub.id()));
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let notifier = EventNotifier::new();
        let (before, _s1) = counter(&notifier, EventKind::Online);
        let _boom = notifier.subscribe(EventKind::Online, |_| panic!("handler failure"));
        let (after, _s2) = counter(&notifier, EventKind::Online);

        notifier.emit(SocketEvent::Online);
        notifier.emit(SocketEvent::Online);

        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handler_may_subscribe_during_emit() {
        let notifier = EventNotifier::new();
        let inner = notifier.clone();
        let _sub = notifier.subscribe(EventKind::Open, move |_| {
            let _ = inner.subscribe(EventKind::Close, |_| {});
        });

        notifier.emit(SocketEvent::Open);

        assert_eq!(notifier.subscriber_count(EventKind::Close), 1);
    }

    #[test]
    fn test_listen_receives_clones_and_cleans_up() {
        let notifier = EventNotifier::new();
        let mut rx = notifier.listen(EventKind::Reconnect);

        notifier.emit(SocketEvent::Reconnect(1));
        match rx.try_recv() {
            Ok(SocketEvent::Reconnect(n)) => assert_eq!(n, 1),
            other => panic!("unexpected: {:?}", other),
        }

        drop(rx);
        notifier.emit(SocketEvent::Reconnect(2));
        assert_eq!(notifier.subscriber_count(EventKind::Reconnect), 0);
    }
}
