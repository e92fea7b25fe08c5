//! Queue change notification.
//!
//! A mutation is announced as a bare action kind; subscribers re-read the
//! durable store for the authoritative state instead of trusting event
//! payloads (the event is a wake-up signal, not a payload channel).
//!
//! Same-context delivery goes over the in-process [`LocalBus`]. Delivery to
//! other contexts sharing the same storage goes through a transport bridge
//! the embedder composes in via [`BridgeNotifier`], because the storage
//! layer's native change signal only fires in contexts that did *not*
//! perform the mutation — the mutating side must announce for itself.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

/// What kind of mutation just hit the queue document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    Added,
    Removed,
    Updated,
}

impl QueueAction {
    /// Stable event-name string for transport bridges.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueAction::Added => "added",
            QueueAction::Removed => "removed",
            QueueAction::Updated => "updated",
        }
    }
}

/// Observer seam for queue mutations. The queue manager calls this after
/// every successful store write.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, action: QueueAction);
}

/// In-process bus for same-context subscribers (pending-sales panels, badge
/// counters). Lagging subscribers drop old actions, which is harmless — they
/// re-read the store on the next one anyway.
pub struct LocalBus {
    tx: broadcast::Sender<QueueAction>,
}

impl LocalBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueAction> {
        self.tx.subscribe()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier for LocalBus {
    fn notify(&self, action: QueueAction) {
        // Send only fails when nobody subscribes, which is fine.
        let _ = self.tx.send(action);
        debug!(action = action.as_str(), "queue change published");
    }
}

/// Bridge to an external transport (window event, IPC emitter, storage
/// signal). The embedder supplies the forwarding closure, keeping the core
/// transport-agnostic.
pub struct BridgeNotifier {
    forward: Box<dyn Fn(QueueAction) + Send + Sync>,
}

impl BridgeNotifier {
    pub fn new(forward: impl Fn(QueueAction) + Send + Sync + 'static) -> Self {
        Self {
            forward: Box::new(forward),
        }
    }
}

impl ChangeNotifier for BridgeNotifier {
    fn notify(&self, action: QueueAction) {
        (self.forward)(action);
    }
}

/// Fans one mutation out to several notifiers — typically the local bus
/// plus a cross-context bridge.
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn ChangeNotifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn ChangeNotifier>>) -> Self {
        Self { sinks }
    }
}

impl ChangeNotifier for FanoutNotifier {
    fn notify(&self, action: QueueAction) {
        for sink in &self.sinks {
            sink.notify(action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_local_bus_delivers_action_kind_to_subscriber() {
        let bus = LocalBus::new();
        let mut rx = bus.subscribe();

        bus.notify(QueueAction::Added);
        bus.notify(QueueAction::Removed);

        assert_eq!(rx.try_recv().unwrap(), QueueAction::Added);
        assert_eq!(rx.try_recv().unwrap(), QueueAction::Removed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notify_without_subscribers_is_harmless() {
        let bus = LocalBus::new();
        bus.notify(QueueAction::Updated);
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let bus_hits = Arc::new(AtomicUsize::new(0));
        let bridge_hits = Arc::new(AtomicUsize::new(0));

        let a = bus_hits.clone();
        let b = bridge_hits.clone();
        let fanout = FanoutNotifier::new(vec![
            Arc::new(BridgeNotifier::new(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            })),
            Arc::new(BridgeNotifier::new(move |_| {
                b.fetch_add(1, Ordering::SeqCst);
            })),
        ]);

        fanout.notify(QueueAction::Added);
        fanout.notify(QueueAction::Removed);

        assert_eq!(bus_hits.load(Ordering::SeqCst), 2);
        assert_eq!(bridge_hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bridge_receives_stable_event_names() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let bridge = BridgeNotifier::new(move |action: QueueAction| {
            sink.lock().unwrap().push(action.as_str());
        });

        bridge.notify(QueueAction::Added);
        bridge.notify(QueueAction::Updated);

        assert_eq!(*seen.lock().unwrap(), vec!["added", "updated"]);
    }
}
