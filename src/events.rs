//! Publish/subscribe fan-out of transfer lifecycle events

use crate::descriptor::FileId;
use crate::state::TransferProgress;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Lifecycle event for one transfer, as observed by consumers.
///
/// Within one identity events respect causal order: `Started`, then any
/// number of `Progress`, then exactly one terminal event per attempt. No
/// ordering is guaranteed across identities. Consumers must treat repeated
/// delivery of the same terminal event as a safe no-op.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    Started {
        identity: FileId,
    },
    Progress {
        identity: FileId,
        progress: TransferProgress,
    },
    /// Payload relocated to its permanent location before this fires.
    Completed {
        identity: FileId,
        path: PathBuf,
    },
    Failed {
        identity: FileId,
        detail: String,
        recoverable: bool,
    },
    Cancelled {
        identity: FileId,
    },
}

impl TransferEvent {
    pub fn identity(&self) -> &FileId {
        match self {
            Self::Started { identity }
            | Self::Progress { identity, .. }
            | Self::Completed { identity, .. }
            | Self::Failed { identity, .. }
            | Self::Cancelled { identity } => identity,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// What a subscriber wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionScope {
    /// Every transfer (badge updaters, list refreshers).
    All,
    /// One file only (a single cell's progress indicator).
    File(FileId),
}

impl SubscriptionScope {
    fn matches(&self, event: &TransferEvent) -> bool {
        match self {
            Self::All => true,
            Self::File(id) => event.identity() == id,
        }
    }
}

struct Subscriber {
    scope: SubscriptionScope,
    tx: mpsc::UnboundedSender<TransferEvent>,
}

#[derive(Default)]
struct BridgeInner {
    subscribers: RwLock<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

/// Decouples the engine from its consumers: the engine publishes, interested
/// parties subscribe, and neither side knows the other.
#[derive(Clone, Default)]
pub struct NotificationBridge {
    inner: Arc<BridgeInner>,
}

impl NotificationBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. The returned handle carries the event stream
    /// and unsubscribes when dropped, so UI teardown cannot leave a
    /// dangling handler behind.
    pub fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .insert(id, Subscriber { scope, tx });
        Subscription {
            id,
            rx,
            bridge: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every subscriber whose scope matches. Dead
    /// subscribers discovered along the way are pruned.
    pub fn publish(&self, event: &TransferEvent) {
        let mut dead = Vec::new();
        {
            let subscribers = self.inner.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                if subscriber.scope.matches(event) && subscriber.tx.send(event.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }
        if !dead.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            for id in dead {
                subscribers.remove(&id);
            }
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

/// Live subscription to transfer events. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<TransferEvent>,
    bridge: Weak<BridgeInner>,
}

impl Subscription {
    /// Next event, or `None` once the bridge is gone.
    pub async fn recv(&mut self) -> Option<TransferEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll for an already-delivered event.
    pub fn try_recv(&mut self) -> Option<TransferEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bridge.upgrade() {
            inner.subscribers.write().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> TransferEvent {
        TransferEvent::Started {
            identity: id.into(),
        }
    }

    #[tokio::test]
    async fn test_wildcard_subscriber_sees_everything() {
        let bridge = NotificationBridge::new();
        let mut sub = bridge.subscribe(SubscriptionScope::All);

        bridge.publish(&started("a"));
        bridge.publish(&started("b"));

        assert_eq!(sub.recv().await.unwrap().identity().as_str(), "a");
        assert_eq!(sub.recv().await.unwrap().identity().as_str(), "b");
    }

    #[tokio::test]
    async fn test_file_scope_filters_other_identities() {
        let bridge = NotificationBridge::new();
        let mut sub = bridge.subscribe(SubscriptionScope::File("a".into()));

        bridge.publish(&started("b"));
        bridge.publish(&started("a"));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.identity().as_str(), "a");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let bridge = NotificationBridge::new();
        let sub = bridge.subscribe(SubscriptionScope::All);
        assert_eq!(bridge.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bridge.subscriber_count(), 0);

        // Publishing to an empty bridge is a no-op.
        bridge.publish(&started("a"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(TransferEvent::Cancelled {
            identity: "a".into()
        }
        .is_terminal());
        assert!(!started("a").is_terminal());
    }
}
