//! Transfer engine: orchestrates control operations and transport signals

use crate::badge::BadgeCounter;
use crate::config::TransferConfig;
use crate::descriptor::{FileId, RemoteFileDescriptor};
use crate::events::{NotificationBridge, Subscription, SubscriptionScope, TransferEvent};
use crate::http::HttpTransport;
use crate::registry::TransferRegistry;
use crate::state::{AbortIntent, TransferProgress, TransferRecord, TransferSnapshot, TransferStatus};
use crate::store::{FileStore, LocalFileStore};
use crate::transport::{
    ResumeToken, SignalReceiver, SignalSender, TaskHandle, Transport, TransportSignal,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Orchestrates start/pause/resume/cancel against the registry and a
/// transport, and fans lifecycle events out through the bridge.
///
/// One engine instance is created at application start and handed to
/// consumers; cloning shares the same underlying state. Control operations
/// are safe to call from any task while transport signals arrive
/// concurrently; the registry serializes every record mutation. No
/// operation blocks on network I/O.
#[derive(Clone)]
pub struct TransferEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    registry: TransferRegistry,
    /// Task-handle to identity mapping, registered at issue time and used
    /// to route incoming transport signals.
    handles: RwLock<HashMap<TaskHandle, FileId>>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn FileStore>,
    bridge: NotificationBridge,
    badge: BadgeCounter,
    signal_tx: SignalSender,
}

impl TransferEngine {
    /// Create an engine over the given transport and file store, and spawn
    /// its signal dispatch loop. Must be called within a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn FileStore>) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(EngineInner {
            registry: TransferRegistry::new(),
            handles: RwLock::new(HashMap::new()),
            transport,
            store,
            bridge: NotificationBridge::new(),
            badge: BadgeCounter::new(),
            signal_tx,
        });
        // The loop holds a Weak reference; dropping the last engine handle
        // lets it wind down.
        tokio::spawn(dispatch_signals(Arc::downgrade(&inner), signal_rx));
        Self { inner }
    }

    /// Convenience constructor wiring the bundled HTTP transport and a
    /// local file store rooted at the configured download directory.
    pub fn with_http_transport(config: &TransferConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config));
        let store = Arc::new(LocalFileStore::new(config.download_root.clone()));
        Self::new(transport, store)
    }

    /// Begin downloading the file described by `descriptor`.
    ///
    /// A descriptor without a resolvable URL, or an identity that already
    /// has a registry record, makes this a logged no-op.
    pub async fn start(&self, descriptor: &RemoteFileDescriptor) {
        let identity = descriptor.identity();
        let Some(url) = descriptor.resolved_url() else {
            log::warn!("start ignored for {identity}: descriptor has no resolvable URL");
            return;
        };

        let handle = TaskHandle::new();
        let record = TransferRecord::new(identity.clone(), url, handle);
        if !self.inner.registry.insert_if_absent(record) {
            log::debug!("start ignored for {identity}: transfer already known");
            return;
        }
        self.inner.handles.write().insert(handle, identity.clone());

        self.inner.badge.increment();
        log::info!("transfer started for {identity}");
        self.inner.bridge.publish(&TransferEvent::Started {
            identity: identity.clone(),
        });

        self.inner
            .transport
            .issue(handle, url, self.inner.signal_tx.clone())
            .await;
    }

    /// Halt the transfer, asking the transport for a resume token.
    ///
    /// No-op unless the record is currently `Downloading`. The token, if
    /// the transport can produce one, lands on the record asynchronously;
    /// a resume issued before it arrives restarts from zero.
    pub async fn pause(&self, descriptor: &RemoteFileDescriptor) {
        let identity = descriptor.identity();
        let handle = self
            .inner
            .registry
            .with_record(identity, |record| {
                if record.status != TransferStatus::Downloading {
                    return None;
                }
                record.mark_paused()
            })
            .flatten();

        let Some(handle) = handle else {
            log::debug!("pause ignored for {identity}: no download in flight");
            return;
        };
        log::info!("transfer paused for {identity}");
        // The handle mapping stays registered so the abort signal can
        // deliver the token.
        self.inner.transport.cancel(handle, true).await;
    }

    /// Continue a paused transfer, or retry a failed one.
    ///
    /// Uses the stored resume token when present; otherwise issues a fresh
    /// transfer from the original URL.
    pub async fn resume(&self, descriptor: &RemoteFileDescriptor) {
        let identity = descriptor.identity();
        let handle = TaskHandle::new();

        enum Plan {
            Token(ResumeToken),
            Fresh(String),
        }

        let plan = self
            .inner
            .registry
            .with_record(identity, |record| {
                match record.status {
                    TransferStatus::Paused | TransferStatus::Failed => {}
                    _ => return None,
                }
                if record.status == TransferStatus::Failed {
                    // The failure already decremented the badge; reviving
                    // the attempt makes it pending again.
                    self.inner.badge.increment();
                }
                let token = record.resume_token.take();
                record.mark_resumed(handle);
                Some(match token {
                    Some(token) if !token.is_empty() => Plan::Token(token),
                    _ => Plan::Fresh(record.url.clone()),
                })
            })
            .flatten();

        let Some(plan) = plan else {
            log::debug!("resume ignored for {identity}: nothing to resume");
            return;
        };
        self.inner.handles.write().insert(handle, identity.clone());

        let signals = self.inner.signal_tx.clone();
        match plan {
            Plan::Token(token) => {
                log::info!("resuming {identity} from resume token");
                self.inner
                    .transport
                    .issue_resumable(handle, token, signals)
                    .await;
            }
            Plan::Fresh(url) => {
                log::info!("resuming {identity} with a fresh transfer");
                self.inner.transport.issue(handle, &url, signals).await;
            }
        }
    }

    /// Abort the transfer and drop its record, discarding partial state.
    pub async fn cancel(&self, descriptor: &RemoteFileDescriptor) {
        let identity = descriptor.identity();
        let Some(record) = self.inner.registry.remove(identity) else {
            log::debug!("cancel ignored for {identity}: no active transfer");
            return;
        };

        if let Some(handle) = record.handle {
            self.inner.handles.write().remove(&handle);
            self.inner.transport.cancel(handle, false).await;
        }

        if record.status.is_terminal() {
            // Already counted and announced; dropping the record is enough.
            return;
        }
        self.inner.badge.decrement();
        log::info!("transfer cancelled for {identity}");
        self.inner.bridge.publish(&TransferEvent::Cancelled {
            identity: identity.clone(),
        });
    }

    /// Drop a record that reached a terminal state, freeing the identity
    /// for a later `start`. No-op while the transfer is live.
    pub fn acknowledge(&self, identity: &FileId) {
        if self.inner.registry.remove_terminal(identity).is_some() {
            log::debug!("terminal transfer acknowledged for {identity}");
        }
    }

    /// Status and progress for one identity, if the registry knows it.
    pub fn query(&self, identity: &FileId) -> Option<TransferSnapshot> {
        self.inner.registry.get(identity).map(|r| r.snapshot())
    }

    /// Snapshots of every known transfer.
    pub fn snapshots(&self) -> Vec<TransferSnapshot> {
        self.inner.registry.snapshots()
    }

    /// Number of transfers currently downloading or paused.
    pub fn active_count(&self) -> u64 {
        self.inner.registry.count_active()
    }

    /// Whether a completed payload is persisted for this identity.
    pub async fn is_persisted(&self, identity: &FileId) -> bool {
        self.inner.store.is_persisted(identity).await
    }

    /// Register for lifecycle events; the subscription unsubscribes on drop.
    pub fn subscribe(&self, scope: SubscriptionScope) -> Subscription {
        self.inner.bridge.subscribe(scope)
    }

    /// Current pending-downloads badge value.
    pub fn badge_count(&self) -> u64 {
        self.inner.badge.value()
    }

    /// Re-seed the badge from the registry, for view-attach time.
    pub fn reset_badge(&self) {
        self.inner.badge.reset_to(self.inner.registry.count_active());
    }
}

async fn dispatch_signals(engine: Weak<EngineInner>, mut signals: SignalReceiver) {
    while let Some(signal) = signals.recv().await {
        match engine.upgrade() {
            Some(inner) => inner.handle_signal(signal).await,
            None => break,
        }
    }
}

impl EngineInner {
    async fn handle_signal(&self, signal: TransportSignal) {
        let handle = signal.handle();
        let identity = { self.handles.read().get(&handle).cloned() };
        let Some(identity) = identity else {
            // Cancelled before the signal landed.
            log::debug!("dropping signal for unknown task {handle}");
            return;
        };

        match signal {
            TransportSignal::Progress {
                bytes_received,
                bytes_expected,
                ..
            } => {
                self.registry.with_record(&identity, |record| {
                    if record.handle != Some(handle)
                        || record.status != TransferStatus::Downloading
                    {
                        return;
                    }
                    let progress = TransferProgress::new(bytes_received, bytes_expected);
                    if record.progress == progress {
                        return;
                    }
                    record.progress = progress.clone();
                    self.bridge.publish(&TransferEvent::Progress {
                        identity: record.identity.clone(),
                        progress,
                    });
                });
            }

            TransportSignal::Finished { temp_path, .. } => {
                self.finish(identity, handle, temp_path).await;
            }

            TransportSignal::Aborted { resume_token, .. } => {
                self.handles.write().remove(&handle);
                self.registry.with_record(&identity, |record| {
                    if record.status != TransferStatus::Paused
                        || record.abort != AbortIntent::Pause
                    {
                        // Cancelled, resumed or completed in the meantime;
                        // nothing to keep.
                        return;
                    }
                    if resume_token.is_none() {
                        log::debug!(
                            "no resume token for paused {identity}; resume restarts from zero"
                        );
                    }
                    record.resume_token = resume_token;
                });
            }

            TransportSignal::Failed {
                detail,
                recoverable,
                ..
            } => {
                self.handles.write().remove(&handle);
                self.registry.with_record(&identity, |record| {
                    if record.handle != Some(handle) {
                        // A locally requested halt or a superseded task;
                        // the pause and cancel paths already spoke for
                        // this attempt.
                        return;
                    }
                    record.mark_failed(detail.clone());
                    self.badge.decrement();
                    log::warn!("transfer failed for {identity}: {detail}");
                    self.bridge.publish(&TransferEvent::Failed {
                        identity: record.identity.clone(),
                        detail,
                        recoverable,
                    });
                });
            }
        }
    }

    /// Persist a finished payload and settle the record. The completion
    /// event only fires after relocation succeeds; a relocation failure is
    /// reported as a distinct persistence failure.
    async fn finish(&self, identity: FileId, handle: TaskHandle, temp_path: PathBuf) {
        self.handles.write().remove(&handle);

        let claimed = self
            .registry
            .with_record(&identity, |record| {
                if record.status.is_terminal() {
                    return false;
                }
                match record.handle {
                    Some(current) => current == handle,
                    // A pause raced a task that had already finished; the
                    // transport sends one terminal signal per task, so the
                    // finish is authoritative.
                    None => {
                        record.status == TransferStatus::Paused
                            && record.abort == AbortIntent::Pause
                    }
                }
            })
            .unwrap_or(false);
        if !claimed {
            log::debug!("dropping stale finish signal for {identity}");
            return;
        }

        match self.store.relocate(&temp_path, &identity).await {
            Ok(path) => {
                self.registry.with_record(&identity, |record| {
                    record.mark_completed();
                    if let Some(total) = record.progress.bytes_expected {
                        record.progress.bytes_received = total;
                    }
                    self.badge.decrement();
                    log::info!("transfer completed for {identity}");
                    self.bridge.publish(&TransferEvent::Completed {
                        identity: record.identity.clone(),
                        path: path.clone(),
                    });
                });
            }
            Err(err) => {
                let detail = err.to_string();
                self.registry.with_record(&identity, |record| {
                    record.mark_failed(detail.clone());
                    self.badge.decrement();
                    log::warn!("transfer for {identity} could not be persisted: {detail}");
                    self.bridge.publish(&TransferEvent::Failed {
                        identity: record.identity.clone(),
                        detail,
                        recoverable: false,
                    });
                });
            }
        }
    }
}
