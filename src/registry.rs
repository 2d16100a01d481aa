//! Registry of active transfers, keyed by file identity

use crate::descriptor::FileId;
use crate::state::{TransferRecord, TransferSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Single source of truth for "is this file currently transferring".
///
/// Owned exclusively by the engine. All operations are atomic with respect
/// to concurrent invocation from control operations and the signal dispatch
/// loop; none of them touch the network or hold the lock across awaits.
#[derive(Default)]
pub struct TransferRegistry {
    records: RwLock<HashMap<FileId, TransferRecord>>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the record for an identity, if one exists.
    pub fn get(&self, identity: &FileId) -> Option<TransferRecord> {
        self.records.read().get(identity).cloned()
    }

    pub fn contains(&self, identity: &FileId) -> bool {
        self.records.read().contains_key(identity)
    }

    /// Insert a record unless the identity already has one. Returns whether
    /// the insert happened; the check-and-insert is a single critical
    /// section, which is what keeps at-most-one-record-per-identity true
    /// under racing `start` calls.
    pub fn insert_if_absent(&self, record: TransferRecord) -> bool {
        let mut records = self.records.write();
        if records.contains_key(&record.identity) {
            return false;
        }
        records.insert(record.identity.clone(), record);
        true
    }

    /// Run `f` against the record for `identity` under the write lock.
    /// Returns `None` when no record exists. Mutations to a record are
    /// serialized through here.
    pub fn with_record<R>(
        &self,
        identity: &FileId,
        f: impl FnOnce(&mut TransferRecord) -> R,
    ) -> Option<R> {
        let mut records = self.records.write();
        records.get_mut(identity).map(f)
    }

    pub fn remove(&self, identity: &FileId) -> Option<TransferRecord> {
        self.records.write().remove(identity)
    }

    /// Remove the record only if it reached a terminal state. Used by
    /// consumer acknowledgement so an in-flight transfer cannot be
    /// evicted by a stale ack.
    pub fn remove_terminal(&self, identity: &FileId) -> Option<TransferRecord> {
        let mut records = self.records.write();
        if records.get(identity).is_some_and(|r| r.status.is_terminal()) {
            records.remove(identity)
        } else {
            None
        }
    }

    /// Number of transfers counting towards the pending badge
    /// (downloading plus paused).
    pub fn count_active(&self) -> u64 {
        self.records
            .read()
            .values()
            .filter(|r| r.status.is_active())
            .count() as u64
    }

    /// Snapshots of every known record, for list rendering.
    pub fn snapshots(&self) -> Vec<TransferSnapshot> {
        self.records.read().values().map(|r| r.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TransferStatus;
    use crate::transport::TaskHandle;

    fn record(id: &str) -> TransferRecord {
        TransferRecord::new(id.into(), format!("http://host/{id}"), TaskHandle::new())
    }

    #[test]
    fn test_insert_if_absent_is_idempotent() {
        let registry = TransferRegistry::new();
        assert!(registry.insert_if_absent(record("a")));
        assert!(!registry.insert_if_absent(record("a")));
        assert!(registry.contains(&"a".into()));
    }

    #[test]
    fn test_count_active_excludes_terminal() {
        let registry = TransferRegistry::new();
        registry.insert_if_absent(record("a"));
        registry.insert_if_absent(record("b"));
        registry.with_record(&"a".into(), |r| {
            r.mark_paused();
        });
        assert_eq!(registry.count_active(), 2);

        registry.with_record(&"b".into(), |r| r.mark_completed());
        assert_eq!(registry.count_active(), 1);
    }

    #[test]
    fn test_remove_terminal_spares_live_records() {
        let registry = TransferRegistry::new();
        registry.insert_if_absent(record("a"));
        assert!(registry.remove_terminal(&"a".into()).is_none());
        assert!(registry.contains(&"a".into()));

        registry.with_record(&"a".into(), |r| r.mark_failed("boom"));
        let removed = registry.remove_terminal(&"a".into()).unwrap();
        assert_eq!(removed.status, TransferStatus::Failed);
        assert!(!registry.contains(&"a".into()));
    }
}
