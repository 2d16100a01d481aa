//! Transfer lifecycle state and progress tracking types

use crate::descriptor::FileId;
use crate::transport::{ResumeToken, TaskHandle};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one transfer.
///
/// "Not transferring" has no variant; it is represented by the identity
/// being absent from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// A transport task is running for this file.
    Downloading,
    /// Halted locally; resumable via token or full restart.
    Paused,
    /// Payload persisted at its permanent location.
    Completed,
    /// Died on its own, or completed but could not be persisted.
    Failed,
    /// Locally cancelled.
    Cancelled,
}

impl TransferStatus {
    /// Terminal states: exactly one is reached per transfer attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// States that count towards the pending-downloads badge.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Downloading | Self::Paused)
    }
}

/// Byte counts for one transfer. `bytes_expected` stays `None` when the
/// remote side does not announce a length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub bytes_received: u64,
    pub bytes_expected: Option<u64>,
}

impl TransferProgress {
    pub fn new(bytes_received: u64, bytes_expected: Option<u64>) -> Self {
        Self {
            bytes_received,
            bytes_expected,
        }
    }

    /// Completed fraction in `[0, 1]`, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        self.bytes_expected.map(|total| {
            if total == 0 {
                0.0
            } else {
                self.bytes_received as f64 / total as f64
            }
        })
    }
}

/// Which local control operation, if any, asked the transport to halt.
///
/// Tracked on the record rather than inferred from error contents, so a
/// transport-side cancellation error is never mistaken for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbortIntent {
    #[default]
    None,
    Pause,
    Cancel,
}

/// One file's download lifecycle state.
///
/// Lives in the registry from `start` until cancellation or terminal-state
/// acknowledgement. A `Downloading` record always holds a live task handle;
/// a `Paused` record holds a resume token when the transport produced one.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub identity: FileId,
    pub url: String,
    pub status: TransferStatus,
    pub handle: Option<TaskHandle>,
    pub resume_token: Option<ResumeToken>,
    pub progress: TransferProgress,
    pub abort: AbortIntent,
    pub failure: Option<String>,
}

impl TransferRecord {
    /// Create a record for a freshly issued transfer.
    pub fn new(identity: FileId, url: impl Into<String>, handle: TaskHandle) -> Self {
        Self {
            identity,
            url: url.into(),
            status: TransferStatus::Downloading,
            handle: Some(handle),
            resume_token: None,
            progress: TransferProgress::default(),
            abort: AbortIntent::None,
            failure: None,
        }
    }

    /// Transition to `Paused` and give up the task handle. The resume token
    /// arrives later, through the transport's abort signal.
    pub fn mark_paused(&mut self) -> Option<TaskHandle> {
        self.status = TransferStatus::Paused;
        self.abort = AbortIntent::Pause;
        self.handle.take()
    }

    /// Transition back to `Downloading` under a new task, clearing any
    /// stored token and failure detail.
    pub fn mark_resumed(&mut self, handle: TaskHandle) {
        self.status = TransferStatus::Downloading;
        self.handle = Some(handle);
        self.resume_token = None;
        self.abort = AbortIntent::None;
        self.failure = None;
    }

    pub fn mark_completed(&mut self) {
        self.status = TransferStatus::Completed;
        self.handle = None;
        self.resume_token = None;
    }

    pub fn mark_failed(&mut self, detail: impl Into<String>) {
        self.status = TransferStatus::Failed;
        self.handle = None;
        self.failure = Some(detail.into());
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            identity: self.identity.clone(),
            status: self.status,
            progress: self.progress.clone(),
            failure: self.failure.clone(),
        }
    }
}

/// Read-only view of a record for synchronous UI rendering.
#[derive(Debug, Clone, Serialize)]
pub struct TransferSnapshot {
    pub identity: FileId,
    pub status: TransferStatus,
    pub progress: TransferProgress,
    pub failure: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(TransferStatus::Completed.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
        assert!(TransferStatus::Cancelled.is_terminal());
        assert!(!TransferStatus::Downloading.is_terminal());
        assert!(!TransferStatus::Paused.is_terminal());

        assert!(TransferStatus::Downloading.is_active());
        assert!(TransferStatus::Paused.is_active());
        assert!(!TransferStatus::Completed.is_active());
    }

    #[test]
    fn test_progress_fraction() {
        let progress = TransferProgress::new(50, Some(200));
        assert_eq!(progress.fraction(), Some(0.25));
        assert_eq!(TransferProgress::new(50, None).fraction(), None);
        assert_eq!(TransferProgress::new(0, Some(0)).fraction(), Some(0.0));
    }

    #[test]
    fn test_pause_resume_round_trip() {
        let first = TaskHandle::new();
        let mut record = TransferRecord::new("a".into(), "http://host/a", first);
        assert_eq!(record.status, TransferStatus::Downloading);

        let released = record.mark_paused();
        assert_eq!(released, Some(first));
        assert_eq!(record.status, TransferStatus::Paused);
        assert_eq!(record.abort, AbortIntent::Pause);
        assert!(record.handle.is_none());

        record.resume_token = Some(ResumeToken::new(vec![7]));
        let second = TaskHandle::new();
        record.mark_resumed(second);
        assert_eq!(record.status, TransferStatus::Downloading);
        assert_eq!(record.handle, Some(second));
        assert!(record.resume_token.is_none());
        assert_eq!(record.abort, AbortIntent::None);
    }

    #[test]
    fn test_failure_detail_cleared_on_resume() {
        let mut record = TransferRecord::new("a".into(), "http://host/a", TaskHandle::new());
        record.mark_failed("connection reset");
        assert_eq!(record.status, TransferStatus::Failed);
        assert_eq!(record.failure.as_deref(), Some("connection reset"));

        record.mark_resumed(TaskHandle::new());
        assert!(record.failure.is_none());
    }
}
