//! Transport seam: task handles, resume tokens and the signal channel

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Opaque reference to one in-flight transport task.
///
/// Handles are allocated by the engine and passed to the transport at issue
/// time, so the handle-to-identity mapping is registered before the first
/// signal can possibly arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(Uuid);

impl TaskHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque transport-provided blob enabling continuation of an interrupted
/// transfer. The engine stores and forwards it but never inspects the bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeToken(Vec<u8>);

impl ResumeToken {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// An empty token forces a subsequent resume to restart from zero.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Asynchronous notifications from the transport, keyed by task handle.
///
/// Every issued task produces any number of `Progress` signals followed by
/// exactly one of `Finished`, `Aborted` or `Failed`.
#[derive(Debug, Clone)]
pub enum TransportSignal {
    /// Bytes landed. `bytes_expected` is `None` when the remote side does
    /// not announce a length.
    Progress {
        handle: TaskHandle,
        bytes_received: u64,
        bytes_expected: Option<u64>,
    },
    /// The transfer ran to completion; the payload sits at `temp_path`
    /// awaiting relocation to its permanent home.
    Finished {
        handle: TaskHandle,
        temp_path: PathBuf,
    },
    /// A locally requested halt (pause or cancel) took effect. Carries a
    /// resume token when one was requested and could be produced.
    Aborted {
        handle: TaskHandle,
        resume_token: Option<ResumeToken>,
    },
    /// The transfer died on its own.
    Failed {
        handle: TaskHandle,
        detail: String,
        recoverable: bool,
    },
}

impl TransportSignal {
    pub fn handle(&self) -> TaskHandle {
        match self {
            Self::Progress { handle, .. }
            | Self::Finished { handle, .. }
            | Self::Aborted { handle, .. }
            | Self::Failed { handle, .. } => *handle,
        }
    }
}

/// Sending half of the signal channel, cloned into each issued task.
pub type SignalSender = tokio::sync::mpsc::UnboundedSender<TransportSignal>;

/// Receiving half, drained by the engine's dispatch loop.
pub type SignalReceiver = tokio::sync::mpsc::UnboundedReceiver<TransportSignal>;

/// Pluggable transfer transport.
///
/// All methods are fire-and-forget: they return once the work is issued or
/// the cancellation is requested, and outcomes flow back through the signal
/// channel. Cancellation is cooperative; an already-completed task may still
/// deliver `Finished` after `cancel` returns, and the engine resolves that
/// race.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin a fresh transfer of `url`.
    async fn issue(&self, handle: TaskHandle, url: &str, signals: SignalSender);

    /// Continue an interrupted transfer from a previously produced token.
    async fn issue_resumable(&self, handle: TaskHandle, token: ResumeToken, signals: SignalSender);

    /// Request a halt. With `want_resume_token` the transport tries to
    /// produce a token describing the bytes already received; without it,
    /// partial state is discarded.
    async fn cancel(&self, handle: TaskHandle, want_resume_token: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let a = TaskHandle::new();
        let b = TaskHandle::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_resume_token_emptiness() {
        assert!(ResumeToken::empty().is_empty());
        assert!(!ResumeToken::new(vec![1, 2, 3]).is_empty());
    }

    #[test]
    fn test_signal_handle_accessor() {
        let handle = TaskHandle::new();
        let signal = TransportSignal::Failed {
            handle,
            detail: "connection reset".into(),
            recoverable: true,
        };
        assert_eq!(signal.handle(), handle);
    }
}
