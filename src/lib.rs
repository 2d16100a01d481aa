//! Background file-transfer subsystem for a remote-file-access client
//!
//! This crate manages concurrent, interruptible, resumable downloads of
//! remote files into local storage:
//! - At most one active transfer per file identity, tracked in a registry
//! - Pause producing an opaque resume token, resume from token or from zero
//! - Lifecycle events fanned out through a publish/subscribe bridge
//! - A pending-downloads badge counter driven by lifecycle transitions
//! - Pluggable transport and file-store seams, with an HTTP transport and
//!   a local-directory store bundled
//!
//! Construct a [`TransferEngine`] once at application start and hand clones
//! to consumers; all outcomes are delivered as [`TransferEvent`]s.

mod badge;
mod config;
mod descriptor;
mod engine;
mod error;
mod events;
mod http;
mod registry;
mod state;
mod store;
mod transport;

pub use badge::BadgeCounter;
pub use config::TransferConfig;
pub use descriptor::{FileId, RemoteFileDescriptor};
pub use engine::TransferEngine;
pub use error::{Result, TransferError};
pub use events::{NotificationBridge, Subscription, SubscriptionScope, TransferEvent};
pub use http::HttpTransport;
pub use registry::TransferRegistry;
pub use state::{TransferProgress, TransferRecord, TransferSnapshot, TransferStatus};
pub use store::{FileStore, LocalFileStore};
pub use transport::{
    ResumeToken, SignalReceiver, SignalSender, TaskHandle, Transport, TransportSignal,
};
