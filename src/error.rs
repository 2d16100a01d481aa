//! Error types for the transfer subsystem

use thiserror::Error;

/// Error type for transfer operations.
///
/// Failures never escape the engine as panics or bubbled errors; they are
/// converted into `failed` events carrying the error detail. This type is
/// what transports and the file store report internally.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    /// Connection failed, DNS failure, unexpected HTTP status, stream error.
    #[error("network error: {0}")]
    Network(String),

    /// The transport gave up waiting. Always eligible for manual resume.
    #[error("transfer timed out: {0}")]
    Timeout(String),

    /// Local I/O while writing partial data.
    #[error("file system error: {0}")]
    FileSystem(String),

    /// The download finished but could not be moved to its permanent
    /// location. Kept distinct so consumers can tell "download failed"
    /// from "download succeeded but could not be saved".
    #[error("completed download could not be persisted: {0}")]
    Persistence(String),

    /// A resume token that is not empty but cannot be decoded.
    #[error("malformed resume token")]
    BadResumeToken,
}

impl TransferError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn file_system(message: impl Into<String>) -> Self {
        Self::FileSystem(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Whether a retry without operator intervention could plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        Self::file_system(err.to_string())
    }
}

/// Result type for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(TransferError::network("connection reset").is_recoverable());
        assert!(TransferError::Timeout("30s elapsed".into()).is_recoverable());
        assert!(!TransferError::persistence("disk full").is_recoverable());
        assert!(!TransferError::BadResumeToken.is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TransferError = io.into();
        assert!(matches!(err, TransferError::FileSystem(_)));
    }
}
