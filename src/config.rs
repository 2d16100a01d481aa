//! Configuration for the transfer subsystem

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Transfer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Directory for completed downloads; partial data lives in a
    /// `.partial` subdirectory underneath it.
    #[serde(default = "default_download_root")]
    pub download_root: PathBuf,

    /// Per-request timeout in seconds, enforced by the transport.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Minimum received-byte delta between progress signals. The final
    /// byte count is always reported regardless of the step.
    #[serde(default = "default_progress_step")]
    pub progress_step_bytes: u64,
}

fn default_download_root() -> PathBuf {
    std::env::temp_dir().join("offload")
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_progress_step() -> u64 {
    64 * 1024
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_root: default_download_root(),
            timeout_seconds: default_timeout(),
            progress_step_bytes: default_progress_step(),
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_download_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.download_root = root.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_progress_step(mut self, bytes: u64) -> Self {
        self.progress_step_bytes = bytes;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Supported variables:
    /// - OFFLOAD_DOWNLOAD_ROOT: directory path
    /// - OFFLOAD_TIMEOUT: seconds
    /// - OFFLOAD_PROGRESS_STEP: bytes
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = std::env::var("OFFLOAD_DOWNLOAD_ROOT") {
            config.download_root = PathBuf::from(root);
        }

        if let Ok(timeout) = std::env::var("OFFLOAD_TIMEOUT") {
            if let Ok(seconds) = timeout.parse() {
                config.timeout_seconds = seconds;
            }
        }

        if let Ok(step) = std::env::var("OFFLOAD_PROGRESS_STEP") {
            if let Ok(bytes) = step.parse() {
                config.progress_step_bytes = bytes;
            }
        }

        config
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize configuration to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransferConfig::default();
        assert_eq!(config.timeout_seconds, 300);
        assert_eq!(config.progress_step_bytes, 64 * 1024);
    }

    #[test]
    fn test_builder_pattern() {
        let config = TransferConfig::new()
            .with_download_root("/data/offline")
            .with_timeout(600)
            .with_progress_step(4096);

        assert_eq!(config.download_root, PathBuf::from("/data/offline"));
        assert_eq!(config.timeout_seconds, 600);
        assert_eq!(config.progress_step_bytes, 4096);
    }

    #[test]
    fn test_json_round_trip() {
        let config = TransferConfig::new().with_timeout(42);
        let json = config.to_json().unwrap();
        let parsed = TransferConfig::from_json(&json).unwrap();
        assert_eq!(parsed.timeout_seconds, 42);
        assert_eq!(parsed.download_root, config.download_root);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed = TransferConfig::from_json(r#"{"timeout_seconds": 10}"#).unwrap();
        assert_eq!(parsed.timeout_seconds, 10);
        assert_eq!(parsed.progress_step_bytes, 64 * 1024);
    }
}
