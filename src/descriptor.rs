//! Remote file identity and descriptor types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a remote file.
///
/// Used to correlate registry entries, transport task callbacks and
/// lifecycle events. At most one transfer is active per identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque record describing a remote file: a stable identity plus a
/// resolvable transfer URL.
///
/// How the descriptor is produced (directory listings, metadata caches)
/// is a concern of the surrounding application. The URL may be absent,
/// in which case `start` is a logged no-op.
#[derive(Debug, Clone)]
pub struct RemoteFileDescriptor {
    identity: FileId,
    url: Option<String>,
}

impl RemoteFileDescriptor {
    pub fn new(identity: impl Into<FileId>, url: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            url: Some(url.into()),
        }
    }

    /// A descriptor whose remote side exposes no fetchable URL.
    pub fn without_url(identity: impl Into<FileId>) -> Self {
        Self {
            identity: identity.into(),
            url: None,
        }
    }

    pub fn identity(&self) -> &FileId {
        &self.identity
    }

    pub fn resolved_url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_url_resolution() {
        let with = RemoteFileDescriptor::new("srv/a.bin", "http://host/a.bin");
        assert_eq!(with.identity().as_str(), "srv/a.bin");
        assert_eq!(with.resolved_url(), Some("http://host/a.bin"));

        let without = RemoteFileDescriptor::without_url("srv/b.bin");
        assert!(without.resolved_url().is_none());
    }
}
