//! Derived per-connection storage paths.

use crate::connection::domain::ConnectionId;
use camino::Utf8PathBuf;

/// HTTP path prefix under which connection sessions are mounted.
pub const API_PATH: &str = "/api/db";

/// Folder under the storage root holding certificate material.
const CERTIFICATES_FOLDER: &str = "certificates";

/// Folder under the storage root holding per-connection media files.
const MEDIA_FOLDER: &str = "media";

/// Derives the storage locations owned by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    root: Utf8PathBuf,
}

impl StoragePaths {
    /// Creates storage paths rooted at the application data
    /// directory.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the storage root.
    #[must_use]
    pub fn root(&self) -> &Utf8PathBuf {
        &self.root
    }

    /// Returns the HTTP session path for a connection's dashboard
    /// socket.
    #[must_use]
    pub fn session_path(&self, id: ConnectionId) -> String {
        format!("{API_PATH}/{id}-dashboard/s")
    }

    /// Returns the root of all per-connection media folders.
    #[must_use]
    pub fn media_root(&self) -> Utf8PathBuf {
        self.root.join(MEDIA_FOLDER)
    }

    /// Returns the media folder for one connection.
    #[must_use]
    pub fn media_dir(&self, id: ConnectionId) -> Utf8PathBuf {
        self.media_root().join(id.to_string())
    }

    /// Returns the root of all certificate folders.
    #[must_use]
    pub fn certificates_root(&self) -> Utf8PathBuf {
        self.root.join(CERTIFICATES_FOLDER)
    }

    /// Returns the certificate folder for one connection.
    #[must_use]
    pub fn certificates_dir(&self, id: ConnectionId) -> Utf8PathBuf {
        self.certificates_root().join(id.to_string())
    }
}
