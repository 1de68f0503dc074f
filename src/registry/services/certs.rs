//! Capability-scoped certificate store.

use crate::connection::domain::{ConnectionId, SslCertificates};
use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io::Write;
use thiserror::Error;

/// File name of the server CA certificate.
const CA_FILE: &str = "ca.pem";
/// File name of the client certificate.
const CERT_FILE: &str = "cert.pem";
/// File name of the client key.
const KEY_FILE: &str = "key.pem";

/// Error surfaced by the certificate store.
#[derive(Debug, Error)]
#[error("certificate store failure: {0}")]
pub struct CertStoreError(#[from] std::io::Error);

/// Writes per-connection certificate material under one root folder.
///
/// All filesystem access goes through a capability handle to the
/// store's own root; nothing outside it is reachable. Files are
/// rewritten wholesale on every persist and carry owner-only
/// permissions.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    root: Utf8PathBuf,
}

impl CertificateStore {
    /// Creates a store rooted at the given folder.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the path of a connection's server CA file.
    #[must_use]
    pub fn ca_path(&self, id: ConnectionId) -> Utf8PathBuf {
        self.root.join(id.to_string()).join(CA_FILE)
    }

    /// Returns the path of a connection's client certificate file.
    #[must_use]
    pub fn cert_path(&self, id: ConnectionId) -> Utf8PathBuf {
        self.root.join(id.to_string()).join(CERT_FILE)
    }

    /// Returns the path of a connection's client key file.
    #[must_use]
    pub fn key_path(&self, id: ConnectionId) -> Utf8PathBuf {
        self.root.join(id.to_string()).join(KEY_FILE)
    }

    fn open_root(&self) -> Result<Dir, CertStoreError> {
        std::fs::create_dir_all(self.root.as_std_path())?;
        Ok(Dir::open_ambient_dir(&self.root, ambient_authority())?)
    }

    /// Persists a connection's certificate material.
    ///
    /// A bundle without any material is a no-op. Existing files for
    /// the connection are replaced wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`CertStoreError`] on filesystem failures.
    pub fn persist(
        &self,
        id: ConnectionId,
        certificates: &SslCertificates,
    ) -> Result<(), CertStoreError> {
        if certificates.is_empty() {
            return Ok(());
        }

        let root = self.open_root()?;
        let folder = id.to_string();
        if root.metadata(&folder).is_ok() {
            root.remove_dir_all(&folder)?;
        }
        root.create_dir_all(&folder)?;

        write_pem(&root, &folder, CA_FILE, certificates.server_ca())?;
        write_pem(&root, &folder, CERT_FILE, certificates.client_certificate())?;
        write_pem(&root, &folder, KEY_FILE, certificates.client_key())?;
        Ok(())
    }

    /// Removes a connection's certificate folder.
    ///
    /// Idempotent: a missing folder is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CertStoreError`] on filesystem failures.
    pub fn remove(&self, id: ConnectionId) -> Result<(), CertStoreError> {
        let root = self.open_root()?;
        let folder = id.to_string();
        if root.metadata(&folder).is_ok() {
            root.remove_dir_all(&folder)?;
        }
        Ok(())
    }
}

fn write_pem(
    root: &Dir,
    folder: &str,
    name: &str,
    pem: Option<&str>,
) -> Result<(), CertStoreError> {
    let Some(pem) = pem else {
        return Ok(());
    };
    let path = format!("{folder}/{name}");
    let mut file = root.create(&path)?;
    file.write_all(pem.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions =
            cap_std::fs::Permissions::from_std(std::fs::Permissions::from_mode(0o600));
        file.set_permissions(permissions)?;
    }

    Ok(())
}
