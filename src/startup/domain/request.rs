//! Start request identity for deduplication.

use crate::connection::domain::{ConnectionDescriptor, DescriptorSignature};

/// A request to start the primary connection.
///
/// The port and host are the admin server's own binding; together with
/// the descriptor signature they form the dedup identity, so two
/// deployments sharing one database remain independent start cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    descriptor: ConnectionDescriptor,
    port: u16,
    host: String,
}

impl StartRequest {
    /// Creates a start request.
    #[must_use]
    pub fn new(descriptor: ConnectionDescriptor, port: u16, host: impl Into<String>) -> Self {
        Self {
            descriptor,
            port,
            host: host.into(),
        }
    }

    /// Returns the raw descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Returns the admin server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the admin server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Dedup identity of an in-flight start cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StartKey {
    signature: DescriptorSignature,
    port: u16,
    host: String,
}

impl StartKey {
    /// Creates a start key.
    #[must_use]
    pub fn new(signature: DescriptorSignature, port: u16, host: impl Into<String>) -> Self {
        Self {
            signature,
            port,
            host: host.into(),
        }
    }

    /// Returns the descriptor signature component.
    #[must_use]
    pub const fn signature(&self) -> &DescriptorSignature {
        &self.signature
    }
}
