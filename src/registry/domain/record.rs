//! Persisted connection record consumed by the registry.

use crate::connection::domain::{ConnectionDescriptor, ConnectionId};
use serde::{Deserialize, Serialize};

/// The stored connection row this subsystem reads.
///
/// Supplied by the surrounding application's storage layer; the
/// registry treats it as read-only input. Script sources are opaque
/// text — compiling them is out of scope here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    id: ConnectionId,
    name: String,
    descriptor: ConnectionDescriptor,
    on_mount_source: Option<String>,
    on_mount_disabled: bool,
    table_config_source: Option<String>,
    table_config_disabled: bool,
    watch_schema: bool,
}

impl ConnectionRecord {
    /// Creates a record for a descriptor.
    #[must_use]
    pub fn new(
        id: ConnectionId,
        name: impl Into<String>,
        descriptor: ConnectionDescriptor,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            descriptor,
            on_mount_source: None,
            on_mount_disabled: false,
            table_config_source: None,
            table_config_disabled: false,
            watch_schema: false,
        }
    }

    /// Sets the post-connect hook source.
    #[must_use]
    pub fn with_on_mount_source(mut self, source: impl Into<String>) -> Self {
        self.on_mount_source = Some(source.into());
        self
    }

    /// Disables the post-connect hook.
    #[must_use]
    pub const fn with_on_mount_disabled(mut self, disabled: bool) -> Self {
        self.on_mount_disabled = disabled;
        self
    }

    /// Sets the schema-configuration source.
    #[must_use]
    pub fn with_table_config_source(mut self, source: impl Into<String>) -> Self {
        self.table_config_source = Some(source.into());
        self
    }

    /// Disables the schema-configuration script.
    #[must_use]
    pub const fn with_table_config_disabled(mut self, disabled: bool) -> Self {
        self.table_config_disabled = disabled;
        self
    }

    /// Enables schema watching for this connection.
    #[must_use]
    pub const fn with_watch_schema(mut self, watch: bool) -> Self {
        self.watch_schema = watch;
        self
    }

    /// Returns the connection identity.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Returns the post-connect hook source, when present.
    #[must_use]
    pub fn on_mount_source(&self) -> Option<&str> {
        self.on_mount_source.as_deref()
    }

    /// Returns whether the post-connect hook is disabled.
    #[must_use]
    pub const fn on_mount_disabled(&self) -> bool {
        self.on_mount_disabled
    }

    /// Returns the schema-configuration source, when present.
    #[must_use]
    pub fn table_config_source(&self) -> Option<&str> {
        self.table_config_source.as_deref()
    }

    /// Returns whether the schema-configuration script is disabled.
    #[must_use]
    pub const fn table_config_disabled(&self) -> bool {
        self.table_config_disabled
    }

    /// Returns whether schema watching is enabled.
    #[must_use]
    pub const fn watch_schema(&self) -> bool {
        self.watch_schema
    }
}
