//! Runner slot kinds.

use super::ParseRunnerKindError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed runner kinds a target connection may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    /// Executes user-defined remote-callable procedures.
    Method,
    /// Runs the post-connect hook script once per mount.
    OnMount,
    /// Applies the user-authored schema-configuration script.
    TableConfig,
}

impl RunnerKind {
    /// Every runner kind, in teardown order.
    pub const ALL: [Self; 3] = [Self::Method, Self::OnMount, Self::TableConfig];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Method => "method",
            Self::OnMount => "on_mount",
            Self::TableConfig => "table_config",
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RunnerKind {
    type Error = ParseRunnerKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "method" => Ok(Self::Method),
            "on_mount" => Ok(Self::OnMount),
            "table_config" => Ok(Self::TableConfig),
            _ => Err(ParseRunnerKindError(value.to_owned())),
        }
    }
}
