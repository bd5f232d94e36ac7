//! Run identifiers.

use derive_more::Display;
use serde::Serialize;
use uuid::Uuid;

/// Identifies one orchestrator invocation in logs and run summaries.
/// Uses UUIDv7 so identifiers sort by start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[display("{_0}")]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// First eight hex digits, enough to tell runs apart in terminal output.
    pub fn short(&self) -> String {
        self.0.simple().to_string().chars().take(8).collect()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}
