use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backend call settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    /// Deadline for a single backend call. 0 disables the deadline.
    pub call_timeout_ms: u64,
    /// Commit every accepted transaction immediately.
    pub auto_commit: bool,
    /// Balance of the first managed address in the in-memory ledger.
    pub genesis_balance: String,
}

impl BackendSettings {
    /// Call deadline, `None` when disabled.
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            auto_commit: false,
            genesis_balance: "1000000000000".into(),
        }
    }
}
