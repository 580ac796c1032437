use std::time::Duration;

use serde::{Deserialize, Serialize};

/// WorldState export settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotSettings {
    /// Pause between exported messages. 0 disables pacing.
    pub pace_interval_ms: u64,
    /// Block events held while an export is pending. The oldest entry is
    /// evicted when full.
    pub max_buffered_blocks: usize,
}

impl SnapshotSettings {
    /// Pacing interval as a [`Duration`].
    pub fn pace_interval(&self) -> Duration {
        Duration::from_millis(self.pace_interval_ms)
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            pace_interval_ms: 1,
            max_buffered_blocks: 10_000,
        }
    }
}
