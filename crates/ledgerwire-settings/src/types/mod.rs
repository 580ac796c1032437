//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]`. Each type implements
//! [`Default`] with production values, and `#[serde(default)]` lets a user
//! file name only the fields it changes.

mod backend;
mod server;
mod snapshot;

pub use backend::*;
pub use server::*;
pub use snapshot::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "wsPort": 9000 },
///   "snapshot": { "paceIntervalMs": 0 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerwireSettings {
    /// Listener and session settings.
    pub server: ServerSettings,
    /// WorldState export settings.
    pub snapshot: SnapshotSettings,
    /// Backend call settings.
    pub backend: BackendSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl LedgerwireSettings {
    /// Repair values that would stall the gateway, logging each fix.
    pub fn validate(&mut self) {
        if self.server.outbound_queue_depth == 0 {
            tracing::warn!(
                "outbound_queue_depth is 0, using {}",
                ServerSettings::default().outbound_queue_depth
            );
            self.server.outbound_queue_depth = ServerSettings::default().outbound_queue_depth;
        }
        if self.snapshot.max_buffered_blocks == 0 {
            tracing::warn!(
                "max_buffered_blocks is 0, using {}",
                SnapshotSettings::default().max_buffered_blocks
            );
            self.snapshot.max_buffered_blocks = SnapshotSettings::default().max_buffered_blocks;
        }
        if self.logging.level.trim().is_empty() {
            tracing::warn!("logging level is empty, using info");
            self.logging.level = LoggingSettings::default().level;
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `ledgerwire_server=debug,info`.
    pub level: String,
    /// Emit one JSON object per line.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}
