//! Command-line arguments and their precedence over loaded settings.

use std::path::PathBuf;

use clap::Parser;
use ledgerwire_settings::LedgerwireSettings;

/// ledgerwire gateway.
#[derive(Parser, Debug)]
#[command(name = "ledgerwire", about = "WebSocket RPC gateway over a ledger backend")]
pub struct Cli {
    /// Settings file (defaults to `~/.ledgerwire/settings.json`).
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// WebSocket port (0 for auto-assign).
    #[arg(long)]
    pub port: Option<u16>,

    /// Commit every transaction into its own block on submission.
    #[arg(long, default_value_t = false)]
    pub auto_commit: bool,

    /// Log filter directive, e.g. `debug` or `ledgerwire_server=trace`.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    pub json_logs: bool,
}

impl Cli {
    /// Overlay explicit flags onto `settings`. Flags win over file and env.
    pub fn apply(&self, settings: &mut LedgerwireSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.ws_port = port;
        }
        if self.auto_commit {
            settings.backend.auto_commit = true;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }

    /// `host:port` to bind.
    pub fn bind_addr(settings: &LedgerwireSettings) -> String {
        format!("{}:{}", settings.server.host, settings.server.ws_port)
    }
}
