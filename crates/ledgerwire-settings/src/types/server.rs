use serde::{Deserialize, Serialize};

/// Listener and per-session settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// WebSocket listener port.
    pub ws_port: u16,
    /// Capacity of each session's outbound queue. A full queue applies
    /// backpressure to every producer of that session.
    pub outbound_queue_depth: usize,
    /// Close the session when a client calls a method that is not registered.
    pub close_on_unknown_method: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            ws_port: 8546,
            outbound_queue_depth: 256,
            close_on_unknown_method: false,
        }
    }
}
