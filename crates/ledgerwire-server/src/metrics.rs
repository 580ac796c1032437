//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// RPC requests total (counter, labels: method).
pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
/// RPC errors total (counter, labels: method, `error_type`).
pub const RPC_ERRORS_TOTAL: &str = "rpc_errors_total";
/// RPC request duration seconds (histogram, labels: method).
pub const RPC_REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";
/// Requests discarded because they were not valid envelopes (counter).
pub const RPC_MALFORMED_TOTAL: &str = "rpc_malformed_total";
/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// WebSocket connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Active sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Backend events relayed to clients (counter, labels: topic).
pub const BRIDGE_EVENTS_TOTAL: &str = "bridge_events_total";
/// Backend events dropped by the bridge (counter, labels: reason).
pub const BRIDGE_EVENTS_DROPPED_TOTAL: &str = "bridge_events_dropped_total";
/// WorldState exports (counter, labels: outcome).
pub const SNAPSHOT_EXPORTS_TOTAL: &str = "snapshot_exports_total";
/// WorldState export duration seconds (histogram).
pub const SNAPSHOT_EXPORT_DURATION_SECONDS: &str = "snapshot_export_duration_seconds";
/// Block events held back while a snapshot is pending (counter).
pub const TRANSITION_BUFFERED_TOTAL: &str = "transition_buffered_total";
/// Buffered block events evicted because the buffer was full (counter).
pub const TRANSITION_BUFFER_EVICTIONS_TOTAL: &str = "transition_buffer_evictions_total";
