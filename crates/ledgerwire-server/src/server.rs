//! Axum router and serve loop.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use ledgerwire_core::backend::Ledger;
use ledgerwire_settings::LedgerwireSettings;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::websocket::connection::serve_socket;
use crate::websocket::sessions::SessionManager;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Backend shared by every session.
    pub ledger: Arc<dyn Ledger>,
    /// Effective settings.
    pub settings: Arc<LedgerwireSettings>,
    /// Live sessions.
    pub sessions: Arc<SessionManager>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Fires on server shutdown.
    pub shutdown: CancellationToken,
    /// When the server started.
    pub start_time: Instant,
}

impl AppState {
    /// State with an empty session manager and no metrics handle.
    pub fn new(ledger: Arc<dyn Ledger>, settings: LedgerwireSettings) -> Self {
        Self {
            ledger,
            settings: Arc::new(settings),
            sessions: Arc::new(SessionManager::new()),
            metrics: None,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the server answers.
    pub status: &'static str,
    /// Open sessions.
    pub sessions: usize,
    /// Seconds since start.
    pub uptime_secs: u64,
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `state.shutdown` fires, then close every session.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    let shutdown = state.shutdown.clone();
    let sessions = Arc::clone(&state.sessions);
    info!(%addr, "ledgerwire server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    sessions.close_all().await;
    info!("server stopped");
    Ok(())
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    serve_socket(
        socket,
        state.ledger,
        state.settings,
        state.sessions,
        state.shutdown,
    )
    .await;
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.sessions.session_count(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => crate::metrics::render(&handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
