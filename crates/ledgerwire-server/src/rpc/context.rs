//! Per-session context handed to every method handler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ledgerwire_core::backend::{Ledger, with_deadline};
use ledgerwire_core::errors::LedgerError;
use ledgerwire_core::ids::SessionId;
use ledgerwire_settings::LedgerwireSettings;

use crate::rpc::errors::RpcError;
use crate::websocket::connection::ClientConnection;
use crate::websocket::transition::SnapshotGate;

/// Everything a handler may touch while serving one session.
#[derive(Clone)]
pub struct RpcContext {
    /// Owning session.
    pub session_id: SessionId,
    /// Backend.
    pub ledger: Arc<dyn Ledger>,
    /// The session's ordered outbound queue.
    pub outbound: Arc<ClientConnection>,
    /// Snapshot state shared with the subscription bridge.
    pub gate: Arc<SnapshotGate>,
    /// Effective settings.
    pub settings: Arc<LedgerwireSettings>,
}

impl RpcContext {
    /// Deadline applied to each backend call.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.settings.backend.call_timeout()
    }

    /// Await a backend call under the configured deadline, mapping failures
    /// into the RPC taxonomy.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        with_deadline(self.call_timeout(), fut).await.map_err(RpcError::from)
    }
}
