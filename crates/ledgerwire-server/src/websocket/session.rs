//! Per-connection session.
//!
//! A session owns its method registry, its subscription bridge and its
//! snapshot gate. Nothing is shared between sessions except the backend.

use std::sync::Arc;

use ledgerwire_core::backend::Ledger;
use ledgerwire_core::errors::LedgerError;
use ledgerwire_core::ids::SessionId;
use ledgerwire_settings::LedgerwireSettings;
use tokio::sync::Mutex;
use tracing::info;

use crate::rpc::context::RpcContext;
use crate::rpc::dispatcher::Dispatcher;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::register_default_methods;
use crate::rpc::registry::MethodRegistry;
use crate::rpc::types::{RpcRequest, RpcResponse};
use crate::websocket::connection::ClientConnection;
use crate::websocket::event_bridge::SubscriptionBridge;
use crate::websocket::transition::SnapshotGate;

/// Errors opening a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The default method set could not be registered.
    #[error("failed to register methods: {0}")]
    Registry(#[from] RpcError),
    /// The backend refused a subscription.
    #[error("failed to subscribe: {0}")]
    Subscribe(#[from] LedgerError),
}

/// One client's gateway state.
pub struct Session {
    context: RpcContext,
    dispatcher: Dispatcher,
    bridge: Mutex<Option<SubscriptionBridge>>,
}

impl Session {
    /// Open a session with a fresh ID.
    pub fn open(
        ledger: Arc<dyn Ledger>,
        settings: Arc<LedgerwireSettings>,
        outbound: Arc<ClientConnection>,
    ) -> Result<Arc<Self>, SessionError> {
        Self::open_with_id(SessionId::new(), ledger, settings, outbound)
    }

    /// Open a session: register the default methods, then subscribe to
    /// every backend topic.
    pub fn open_with_id(
        id: SessionId,
        ledger: Arc<dyn Ledger>,
        settings: Arc<LedgerwireSettings>,
        outbound: Arc<ClientConnection>,
    ) -> Result<Arc<Self>, SessionError> {
        let gate = Arc::new(SnapshotGate::new(settings.snapshot.max_buffered_blocks));
        let context = RpcContext {
            session_id: id,
            ledger,
            outbound,
            gate,
            settings,
        };

        let registry = Arc::new(MethodRegistry::new());
        register_default_methods(&registry)?;
        let bridge = SubscriptionBridge::start(&context)?;

        info!(session_id = %context.session_id, methods = registry.len(), "session opened");
        Ok(Arc::new(Self {
            context,
            dispatcher: Dispatcher::new(registry),
            bridge: Mutex::new(Some(bridge)),
        }))
    }

    /// Session ID.
    pub fn id(&self) -> &SessionId {
        &self.context.session_id
    }

    /// Handler context.
    pub fn context(&self) -> &RpcContext {
        &self.context
    }

    /// This session's method registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        self.dispatcher.registry()
    }

    /// Outbound queue.
    pub fn outbound(&self) -> &Arc<ClientConnection> {
        &self.context.outbound
    }

    /// Snapshot gate.
    pub fn gate(&self) -> &Arc<SnapshotGate> {
        &self.context.gate
    }

    /// Dispatch one request. See [`Dispatcher::dispatch`].
    pub async fn dispatch(&self, request: RpcRequest) -> Result<Option<RpcResponse>, RpcError> {
        self.dispatcher.dispatch(request, &self.context).await
    }

    /// Whether [`close`](Self::close) has run.
    pub async fn is_closed(&self) -> bool {
        self.bridge.lock().await.is_none()
    }

    /// Stop the bridge and wait for it, release subscriptions, clear the
    /// registry and drop buffered events. Idempotent.
    pub async fn close(&self) {
        let bridge = self.bridge.lock().await.take();
        let Some(mut bridge) = bridge else {
            return;
        };
        bridge.close().await;
        self.registry().clear();
        self.gate().discard().await;
        info!(session_id = %self.id(), "session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryLedger;
    use crate::rpc::handlers::test_helpers::{recv_all, recv_next, test_settings};
    use crate::rpc::types::labels;
    use crate::websocket::transition::SnapshotState;
    use ledgerwire_core::events::EventPayload;
    use serde_json::json;
    use std::time::Duration;

    fn open(ledger: &Arc<MemoryLedger>) -> (Arc<Session>, tokio::sync::mpsc::Receiver<crate::websocket::connection::Outbound>) {
        let (conn, rx) = ClientConnection::channel("test", 1024);
        let session = Session::open(
            Arc::clone(ledger) as Arc<dyn Ledger>,
            Arc::new(test_settings()),
            Arc::new(conn),
        )
        .unwrap();
        (session, rx)
    }

    async fn wait_buffered(session: &Session, n: usize) {
        for _ in 0..200 {
            if session.gate().buffered().await >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("bridge never buffered {n} events");
    }

    #[tokio::test]
    async fn open_registers_methods_and_subscribes() {
        let ledger = Arc::new(MemoryLedger::default());
        let (session, _rx) = open(&ledger);
        assert!(session.registry().contains("WorldState"));
        assert!(session.registry().contains("Transact"));
        assert_eq!(ledger.subscriber_count(), 5);
        session.close().await;
    }

    #[tokio::test]
    async fn close_releases_everything() {
        let ledger = Arc::new(MemoryLedger::default());
        let (session, _rx) = open(&ledger);
        ledger.commit().await.unwrap();
        wait_buffered(&session, 1).await;

        session.close().await;
        assert!(session.is_closed().await);
        assert_eq!(ledger.subscriber_count(), 0);
        assert!(session.registry().is_empty());
        assert_eq!(session.gate().buffered().await, 0);
        session.close().await;
    }

    #[tokio::test]
    async fn closed_session_gets_no_more_events() {
        let ledger = Arc::new(MemoryLedger::default());
        let (session, mut rx) = open(&ledger);
        session.close().await;
        ledger.commit().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn buffered_block_delivered_once_after_world_state() {
        let ledger = Arc::new(MemoryLedger::default());
        for _ in 0..4 {
            ledger.commit().await.unwrap();
        }
        let (session, mut rx) = open(&ledger);

        ledger.commit().await.unwrap();
        wait_buffered(&session, 1).await;
        let head = ledger.latest_block_hash().await.unwrap();

        let reply = session.dispatch(RpcRequest::new("WorldState", None)).await.unwrap();
        assert!(reply.is_none());
        assert_eq!(session.gate().state().await, SnapshotState::Live);

        ledger.commit().await.unwrap();
        let mut msgs = recv_all(&mut rx);
        while !msgs.iter().any(|m| m["id"] == "BlockAdded" && m["result"]["number"] == 6) {
            msgs.push(recv_next(&mut rx).await);
        }

        let ids: Vec<&str> = msgs.iter().map(|m| m["id"].as_str().unwrap()).collect();
        let last_plain = ids.iter().rposition(|id| *id == "Blocks").unwrap();
        let done = ids.iter().position(|id| *id == "WorldStateDone").unwrap();
        let added: Vec<(usize, u64)> = msgs
            .iter()
            .enumerate()
            .filter(|(_, m)| m["id"] == "BlockAdded")
            .map(|(i, m)| (i, m["result"]["number"].as_u64().unwrap()))
            .collect();

        assert_eq!(added.len(), 2);
        assert_eq!(added[0].1, 5);
        assert_eq!(msgs[added[0].0]["result"]["hash"], json!(head));
        assert!(added[0].0 > last_plain && added[0].0 < done);
        assert_eq!(added[1].1, 6);
        assert!(added[1].0 > done);

        let blocks: Vec<u64> = msgs
            .iter()
            .filter(|m| m["id"] == "Blocks")
            .map(|m| m["result"]["number"].as_u64().unwrap())
            .collect();
        assert_eq!(blocks, [0, 1, 2, 3, 4, 5]);
        session.close().await;
    }

    #[tokio::test]
    async fn aborted_world_state_reports_error_then_retry_delivers_buffered_once() {
        let ledger = Arc::new(MemoryLedger::default());
        let genesis_hash = ledger.latest_block_hash().await.unwrap();
        let (session, mut rx) = open(&ledger);

        ledger.commit().await.unwrap();
        wait_buffered(&session, 1).await;

        let genesis = ledger.remove_block(&genesis_hash).unwrap();
        let reply = session
            .dispatch(RpcRequest::new("WorldState", None))
            .await
            .unwrap()
            .expect("aborted export replies with an error");
        assert_eq!(reply.id, labels::WORLD_STATE);
        assert!(reply.result.is_none());
        assert_eq!(reply.error.as_ref().unwrap()["code"], "SNAPSHOT_WALK");
        assert!(recv_all(&mut rx).iter().all(|m| m["id"] != labels::WORLD_STATE_DONE));
        assert_eq!(session.gate().state().await, SnapshotState::Baseline);
        assert_eq!(session.gate().buffered().await, 1);

        ledger.restore_block(genesis);
        let reply = session.dispatch(RpcRequest::new("WorldState", None)).await.unwrap();
        assert!(reply.is_none());
        assert_eq!(session.gate().state().await, SnapshotState::Live);

        let msgs = recv_all(&mut rx);
        let added: Vec<u64> = msgs
            .iter()
            .filter(|m| m["id"] == labels::BLOCK_ADDED)
            .map(|m| m["result"]["number"].as_u64().unwrap())
            .collect();
        assert_eq!(added, [1]);
        let done = msgs.iter().filter(|m| m["id"] == labels::WORLD_STATE_DONE).count();
        assert_eq!(done, 1);
        session.close().await;
    }

    #[tokio::test]
    async fn tx_events_flow_in_baseline() {
        let ledger = Arc::new(MemoryLedger::default());
        let (session, mut rx) = open(&ledger);
        assert_eq!(session.gate().state().await, SnapshotState::Baseline);
        ledger.publish(EventPayload::TxPre(ledgerwire_core::ledger::Transaction {
            hash: "t".into(),
            nonce: 0,
            sender: "a".into(),
            recipient: "b".into(),
            value: "0".into(),
            gas: String::new(),
            gas_cost: String::new(),
            data: vec![],
            contract_creation: false,
        }))
        .await;
        assert_eq!(recv_next(&mut rx).await["id"], "TxPre");
        session.close().await;
    }
}
