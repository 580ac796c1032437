//! Backend subscriptions → client pushes.
//!
//! Each session opens one subscription per [`Topic`] under its own keys and
//! runs a single task that waits on all five queues. Block events pass
//! through the session's [`SnapshotGate`]; transaction events go straight
//! to the outbound queue.

use std::sync::Arc;
use std::time::Duration;

use ledgerwire_core::backend::{Ledger, with_deadline};
use ledgerwire_core::errors::LedgerError;
use ledgerwire_core::events::{EventPayload, EventSource, LedgerEvent, Topic};
use ledgerwire_core::ids::{SessionId, SubscriptionKey};
use ledgerwire_core::ledger::Block;
use ledgerwire_core::summary::{BlockSummary, summarize_block};
use metrics::counter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{BRIDGE_EVENTS_DROPPED_TOTAL, BRIDGE_EVENTS_TOTAL};
use crate::rpc::context::RpcContext;
use crate::rpc::types::RpcResponse;
use crate::websocket::connection::ClientConnection;
use crate::websocket::transition::{Admission, SnapshotGate};

/// One session's five subscriptions and the task relaying them.
pub struct SubscriptionBridge {
    session_id: SessionId,
    ledger: Arc<dyn Ledger>,
    keys: Vec<SubscriptionKey>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct Sources {
    new_block: EventSource,
    tx_pre: EventSource,
    tx_pre_fail: EventSource,
    tx_post: EventSource,
    tx_post_fail: EventSource,
}

impl SubscriptionBridge {
    /// Subscribe to every topic and start relaying. If any subscription is
    /// refused, those already opened are released before returning.
    pub fn start(ctx: &RpcContext) -> Result<Self, LedgerError> {
        let mut opened: Vec<EventSource> = Vec::with_capacity(Topic::ALL.len());
        for topic in Topic::ALL {
            let key = SubscriptionKey::new(&ctx.session_id, topic);
            match ctx.ledger.subscribe(&key, topic, "") {
                Ok(source) => opened.push(source),
                Err(e) => {
                    warn!(session_id = %ctx.session_id, %topic, error = %e, "subscription refused");
                    for source in &opened {
                        ctx.ledger.unsubscribe(source.key());
                    }
                    return Err(e);
                }
            }
        }

        let keys: Vec<SubscriptionKey> = opened.iter().map(|s| s.key().clone()).collect();
        let [new_block, tx_pre, tx_pre_fail, tx_post, tx_post_fail]: [EventSource; 5] =
            opened.try_into().map_err(|_| LedgerError::Subscription {
                key: ctx.session_id.to_string(),
                reason: "unexpected subscription count".into(),
            })?;
        let sources = Sources {
            new_block,
            tx_pre,
            tx_pre_fail,
            tx_post,
            tx_post_fail,
        };

        let relay = Relay {
            session_id: ctx.session_id.clone(),
            ledger: Arc::clone(&ctx.ledger),
            gate: Arc::clone(&ctx.gate),
            outbound: Arc::clone(&ctx.outbound),
            call_timeout: ctx.call_timeout(),
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(sources, relay, cancel.clone()));
        info!(session_id = %ctx.session_id, "subscription bridge started");

        Ok(Self {
            session_id: ctx.session_id.clone(),
            ledger: Arc::clone(&ctx.ledger),
            keys,
            cancel,
            task: Some(task),
        })
    }

    /// Subscription keys held by this bridge.
    pub fn keys(&self) -> &[SubscriptionKey] {
        &self.keys
    }

    /// Whether the relay task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the relay task, wait for it to exit, then release every
    /// subscription. Idempotent.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(session_id = %self.session_id, error = %e, "bridge task ended abnormally");
            }
        }
        for key in self.keys.drain(..) {
            self.ledger.unsubscribe(&key);
        }
        debug!(session_id = %self.session_id, "subscription bridge closed");
    }
}

impl Drop for SubscriptionBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
        for key in self.keys.drain(..) {
            self.ledger.unsubscribe(&key);
        }
    }
}

async fn run(mut sources: Sources, relay: Relay, cancel: CancellationToken) {
    loop {
        let (topic, event) = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(event) = sources.new_block.recv() => (Topic::NewBlock, event),
            Some(event) = sources.tx_pre.recv() => (Topic::TxPre, event),
            Some(event) = sources.tx_pre_fail.recv() => (Topic::TxPreFail, event),
            Some(event) = sources.tx_post.recv() => (Topic::TxPost, event),
            Some(event) = sources.tx_post_fail.recv() => (Topic::TxPostFail, event),
            else => {
                debug!(session_id = %relay.session_id, "all subscriptions closed by backend");
                break;
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = relay.relay(topic, event) => {}
        }
    }
}

struct Relay {
    session_id: SessionId,
    ledger: Arc<dyn Ledger>,
    gate: Arc<SnapshotGate>,
    outbound: Arc<ClientConnection>,
    call_timeout: Option<Duration>,
}

impl Relay {
    async fn relay(&self, topic: Topic, event: LedgerEvent) {
        if event.payload.topic() != topic {
            counter!(BRIDGE_EVENTS_DROPPED_TOTAL, "reason" => "topic_mismatch").increment(1);
            warn!(
                session_id = %self.session_id,
                subscribed = %topic,
                payload = %event.payload.topic(),
                source = %event.source,
                "dropping event whose payload does not match its topic"
            );
            return;
        }
        counter!(BRIDGE_EVENTS_TOTAL, "topic" => topic.name()).increment(1);

        let label = topic.push_label();
        let built = match &event.payload {
            EventPayload::BlockAdded(block) => {
                let summary = self.summarize(block).await;
                match self.gate.admit(summary).await {
                    Admission::Deliver(summary) => RpcResponse::push(label, &summary),
                    Admission::Buffered => return,
                }
            }
            EventPayload::TxPre(tx) | EventPayload::TxPost(tx) => RpcResponse::push(label, tx),
            EventPayload::TxPreFailed { tx, reason } | EventPayload::TxPostFailed { tx, reason } => {
                RpcResponse::failed_push(label, tx, reason)
            }
        };
        let response = match built {
            Ok(response) => response,
            Err(e) => {
                counter!(BRIDGE_EVENTS_DROPPED_TOTAL, "reason" => "serialize").increment(1);
                warn!(
                    session_id = %self.session_id,
                    %topic,
                    error = %e,
                    "dropping event that failed to serialize"
                );
                return;
            }
        };

        if let Err(e) = self.outbound.write(response).await {
            counter!(BRIDGE_EVENTS_DROPPED_TOTAL, "reason" => "closed").increment(1);
            debug!(session_id = %self.session_id, %topic, error = %e, "dropping event for closed connection");
        }
    }

    async fn summarize(&self, block: &Block) -> BlockSummary {
        match with_deadline(self.call_timeout, summarize_block(self.ledger.as_ref(), block)).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    number = block.number,
                    error = %e,
                    "account lookup failed, relaying block without deltas"
                );
                BlockSummary::from_block(block)
            }
        }
    }
}
