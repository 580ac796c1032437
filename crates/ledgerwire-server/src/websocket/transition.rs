//! Snapshot state and the transition buffer.
//!
//! A session starts in [`SnapshotState::Baseline`]: block events are held in
//! the [`TransitionBuffer`] because the client has no baseline to apply them
//! to. When a WorldState export finishes, [`SnapshotGate::complete_export`]
//! drains the buffer to the client and flips to [`SnapshotState::Live`]
//! under the same lock the bridge takes in [`SnapshotGate::admit`], so no
//! block event can slip between the drain and the flip.

use std::collections::VecDeque;

use ledgerwire_core::summary::BlockSummary;
use metrics::counter;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::metrics::{TRANSITION_BUFFER_EVICTIONS_TOTAL, TRANSITION_BUFFERED_TOTAL};
use crate::rpc::errors::RpcError;
use crate::rpc::types::{RpcResponse, labels};
use crate::websocket::connection::{ClientConnection, OutboundError};

/// Where a session is relative to its first completed WorldState export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotState {
    /// No export has completed; block events are buffered.
    Baseline,
    /// The buffer is being flushed to the client.
    Draining,
    /// Block events go straight to the client.
    Live,
}

/// Kind of export that [`SnapshotGate::begin_export`] admitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportMode {
    /// First export; completing it drains the buffer and goes Live.
    Initial,
    /// Re-export on a Live session; block events keep flowing directly.
    Refresh,
}

/// What the bridge should do with a block event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Send it now.
    Deliver(BlockSummary),
    /// Held until the export completes.
    Buffered,
}

/// Bounded FIFO of block summaries awaiting the Live transition.
#[derive(Debug)]
pub struct TransitionBuffer {
    entries: VecDeque<BlockSummary>,
    capacity: usize,
}

impl TransitionBuffer {
    /// Buffer holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append `summary`, evicting and returning the oldest entry when full.
    pub fn push(&mut self, summary: BlockSummary) -> Option<BlockSummary> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(summary);
        evicted
    }

    /// Remove the oldest entry.
    pub fn pop(&mut self) -> Option<BlockSummary> {
        self.entries.pop_front()
    }

    /// Number of held entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug)]
struct GateState {
    state: SnapshotState,
    buffer: TransitionBuffer,
    exporting: bool,
}

/// Per-session coordination point between the subscription bridge and the
/// WorldState streamer.
#[derive(Debug)]
pub struct SnapshotGate {
    inner: Mutex<GateState>,
}

impl SnapshotGate {
    /// Gate in Baseline with a buffer of `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(GateState {
                state: SnapshotState::Baseline,
                buffer: TransitionBuffer::new(capacity),
                exporting: false,
            }),
        }
    }

    /// Current state.
    pub async fn state(&self) -> SnapshotState {
        self.inner.lock().await.state
    }

    /// Number of buffered block events.
    pub async fn buffered(&self) -> usize {
        self.inner.lock().await.buffer.len()
    }

    /// Whether an export is running.
    pub async fn is_exporting(&self) -> bool {
        self.inner.lock().await.exporting
    }

    /// Route a block event: deliver when Live, otherwise buffer it.
    pub async fn admit(&self, summary: BlockSummary) -> Admission {
        let mut inner = self.inner.lock().await;
        if inner.state == SnapshotState::Live {
            return Admission::Deliver(summary);
        }
        let number = summary.number;
        if let Some(evicted) = inner.buffer.push(summary) {
            counter!(TRANSITION_BUFFER_EVICTIONS_TOTAL).increment(1);
            warn!(
                evicted = evicted.number,
                hash = %evicted.hash,
                capacity = inner.buffer.capacity(),
                "transition buffer full, dropped oldest block event"
            );
        }
        counter!(TRANSITION_BUFFERED_TOTAL).increment(1);
        debug!(number, buffered = inner.buffer.len(), "block event buffered");
        Admission::Buffered
    }

    /// Claim the export slot. Fails while another export is running.
    pub async fn begin_export(&self) -> Result<ExportMode, RpcError> {
        let mut inner = self.inner.lock().await;
        if inner.exporting {
            return Err(RpcError::SnapshotInProgress {
                message: "a WorldState export is already running for this session".into(),
            });
        }
        inner.exporting = true;
        Ok(if inner.state == SnapshotState::Live {
            ExportMode::Refresh
        } else {
            ExportMode::Initial
        })
    }

    /// Release the export slot after a failed export. State and buffer are
    /// left as they were.
    pub async fn abort_export(&self) {
        self.inner.lock().await.exporting = false;
    }

    /// Finish an export: for an initial export, flush buffered block events
    /// as `BlockAdded` pushes and go Live; then send `WorldStateDone`.
    /// Returns the number of flushed events.
    pub async fn complete_export(
        &self,
        mode: ExportMode,
        outbound: &ClientConnection,
    ) -> Result<usize, OutboundError> {
        let mut inner = self.inner.lock().await;
        inner.exporting = false;

        let mut drained = 0;
        if mode == ExportMode::Initial && inner.state != SnapshotState::Live {
            inner.state = SnapshotState::Draining;
            let mut flushed = Ok(());
            while let Some(summary) = inner.buffer.pop() {
                flushed = match RpcResponse::push(labels::BLOCK_ADDED, &summary) {
                    Ok(response) => outbound.write(response).await,
                    Err(e) => Err(e.into()),
                };
                if flushed.is_err() {
                    break;
                }
                drained += 1;
            }
            inner.state = SnapshotState::Live;
            flushed?;
            debug!(drained, "transition buffer drained, session live");
        }

        outbound
            .write(RpcResponse::success(labels::WORLD_STATE_DONE, json!({})))
            .await?;
        Ok(drained)
    }

    /// Drop buffered events. Called when the session closes.
    pub async fn discard(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.buffer.is_empty() {
            debug!(discarded = inner.buffer.len(), "discarding buffered block events");
        }
        inner.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::Outbound;
    use tokio::sync::mpsc;

    fn summary(number: u64) -> BlockSummary {
        BlockSummary {
            number,
            hash: format!("h{number}"),
            prev_hash: None,
            transactions: 0,
            accounts_affected: Vec::new(),
        }
    }

    fn drain_ids(rx: &mut mpsc::Receiver<Outbound>) -> Vec<(String, Option<u64>)> {
        let mut out = Vec::new();
        while let Ok(Outbound::Text(text)) = rx.try_recv() {
            let v: serde_json::Value = serde_json::from_str(&text).unwrap();
            out.push((
                v["id"].as_str().unwrap().to_owned(),
                v["result"]["number"].as_u64(),
            ));
        }
        out
    }

    #[test]
    fn buffer_evicts_oldest() {
        let mut buf = TransitionBuffer::new(2);
        assert!(buf.push(summary(1)).is_none());
        assert!(buf.push(summary(2)).is_none());
        assert_eq!(buf.push(summary(3)).unwrap().number, 1);
        assert_eq!(buf.pop().unwrap().number, 2);
        assert_eq!(buf.pop().unwrap().number, 3);
        assert!(buf.is_empty());
    }

    #[test]
    fn buffer_capacity_at_least_one() {
        assert_eq!(TransitionBuffer::new(0).capacity(), 1);
    }

    #[tokio::test]
    async fn baseline_buffers() {
        let gate = SnapshotGate::new(8);
        assert_eq!(gate.state().await, SnapshotState::Baseline);
        assert_eq!(gate.admit(summary(5)).await, Admission::Buffered);
        assert_eq!(gate.buffered().await, 1);
    }

    #[tokio::test]
    async fn initial_export_drains_then_done() {
        let gate = SnapshotGate::new(8);
        let (conn, mut rx) = ClientConnection::channel("c", 16);
        let _ = gate.admit(summary(5)).await;
        let _ = gate.admit(summary(6)).await;

        let mode = gate.begin_export().await.unwrap();
        assert_eq!(mode, ExportMode::Initial);
        let drained = gate.complete_export(mode, &conn).await.unwrap();
        assert_eq!(drained, 2);
        assert_eq!(gate.state().await, SnapshotState::Live);
        assert_eq!(gate.buffered().await, 0);

        assert_eq!(
            drain_ids(&mut rx),
            vec![
                ("BlockAdded".to_owned(), Some(5)),
                ("BlockAdded".to_owned(), Some(6)),
                ("WorldStateDone".to_owned(), None),
            ]
        );
    }

    #[tokio::test]
    async fn live_delivers_directly() {
        let gate = SnapshotGate::new(8);
        let (conn, _rx) = ClientConnection::channel("c", 16);
        let mode = gate.begin_export().await.unwrap();
        let _ = gate.complete_export(mode, &conn).await.unwrap();
        assert_eq!(gate.admit(summary(9)).await, Admission::Deliver(summary(9)));
        assert_eq!(gate.buffered().await, 0);
    }

    #[tokio::test]
    async fn second_export_rejected_while_running() {
        let gate = SnapshotGate::new(8);
        let _ = gate.begin_export().await.unwrap();
        assert!(gate.is_exporting().await);
        let err = gate.begin_export().await.unwrap_err();
        assert_eq!(err.code(), "SNAPSHOT_IN_PROGRESS");
    }

    #[tokio::test]
    async fn abort_keeps_buffer_for_retry() {
        let gate = SnapshotGate::new(8);
        let _ = gate.admit(summary(5)).await;
        let _ = gate.begin_export().await.unwrap();
        gate.abort_export().await;
        assert_eq!(gate.state().await, SnapshotState::Baseline);
        assert_eq!(gate.buffered().await, 1);
        assert!(!gate.is_exporting().await);
        assert_eq!(gate.begin_export().await.unwrap(), ExportMode::Initial);
    }

    #[tokio::test]
    async fn refresh_export_stays_live() {
        let gate = SnapshotGate::new(8);
        let (conn, mut rx) = ClientConnection::channel("c", 16);
        let mode = gate.begin_export().await.unwrap();
        let _ = gate.complete_export(mode, &conn).await.unwrap();
        let _ = drain_ids(&mut rx);

        let mode = gate.begin_export().await.unwrap();
        assert_eq!(mode, ExportMode::Refresh);
        assert!(matches!(gate.admit(summary(7)).await, Admission::Deliver(_)));
        assert_eq!(gate.complete_export(mode, &conn).await.unwrap(), 0);
        assert_eq!(gate.state().await, SnapshotState::Live);
        assert_eq!(drain_ids(&mut rx), vec![("WorldStateDone".to_owned(), None)]);
    }

    #[tokio::test]
    async fn discard_clears_buffer() {
        let gate = SnapshotGate::new(8);
        let _ = gate.admit(summary(1)).await;
        gate.discard().await;
        assert_eq!(gate.buffered().await, 0);
    }
}
