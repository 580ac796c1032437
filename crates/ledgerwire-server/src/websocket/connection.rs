//! Per-connection plumbing.
//!
//! Every envelope a session produces goes through one bounded queue owned by
//! a [`ClientConnection`]; a single writer task drains it into the socket, so
//! messages reach the client in the order they were enqueued. A full queue
//! makes producers wait.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use ledgerwire_core::backend::Ledger;
use ledgerwire_core::time::wire_timestamp;
use ledgerwire_settings::LedgerwireSettings;
use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::rpc::types::RpcResponse;
use crate::websocket::handler::{Flow, handle_text};
use crate::websocket::session::Session;
use crate::websocket::sessions::SessionManager;

/// Item on the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized envelope.
    Text(String),
    /// Close the socket after everything queued before it.
    Close,
}

/// Errors writing to the outbound queue.
#[derive(Debug, thiserror::Error)]
pub enum OutboundError {
    /// The writer task is gone.
    #[error("connection {0} is closed")]
    Closed(String),
    /// The envelope could not be serialized.
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Sending half of a connection's outbound queue.
#[derive(Debug)]
pub struct ClientConnection {
    /// Connection ID (the owning session's ID).
    pub id: String,
    tx: mpsc::Sender<Outbound>,
    sent: AtomicU64,
}

impl ClientConnection {
    /// Wrap an existing sender.
    pub fn new(id: impl Into<String>, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id: id.into(),
            tx,
            sent: AtomicU64::new(0),
        }
    }

    /// Connection with a fresh queue of `depth` entries.
    pub fn channel(id: impl Into<String>, depth: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self::new(id, tx), rx)
    }

    /// Stamp `response` and enqueue it, waiting while the queue is full.
    pub async fn write(&self, mut response: RpcResponse) -> Result<(), OutboundError> {
        response.timestamp = wire_timestamp();
        let text = serde_json::to_string(&response)?;
        self.tx
            .send(Outbound::Text(text))
            .await
            .map_err(|_| OutboundError::Closed(self.id.clone()))?;
        let _ = self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Enqueue a close signal behind everything already queued.
    pub async fn write_close(&self) -> Result<(), OutboundError> {
        self.tx
            .send(Outbound::Close)
            .await
            .map_err(|_| OutboundError::Closed(self.id.clone()))
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Envelopes enqueued so far.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

/// Drain `rx` into `sink` until the queue closes, a close signal arrives, or
/// the sink fails.
pub async fn run_writer<S>(conn_id: String, mut rx: mpsc::Receiver<Outbound>, mut sink: S)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!(conn_id, error = %e, "socket write failed, stopping writer");
                    break;
                }
            }
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
    rx.close();
    let _ = sink.close().await;
    debug!(conn_id, "writer stopped");
}

/// Serve one upgraded socket until the client leaves or `shutdown` fires.
pub async fn serve_socket(
    socket: WebSocket,
    ledger: Arc<dyn Ledger>,
    settings: Arc<LedgerwireSettings>,
    sessions: Arc<SessionManager>,
    shutdown: CancellationToken,
) {
    let started = Instant::now();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);

    let (sink, mut stream) = socket.split();
    let session_id = ledgerwire_core::ids::SessionId::new();
    let (conn, rx) = ClientConnection::channel(
        session_id.as_str(),
        settings.server.outbound_queue_depth,
    );
    let outbound = Arc::new(conn);
    let writer = tokio::spawn(run_writer(session_id.to_string(), rx, sink));

    let close_on_unknown = settings.server.close_on_unknown_method;
    let session = match Session::open_with_id(session_id, ledger, settings, Arc::clone(&outbound)) {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "failed to open session");
            let _ = outbound.write_close().await;
            drop(outbound);
            let _ = writer.await;
            counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
            return;
        }
    };
    sessions.add(Arc::clone(&session)).await;
    info!(session_id = %session.id(), "client connected");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                debug!(session_id = %session.id(), "server shutting down");
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if handle_text(&session, text.as_str(), close_on_unknown).await == Flow::Close {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session_id = %session.id(), error = %e, "socket read failed");
                    break;
                }
            }
        }
    }

    let _ = sessions.remove(session.id()).await;
    session.close().await;
    let _ = outbound.write_close().await;
    drop(session);
    drop(outbound);
    let _ = writer.await;

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    info!("client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn write_stamps_and_serializes() {
        let (conn, mut rx) = ClientConnection::channel("c1", 4);
        let mut resp = RpcResponse::success("X", json!(1));
        resp.timestamp = 0;
        conn.write(resp).await.unwrap();
        let Outbound::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text");
        };
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["id"], "X");
        assert!(v["timestamp"].as_i64().unwrap() > 0);
        assert_eq!(conn.sent_count(), 1);
    }

    #[tokio::test]
    async fn write_after_receiver_dropped_fails() {
        let (conn, rx) = ClientConnection::channel("c1", 4);
        drop(rx);
        assert!(conn.is_closed());
        let err = conn.write(RpcResponse::success("X", json!(1))).await.unwrap_err();
        assert!(matches!(err, OutboundError::Closed(ref id) if id == "c1"));
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure() {
        let (conn, mut rx) = ClientConnection::channel("c1", 1);
        conn.write(RpcResponse::success("A", json!(1))).await.unwrap();
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            conn.write(RpcResponse::success("B", json!(2))),
        )
        .await;
        assert!(blocked.is_err());
        let _ = rx.recv().await.unwrap();
        conn.write(RpcResponse::success("C", json!(3))).await.unwrap();
    }

    #[tokio::test]
    async fn writer_preserves_order_and_stops_on_close() {
        let (conn, rx) = ClientConnection::channel("c1", 8);
        let (sink, mut frames) = futures::channel::mpsc::unbounded::<Message>();
        let writer = tokio::spawn(run_writer("c1".into(), rx, sink));

        for i in 0..5 {
            conn.write(RpcResponse::success(format!("M{i}"), json!(i))).await.unwrap();
        }
        conn.write_close().await.unwrap();
        writer.await.unwrap();

        for i in 0..5 {
            let Some(Message::Text(text)) = frames.next().await else {
                panic!("expected text frame");
            };
            let v: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(v["id"], format!("M{i}"));
        }
        assert!(matches!(frames.next().await, Some(Message::Close(None))));
        assert!(conn.write(RpcResponse::success("late", json!(0))).await.is_err());
    }
}
