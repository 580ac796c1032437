//! Inbound frame handling.

use metrics::counter;
use tracing::{debug, warn};

use crate::metrics::RPC_MALFORMED_TOTAL;
use crate::rpc::errors::RpcError;
use crate::rpc::types::RpcRequest;
use crate::websocket::session::Session;

/// What the read loop should do after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// Close the session.
    Close,
}

/// Parse one text frame, dispatch it, and enqueue the reply.
///
/// Malformed frames are logged and skipped. Unknown methods are logged and
/// close the session only when `close_on_unknown` is set.
pub async fn handle_text(session: &Session, text: &str, close_on_unknown: bool) -> Flow {
    let request: RpcRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            counter!(RPC_MALFORMED_TOTAL).increment(1);
            warn!(session_id = %session.id(), error = %e, "discarding malformed request");
            return Flow::Continue;
        }
    };

    match session.dispatch(request).await {
        Ok(Some(response)) => {
            if let Err(e) = session.outbound().write(response).await {
                debug!(session_id = %session.id(), error = %e, "reply dropped, connection closed");
                return Flow::Close;
            }
            Flow::Continue
        }
        Ok(None) => Flow::Continue,
        Err(RpcError::MethodNotFound { method }) => {
            warn!(session_id = %session.id(), %method, "method not supported");
            if close_on_unknown {
                Flow::Close
            } else {
                Flow::Continue
            }
        }
        Err(e) => {
            warn!(session_id = %session.id(), code = e.code(), error = %e, "request failed");
            Flow::Continue
        }
    }
}
