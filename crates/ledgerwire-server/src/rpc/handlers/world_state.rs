//! `WorldState`: the streamed snapshot export.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodHandler;
use crate::websocket::snapshot::stream_world_state;

/// Streams the baseline as push messages. Success produces no reply envelope;
/// the `WorldStateDone` push terminates the flow.
pub struct WorldStateHandler;

#[async_trait]
impl MethodHandler for WorldStateHandler {
    #[instrument(skip(self, ctx), fields(method = "WorldState"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let report = stream_world_state(ctx).await?;
        Ok(serde_json::to_value(report)?)
    }

    fn streams_reply(&self) -> bool {
        true
    }
}
