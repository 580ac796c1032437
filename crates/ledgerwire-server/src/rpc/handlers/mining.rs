//! Block production control. The gateway has no miner of its own; "mining"
//! maps onto the backend's auto-commit switch.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodHandler;

/// Enable auto-commit.
pub struct StartMiningHandler;

#[async_trait]
impl MethodHandler for StartMiningHandler {
    #[instrument(skip(self, ctx), fields(method = "StartMining"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        ctx.ledger.set_auto_commit(true);
        info!(session = %ctx.session_id, "auto-commit enabled");
        Ok(json!({ "mining": true }))
    }
}

/// Disable auto-commit.
pub struct StopMiningHandler;

#[async_trait]
impl MethodHandler for StopMiningHandler {
    #[instrument(skip(self, ctx), fields(method = "StopMining"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        ctx.ledger.set_auto_commit(false);
        info!(session = %ctx.session_id, "auto-commit disabled");
        Ok(json!({ "mining": false }))
    }
}

/// Whether auto-commit is on.
pub struct IsMiningHandler;

#[async_trait]
impl MethodHandler for IsMiningHandler {
    #[instrument(skip(self, ctx), fields(method = "IsMining"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(json!({ "mining": ctx.ledger.is_auto_commit() }))
    }
}

/// Commit pending transactions into a new block now.
pub struct CommitHandler;

#[async_trait]
impl MethodHandler for CommitHandler {
    #[instrument(skip(self, ctx), fields(method = "Commit"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        ctx.call(ctx.ledger.commit()).await?;
        let count = ctx.call(ctx.ledger.block_count()).await?;
        Ok(json!({ "number": count.saturating_sub(1) }))
    }
}
