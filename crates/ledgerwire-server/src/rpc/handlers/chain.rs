//! Chain queries: balance, head number, blocks, accounts.

use async_trait::async_trait;
use ledgerwire_core::summary::summarize_block;
use serde_json::{Value, json};
use tracing::instrument;

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::require_string_param;
use crate::rpc::registry::MethodHandler;

/// Balance of the active address.
pub struct MyBalanceHandler;

#[async_trait]
impl MethodHandler for MyBalanceHandler {
    #[instrument(skip(self, ctx), fields(method = "MyBalance"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let address = ctx.ledger.active_address();
        let balance = ctx
            .call(ctx.ledger.account(&address))
            .await?
            .map_or_else(|| "0".to_owned(), |account| account.balance);
        Ok(json!({ "address": address, "balance": balance }))
    }
}

/// Number of the current head block.
pub struct LastBlockNumberHandler;

#[async_trait]
impl MethodHandler for LastBlockNumberHandler {
    #[instrument(skip(self, ctx), fields(method = "LastBlockNumber"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let count = ctx.call(ctx.ledger.block_count()).await?;
        let number = count.checked_sub(1).ok_or_else(|| RpcError::NotFound {
            message: "Chain has no blocks".into(),
        })?;
        Ok(json!({ "number": number }))
    }
}

/// Full block by hash.
pub struct BlockByHashHandler;

#[async_trait]
impl MethodHandler for BlockByHashHandler {
    #[instrument(skip(self, ctx), fields(method = "BlockByHash"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let hash = require_string_param(params.as_ref(), "hash")?;
        let block = ctx
            .call(ctx.ledger.block(&hash))
            .await?
            .ok_or_else(|| RpcError::NotFound {
                message: format!("No block with hash: {hash}"),
            })?;
        Ok(serde_json::to_value(&block)?)
    }
}

/// Block summary with account deltas.
pub struct BlockMiniByHashHandler;

#[async_trait]
impl MethodHandler for BlockMiniByHashHandler {
    #[instrument(skip(self, ctx), fields(method = "BlockMiniByHash"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let hash = require_string_param(params.as_ref(), "hash")?;
        let block = ctx
            .call(ctx.ledger.block(&hash))
            .await?
            .ok_or_else(|| RpcError::NotFound {
                message: format!("No block with hash: {hash}"),
            })?;
        let summary = ctx.call(summarize_block(ctx.ledger.as_ref(), &block)).await?;
        Ok(serde_json::to_value(&summary)?)
    }
}

/// Account state by address.
pub struct AccountHandler;

#[async_trait]
impl MethodHandler for AccountHandler {
    #[instrument(skip(self, ctx), fields(method = "Account"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let address = require_string_param(params.as_ref(), "address")?;
        let account = ctx
            .call(ctx.ledger.account(&address))
            .await?
            .ok_or_else(|| RpcError::NotFound {
                message: format!("No account at address: {address}"),
            })?;
        Ok(serde_json::to_value(&account)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::MemoryLedger;
    use crate::rpc::handlers::test_helpers::{make_test_context, make_test_context_with};
    use ledgerwire_core::backend::{KeyManager, Ledger};

    #[tokio::test]
    async fn balance_of_active_address() {
        let ledger = Arc::new(MemoryLedger::new("500").unwrap());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        let result = MyBalanceHandler.handle(None, &ctx).await.unwrap();
        assert_eq!(result["address"], ledger.active_address());
        assert_eq!(result["balance"], "500");
    }

    #[tokio::test]
    async fn balance_of_fresh_address_is_zero() {
        let ledger = Arc::new(MemoryLedger::default());
        let fresh = ledger.new_address().unwrap();
        ledger.set_address(&fresh).unwrap();
        let (ctx, _rx) = make_test_context_with(ledger);
        let result = MyBalanceHandler.handle(None, &ctx).await.unwrap();
        assert_eq!(result["balance"], "0");
    }

    #[tokio::test]
    async fn last_block_number_tracks_commits() {
        let ledger = Arc::new(MemoryLedger::default());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        assert_eq!(LastBlockNumberHandler.handle(None, &ctx).await.unwrap()["number"], 0);
        ledger.commit().await.unwrap();
        ledger.commit().await.unwrap();
        assert_eq!(LastBlockNumberHandler.handle(None, &ctx).await.unwrap()["number"], 2);
    }

    #[tokio::test]
    async fn block_by_hash_found() {
        let ledger = Arc::new(MemoryLedger::default());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        let head = ledger.latest_block_hash().await.unwrap();
        let result = BlockByHashHandler
            .handle(Some(json!({ "hash": head })), &ctx)
            .await
            .unwrap();
        assert_eq!(result["hash"], head.as_str());
        assert_eq!(result["number"], 0);
    }

    #[tokio::test]
    async fn block_by_hash_accepts_bare_string() {
        let ledger = Arc::new(MemoryLedger::default());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        let head = ledger.latest_block_hash().await.unwrap();
        let result = BlockByHashHandler.handle(Some(json!(head)), &ctx).await.unwrap();
        assert_eq!(result["hash"], head.as_str());
    }

    #[tokio::test]
    async fn block_by_hash_missing() {
        let (ctx, _rx) = make_test_context();
        let err = BlockByHashHandler
            .handle(Some(json!({ "hash": "beef" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.to_string().contains("beef"));
    }

    #[tokio::test]
    async fn block_by_hash_requires_hash() {
        let (ctx, _rx) = make_test_context();
        let err = BlockByHashHandler.handle(None, &ctx).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn block_mini_carries_deltas() {
        let ledger = Arc::new(MemoryLedger::default());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        let recipient = ledger.new_address().unwrap();
        let _ = ledger.tx(&recipient, "10").await.unwrap();
        ledger.commit().await.unwrap();
        let head = ledger.latest_block_hash().await.unwrap();

        let result = BlockMiniByHashHandler
            .handle(Some(json!({ "hash": head })), &ctx)
            .await
            .unwrap();
        assert_eq!(result["number"], 1);
        assert_eq!(result["transactions"], 1);
        let deltas = result["accountsAffected"].as_array().unwrap();
        assert!(deltas.iter().any(|d| d["address"] == recipient.as_str() && d["balance"] == "10"));
    }

    #[tokio::test]
    async fn account_found_and_missing() {
        let ledger = Arc::new(MemoryLedger::default());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        let me = ledger.active_address();
        let result = AccountHandler
            .handle(Some(json!({ "address": me })), &ctx)
            .await
            .unwrap();
        assert_eq!(result["address"], me.as_str());

        let err = AccountHandler
            .handle(Some(json!({ "address": "nobody" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
