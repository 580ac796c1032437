//! `Transact`: contract creation, value transfer or message call, chosen by
//! which of `recipient` and `data` are present.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodHandler;

/// Language tag handed to the backend for contract source.
const SCRIPT_LANG: &str = "lll";

/// Inbound `Transact` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactParams {
    /// Destination. Empty means contract creation.
    pub recipient: String,
    /// Amount to transfer.
    pub value: String,
    /// Gas limit. Accepted for client compatibility and ignored.
    pub gas: String,
    /// Gas price. Accepted for client compatibility and ignored.
    pub gas_cost: String,
    /// Contract source or newline-separated message data.
    pub data: String,
}

/// Outcome of a `Transact` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// A transaction was created.
    pub success: bool,
    /// Contract source compiled. Only meaningful for creation.
    pub compiled: bool,
    /// New contract address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Transaction hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Compile failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Receipt {
    fn submitted(hash: String) -> Self {
        Self {
            success: true,
            hash: Some(hash),
            ..Self::default()
        }
    }
}

/// Split message data into trimmed lines.
fn message_lines(data: &str) -> Vec<String> {
    data.split('\n').map(|line| line.trim().to_owned()).collect()
}

/// Submit a transaction.
pub struct TransactHandler;

#[async_trait]
impl MethodHandler for TransactHandler {
    #[instrument(skip(self, ctx), fields(method = "Transact"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let params = params.ok_or_else(|| RpcError::InvalidParams {
            message: "Missing transaction parameters".into(),
        })?;
        let args: TransactParams =
            serde_json::from_value(params).map_err(|e| RpcError::InvalidParams {
                message: format!("Invalid transaction parameters: {e}"),
            })?;

        let receipt = if args.recipient.is_empty() {
            debug!("contract creation");
            match ctx.call(ctx.ledger.script(&args.data, SCRIPT_LANG)).await {
                Ok(address) => Receipt {
                    success: true,
                    compiled: true,
                    address: Some(address),
                    ..Receipt::default()
                },
                Err(e) => {
                    warn!(error = %e, "contract creation failed");
                    Receipt {
                        error: Some(e.to_string()),
                        ..Receipt::default()
                    }
                }
            }
        } else if args.data.is_empty() {
            debug!(recipient = %args.recipient, "value transfer");
            let hash = ctx.call(ctx.ledger.tx(&args.recipient, &args.value)).await?;
            Receipt::submitted(hash)
        } else {
            debug!(recipient = %args.recipient, "message call");
            let lines = message_lines(&args.data);
            let hash = ctx.call(ctx.ledger.msg(&args.recipient, &lines)).await?;
            Receipt::submitted(hash)
        };

        Ok(serde_json::to_value(&receipt)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::MemoryLedger;
    use crate::rpc::handlers::test_helpers::{make_test_context, make_test_context_with};
    use ledgerwire_core::backend::Ledger;
    use serde_json::json;

    #[test]
    fn message_lines_trimmed() {
        assert_eq!(message_lines(" a \nb\n  c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn params_accept_partial_object() {
        let p: TransactParams = serde_json::from_value(json!({ "recipient": "ab" })).unwrap();
        assert_eq!(p.recipient, "ab");
        assert!(p.data.is_empty());
        let p: TransactParams = serde_json::from_value(json!({ "gasCost": "3" })).unwrap();
        assert_eq!(p.gas_cost, "3");
    }

    #[tokio::test]
    async fn contract_creation_returns_address() {
        let ledger = Arc::new(MemoryLedger::default());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        let result = TransactHandler
            .handle(Some(json!({ "recipient": "", "data": "(return 0)" })), &ctx)
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["compiled"], true);
        assert!(result["address"].as_str().is_some_and(|a| !a.is_empty()));
        assert!(result.get("error").is_none());
        assert_eq!(ledger.pending_count(), 1);
    }

    #[tokio::test]
    async fn contract_compile_failure_embedded_in_receipt() {
        let (ctx, _rx) = make_test_context();
        let result = TransactHandler
            .handle(Some(json!({ "recipient": "", "data": "" })), &ctx)
            .await
            .unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["compiled"], false);
        assert!(result["error"].as_str().is_some());
        assert!(result.get("address").is_none());
    }

    #[tokio::test]
    async fn transfer_returns_hash() {
        let ledger = Arc::new(MemoryLedger::default());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        let result = TransactHandler
            .handle(Some(json!({ "recipient": "cafe", "value": "25" })), &ctx)
            .await
            .unwrap();
        assert_eq!(result["success"], true);
        assert!(result["hash"].as_str().is_some_and(|h| !h.is_empty()));

        ledger.commit().await.unwrap();
        let account = ledger.account("cafe").await.unwrap().unwrap();
        assert_eq!(account.balance, "25");
    }

    #[tokio::test]
    async fn message_call_splits_data() {
        let ledger = Arc::new(MemoryLedger::default());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        let result = TransactHandler
            .handle(Some(json!({ "recipient": "cafe", "data": "one\n two " })), &ctx)
            .await
            .unwrap();
        assert_eq!(result["success"], true);

        ledger.commit().await.unwrap();
        let head = ledger.latest_block_hash().await.unwrap();
        let block = ledger.block(&head).await.unwrap().unwrap();
        assert_eq!(block.transactions[0].data, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn gas_fields_ignored() {
        let ledger = Arc::new(MemoryLedger::default());
        let (ctx, _rx) = make_test_context_with(ledger.clone());
        let params = json!({
            "recipient": "cafe",
            "value": "5",
            "gas": "not-a-number",
            "gasCost": ""
        });
        let result = TransactHandler.handle(Some(params), &ctx).await.unwrap();
        assert_eq!(result["success"], true);

        ledger.commit().await.unwrap();
        assert_eq!(ledger.account("cafe").await.unwrap().unwrap().balance, "5");
    }

    #[tokio::test]
    async fn invalid_amount_rejected() {
        let (ctx, _rx) = make_test_context();
        let err = TransactHandler
            .handle(Some(json!({ "recipient": "cafe", "value": "lots" })), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn malformed_params_rejected() {
        let (ctx, _rx) = make_test_context();
        let err = TransactHandler.handle(Some(json!([1, 2])), &ctx).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
        let err = TransactHandler.handle(None, &ctx).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
    }
}
