//! Wire envelopes.
//!
//! Every message the gateway writes is an [`RpcResponse`]. Replies carry the
//! method name as their `id`; pushes carry a fixed label (see [`labels`]).

use ledgerwire_core::time::wire_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Push labels that are not method names.
pub mod labels {
    /// Number of block summaries that follow.
    pub const NUM_BLOCKS: &str = "NumBlocks";
    /// One historical block summary.
    pub const BLOCKS: &str = "Blocks";
    /// Number of account summaries that follow.
    pub const NUM_ACCOUNTS: &str = "NumAccounts";
    /// One account summary.
    pub const ACCOUNTS: &str = "Accounts";
    /// End of a WorldState export.
    pub const WORLD_STATE_DONE: &str = "WorldStateDone";
    /// The export method, and the label of its error push when it aborts.
    pub const WORLD_STATE: &str = "WorldState";
    /// Real-time block push.
    pub const BLOCK_ADDED: &str = "BlockAdded";
}

fn default_version() -> String {
    "2.0".into()
}

/// Inbound request envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version tag. Informational.
    #[serde(alias = "jsonrpc", default = "default_version")]
    pub version: String,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
    /// Client correlation ID. Not echoed; replies are labelled by method.
    #[serde(default)]
    pub id: i64,
    /// Client timestamp.
    #[serde(default)]
    pub timestamp: i64,
}

impl RpcRequest {
    /// Request for `method` with `params`.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: default_version(),
            method: method.into(),
            params,
            id: 0,
            timestamp: wire_timestamp(),
        }
    }
}

/// Outbound envelope: a method reply or a server push.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Method name for replies, push label for pushes.
    pub id: String,
    /// Success payload.
    pub result: Option<Value>,
    /// Error payload.
    pub error: Option<Value>,
    /// Wire timestamp stamped at send time.
    pub timestamp: i64,
}

impl RpcResponse {
    /// Successful envelope. A `null` result becomes `{}` so exactly one of
    /// `result` and `error` is populated.
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        let result = if result.is_null() { json!({}) } else { result };
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
            timestamp: wire_timestamp(),
        }
    }

    /// Failed envelope carrying an error payload.
    pub fn failure(id: impl Into<String>, error: Value) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error),
            timestamp: wire_timestamp(),
        }
    }

    /// Push carrying a serialized payload.
    pub fn push<T: Serialize>(
        label: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::success(label, serde_json::to_value(payload)?))
    }

    /// Push for a failed transaction: the transaction goes in `result` and
    /// the failure reason in `error`.
    pub fn failed_push<T: Serialize>(
        label: impl Into<String>,
        payload: &T,
        reason: &str,
    ) -> Result<Self, serde_json::Error> {
        let mut response = Self::push(label, payload)?;
        response.error = Some(Value::String(reason.to_owned()));
        Ok(response)
    }

    /// Whether this envelope carries an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
