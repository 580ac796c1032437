//! RPC error taxonomy.
//!
//! Handler failures are embedded in the reply envelope as
//! `{"code": ..., "message": ...}`. `MethodNotFound` is the one error that
//! never reaches the client: the dispatcher reports it to the transport
//! layer instead.

use ledgerwire_core::errors::LedgerError;
use serde_json::{Value, json};

use crate::websocket::connection::OutboundError;

/// No handler is registered for the method.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// A handler is already registered under the name.
pub const DUPLICATE_METHOD: &str = "DUPLICATE_METHOD";
/// Parameters are missing or malformed.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// The backend rejected or failed the call.
pub const BACKEND_ERROR: &str = "BACKEND_ERROR";
/// The requested entity does not exist.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// The history walk hit a missing block or a cycle.
pub const SNAPSHOT_WALK: &str = "SNAPSHOT_WALK";
/// A WorldState export is already running for this session.
pub const SNAPSHOT_IN_PROGRESS: &str = "SNAPSHOT_IN_PROGRESS";
/// Gateway-side failure.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Errors produced while dispatching or handling a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// No handler is registered for the method.
    #[error("method not supported: {method}")]
    MethodNotFound {
        /// The unknown method.
        method: String,
    },

    /// Registration collided with an existing name.
    #[error("method already registered: {method}")]
    DuplicateMethod {
        /// The colliding method.
        method: String,
    },

    /// Parameters are missing or malformed.
    #[error("{message}")]
    InvalidParams {
        /// Description.
        message: String,
    },

    /// The backend call failed.
    #[error("{message}")]
    Backend {
        /// Description.
        message: String,
    },

    /// The requested entity does not exist.
    #[error("{message}")]
    NotFound {
        /// Description.
        message: String,
    },

    /// The history walk could not reach genesis.
    #[error("{message}")]
    SnapshotWalk {
        /// Description.
        message: String,
    },

    /// An export is already running.
    #[error("{message}")]
    SnapshotInProgress {
        /// Description.
        message: String,
    },

    /// Gateway-side failure.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl RpcError {
    /// Wire error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND,
            Self::DuplicateMethod { .. } => DUPLICATE_METHOD,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Backend { .. } => BACKEND_ERROR,
            Self::NotFound { .. } => NOT_FOUND,
            Self::SnapshotWalk { .. } => SNAPSHOT_WALK,
            Self::SnapshotInProgress { .. } => SNAPSHOT_IN_PROGRESS,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// Payload for the envelope's `error` field.
    pub fn to_payload(&self) -> Value {
        json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}

impl From<LedgerError> for RpcError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound { .. } => Self::NotFound {
                message: e.to_string(),
            },
            LedgerError::Invalid(_) => Self::InvalidParams {
                message: e.to_string(),
            },
            _ => Self::Backend {
                message: e.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("failed to serialize result: {e}"),
        }
    }
}

impl From<OutboundError> for RpcError {
    fn from(e: OutboundError) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}
