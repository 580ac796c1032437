//! Method handler trait and the per-session method registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;

/// A named RPC operation.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Run the method. The returned value becomes the reply's `result`.
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError>;

    /// Handlers that answer with a sequence of pushes instead of a single
    /// reply. The dispatcher writes no reply when they succeed.
    fn streams_reply(&self) -> bool {
        false
    }
}

/// Name → handler map owned by one session.
///
/// Lookups clone the handler `Arc` under the read lock, so a concurrent
/// `add` or `remove` never invalidates a handler that is already running.
pub struct MethodRegistry {
    methods: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
}

impl MethodRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Register `handler` under `name`. An existing handler is replaced only
    /// when `replace_existing` is set; otherwise the call fails with
    /// [`RpcError::DuplicateMethod`].
    pub fn add(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn MethodHandler>,
        replace_existing: bool,
    ) -> Result<(), RpcError> {
        let name = name.into();
        let mut methods = self.methods.write();
        if methods.contains_key(&name) && !replace_existing {
            return Err(RpcError::DuplicateMethod { method: name });
        }
        debug!(method = %name, replaced = methods.contains_key(&name), "method registered");
        let _ = methods.insert(name, handler);
        Ok(())
    }

    /// Unregister `name`. Returns whether a handler was removed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.methods.write().remove(name).is_some();
        if !removed {
            warn!(method = name, "cannot remove method: not registered");
        }
        removed
    }

    /// Handler registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn MethodHandler>, RpcError> {
        self.methods
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RpcError::MethodNotFound {
                method: name.to_owned(),
            })
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.read().contains_key(name)
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.read().len()
    }

    /// Whether no method is registered.
    pub fn is_empty(&self) -> bool {
        self.methods.read().is_empty()
    }

    /// Drop every handler.
    pub fn clear(&self) {
        self.methods.write().clear();
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
