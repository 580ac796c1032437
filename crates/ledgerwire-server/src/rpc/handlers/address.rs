//! Key management: active address, address list, creation, selection.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::require_string_param;
use crate::rpc::registry::MethodHandler;

/// Active address. Registered as both `MyAddress` and `ActiveAddress`.
pub struct MyAddressHandler;

#[async_trait]
impl MethodHandler for MyAddressHandler {
    #[instrument(skip(self, ctx), fields(method = "MyAddress"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(json!({ "address": ctx.ledger.active_address() }))
    }
}

/// All managed addresses plus the active one.
pub struct MyAddressesHandler;

#[async_trait]
impl MethodHandler for MyAddressesHandler {
    #[instrument(skip(self, ctx), fields(method = "MyAddresses"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(json!({
            "addresses": ctx.ledger.addresses(),
            "active": ctx.ledger.active_address(),
        }))
    }
}

/// Create a managed address.
pub struct NewAddressHandler;

#[async_trait]
impl MethodHandler for NewAddressHandler {
    #[instrument(skip(self, ctx), fields(method = "NewAddress"))]
    async fn handle(&self, _params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let address = ctx.ledger.new_address()?;
        info!(session = %ctx.session_id, %address, "address created");
        Ok(json!({ "address": address }))
    }
}

/// Select the active address.
pub struct SetAddressHandler;

#[async_trait]
impl MethodHandler for SetAddressHandler {
    #[instrument(skip(self, ctx), fields(method = "SetAddress"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let address = require_string_param(params.as_ref(), "address")?;
        ctx.ledger.set_address(&address)?;
        Ok(json!({ "address": address }))
    }
}
