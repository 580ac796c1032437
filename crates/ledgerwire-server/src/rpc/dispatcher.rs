//! Routes requests to handlers and frames the reply envelope.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, instrument, warn};

use crate::metrics::{RPC_ERRORS_TOTAL, RPC_REQUEST_DURATION_SECONDS, RPC_REQUESTS_TOTAL};
use crate::rpc::context::RpcContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::MethodRegistry;
use crate::rpc::types::{RpcRequest, RpcResponse};

/// Request dispatcher bound to one session's registry.
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
}

impl Dispatcher {
    /// Dispatcher over `registry`.
    pub fn new(registry: Arc<MethodRegistry>) -> Self {
        Self { registry }
    }

    /// The registry requests are resolved against.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Run `request` and build its reply.
    ///
    /// Unknown methods fail with [`RpcError::MethodNotFound`] and produce no
    /// envelope. Handler errors are embedded in the reply. Streaming handlers
    /// produce no reply on success because their pushes already went out.
    #[instrument(skip_all, fields(session_id = %ctx.session_id, method = %request.method))]
    pub async fn dispatch(
        &self,
        request: RpcRequest,
        ctx: &RpcContext,
    ) -> Result<Option<RpcResponse>, RpcError> {
        let RpcRequest { method, params, .. } = request;

        let handler = match self.registry.lookup(&method) {
            Ok(handler) => handler,
            Err(e) => {
                counter!(RPC_ERRORS_TOTAL, "method" => "unknown", "error_type" => e.code())
                    .increment(1);
                return Err(e);
            }
        };

        counter!(RPC_REQUESTS_TOTAL, "method" => method.clone()).increment(1);
        let started = Instant::now();
        let outcome = handler.handle(params, ctx).await;
        histogram!(RPC_REQUEST_DURATION_SECONDS, "method" => method.clone())
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(_) if handler.streams_reply() => {
                debug!("streamed reply complete");
                Ok(None)
            }
            Ok(result) => Ok(Some(RpcResponse::success(method, result))),
            Err(e) => {
                counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => e.code())
                    .increment(1);
                warn!(code = e.code(), error = %e, "method failed");
                Ok(Some(RpcResponse::failure(method, e.to_payload())))
            }
        }
    }
}
