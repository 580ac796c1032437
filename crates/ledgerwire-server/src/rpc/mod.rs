//! RPC envelope types, method registry, dispatcher, and method handlers.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `types` | Request/response envelopes and push labels |
//! | `errors` | [`errors::RpcError`] taxonomy and wire codes |
//! | `registry` | [`registry::MethodHandler`] trait and the per-session name → handler map |
//! | `context` | [`context::RpcContext`] handed to every handler |
//! | `dispatcher` | Routes a request to its handler and frames the reply |
//! | `handlers` | The default method set |

pub mod context;
pub mod dispatcher;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod types;
