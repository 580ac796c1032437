//! # ledgerwire-server
//!
//! Per-session WebSocket RPC gateway over a [`Ledger`](ledgerwire_core::backend::Ledger)
//! backend.
//!
//! - **RPC**: [`rpc::registry::MethodRegistry`] maps method names to handlers,
//!   [`rpc::dispatcher::Dispatcher`] routes requests and frames replies
//! - **WebSocket**: one [`websocket::session::Session`] per connection owns a
//!   [`websocket::event_bridge::SubscriptionBridge`] relaying backend events,
//!   a [`websocket::transition::SnapshotGate`] coordinating the WorldState
//!   export with live block events, and a single ordered outbound queue
//! - **Server**: [`server::router`] mounts `/ws`, `/health` and `/metrics`
//! - **Backend**: [`backend::memory::MemoryLedger`], an in-process chain for
//!   development and tests
//!
//! ## Crate Position
//!
//! Depends on `ledgerwire-core` and `ledgerwire-settings`. Used by the
//! `ledgerwire` binary.

#![deny(unsafe_code)]

pub mod backend;
pub mod metrics;
pub mod rpc;
pub mod server;
pub mod websocket;
