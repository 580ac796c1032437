//! # ledgerwire-core
//!
//! Shared vocabulary for the ledgerwire gateway.
//!
//! - **IDs**: [`ids::SessionId`] and [`ids::SubscriptionKey`] as newtypes
//! - **Ledger data**: [`ledger::Block`], [`ledger::Transaction`], [`ledger::Account`],
//!   [`ledger::WorldState`]
//! - **Summaries**: [`summary::BlockSummary`] and [`summary::AccountDelta`], the
//!   compact forms pushed to clients
//! - **Events**: [`events::Topic`], [`events::LedgerEvent`] and the per-subscription
//!   [`events::EventSource`] queue
//! - **Backend contract**: the [`backend::Ledger`] and [`backend::KeyManager`] traits
//! - **Errors**: [`errors::LedgerError`] via `thiserror`
//! - **Logging**: [`logging::init_subscriber`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by every other ledgerwire crate.

#![deny(unsafe_code)]

pub mod backend;
pub mod errors;
pub mod events;
pub mod ids;
pub mod ledger;
pub mod logging;
pub mod summary;
pub mod time;
