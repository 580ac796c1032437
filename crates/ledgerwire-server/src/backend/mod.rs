//! Ledger backends shipped with the gateway.

pub mod memory;

pub use memory::MemoryLedger;
