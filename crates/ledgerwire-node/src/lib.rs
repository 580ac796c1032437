//! # ledgerwire-node
//!
//! Command-line surface of the `ledgerwire` binary.

#![deny(unsafe_code)]

pub mod cli;
