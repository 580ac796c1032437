//! # ledgerwire-settings
//!
//! Configuration for the ledgerwire gateway.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`LedgerwireSettings::default()`]
//! 2. **User file**: `~/.ledgerwire/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `LEDGERWIRE_*` overrides (highest priority)
//!
//! The loaded value is validated once and then shared read-only behind an
//! `Arc` by the server.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_env_overrides_from, deep_merge, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
