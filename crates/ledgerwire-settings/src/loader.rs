//! Settings file loading, merging, and environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::LedgerwireSettings;

/// Default settings file: `~/.ledgerwire/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".ledgerwire").join("settings.json")
}

/// Load settings from [`settings_path`].
pub fn load_settings() -> Result<LedgerwireSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, deep-merged over defaults, with `LEDGERWIRE_*`
/// overrides applied and the result validated. A missing file yields defaults.
pub fn load_settings_from_path(path: &Path) -> Result<LedgerwireSettings> {
    let defaults = serde_json::to_value(LedgerwireSettings::default())?;
    let merged = match std::fs::read_to_string(path) {
        Ok(content) => {
            let user: Value = serde_json::from_str(&content).map_err(|source| {
                SettingsError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            deep_merge(defaults, user)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            defaults
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut settings: LedgerwireSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Recursively merge `overlay` into `base`. Objects merge key by key; any
/// other overlay value replaces the base value. `null` in the overlay keeps
/// the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Apply `LEDGERWIRE_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut LedgerwireSettings) {
    apply_env_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Apply overrides using `lookup` to read variables. Unparseable values are
/// ignored with a warning.
pub fn apply_env_overrides_from(
    settings: &mut LedgerwireSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    fn parsed<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
        let value = raw.trim().parse().ok();
        if value.is_none() {
            tracing::warn!(key, value = raw, "ignoring unparseable environment override");
        }
        value
    }

    if let Some(host) = lookup("LEDGERWIRE_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = lookup("LEDGERWIRE_WS_PORT").and_then(|v| parsed("LEDGERWIRE_WS_PORT", &v)) {
        settings.server.ws_port = port;
    }
    if let Some(level) = lookup("LEDGERWIRE_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(ms) = lookup("LEDGERWIRE_PACE_INTERVAL_MS")
        .and_then(|v| parsed("LEDGERWIRE_PACE_INTERVAL_MS", &v))
    {
        settings.snapshot.pace_interval_ms = ms;
    }
    if let Some(ms) = lookup("LEDGERWIRE_CALL_TIMEOUT_MS")
        .and_then(|v| parsed("LEDGERWIRE_CALL_TIMEOUT_MS", &v))
    {
        settings.backend.call_timeout_ms = ms;
    }
}
