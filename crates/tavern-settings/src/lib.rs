//! # tavern-settings
//!
//! Configuration management with layered sources for the Tavern relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TavernSettings::default()`]
//! 2. **User file**: `~/.tavern/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TAVERN_*` overrides (highest priority)
//!
//! The completion service credential never lives in the settings file; it is
//! read from `TAVERN_API_KEY` (or `OPENAI_API_KEY`) via [`api_key_from_env`].

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    api_key_from_env, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::{CompletionSettings, RelaySettings, ServerSettings, TavernSettings};

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`].
static SETTINGS: OnceLock<TavernSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.tavern/settings.json` with env var
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, returns compiled defaults.
pub fn get_settings() -> &'static TavernSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// # Errors
///
/// Returns the provided settings back if the global was already initialized.
pub fn init_settings(settings: TavernSettings) -> std::result::Result<(), TavernSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
