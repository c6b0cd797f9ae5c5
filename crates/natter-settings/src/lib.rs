//! # natter-settings
//!
//! Configuration for the natter server and client, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`NatterSettings::default()`]
//! 2. **Settings file**: `~/.natter/settings.json`, or a path given on the
//!    command line (deep-merged over defaults)
//! 3. **Environment variables**: `NATTER_*` overrides (highest priority)
//!
//! Command-line flags are applied by the binary on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
