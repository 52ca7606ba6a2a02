//! # wicket-settings
//!
//! Configuration for the wicket signaling server, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`WicketSettings::default()`]
//! 2. **Settings file**: `~/.wicket/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `WICKET_*` overrides (highest priority)
//!
//! Command-line flags in the `wicket` binary are applied on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
