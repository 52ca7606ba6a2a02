//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial: missing fields keep their default value.

mod logging;
mod server;

pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 8080, "gracePeriodMs": 15000 },
///   "logging": { "level": "debug", "json": true }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WicketSettings {
    /// Network, pairing and liveness settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl WicketSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.server;
        if s.grace_period_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.gracePeriodMs must be greater than zero".into(),
            ));
        }
        if s.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be greater than zero".into(),
            ));
        }
        if s.heartbeat_timeout_ms < s.heartbeat_interval_ms {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutMs ({}) is shorter than the interval ({})",
                s.heartbeat_timeout_ms, s.heartbeat_interval_ms
            )));
        }
        if s.max_connections == 0 || s.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections and server.sendQueueCapacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
