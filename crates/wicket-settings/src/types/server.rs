//! Server network, pairing and liveness settings.

use serde::{Deserialize, Serialize};

/// Server settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP/WebSocket port (`0` picks a free port).
    pub port: u16,
    /// How long a pairing survives after one side's socket closes.
    pub grace_period_ms: u64,
    /// Interval between server-initiated WebSocket pings.
    pub heartbeat_interval_ms: u64,
    /// Silence after which a client is considered gone.
    pub heartbeat_timeout_ms: u64,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Per-connection outbound queue length before frames are dropped.
    pub send_queue_capacity: usize,
    /// Largest accepted WebSocket frame, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            grace_period_ms: 10_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            max_connections: 1024,
            send_queue_capacity: 256,
            max_message_size: 256 * 1024,
        }
    }
}
