//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Fails if a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused because the connection limit was reached (counter).
pub const WS_REJECTED_TOTAL: &str = "ws_rejected_total";
/// Frames that could not be queued for a client (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
/// Pairings formed from the waiting pool (counter).
pub const PAIRINGS_CREATED_TOTAL: &str = "pairings_created_total";
/// Pairings restored by a reconnect (counter).
pub const RECONNECTS_TOTAL: &str = "reconnects_total";
/// Grace periods that ran out and tore a pairing down (counter).
pub const GRACE_EXPIRED_TOTAL: &str = "grace_expired_total";
/// Frames forwarded to a partner (counter, labels: kind).
pub const RELAY_MESSAGES_TOTAL: &str = "relay_messages_total";
/// Frames dropped because the sender had no live partner (counter).
pub const RELAY_DROPPED_TOTAL: &str = "relay_dropped_total";
/// Client frames rejected by the protocol decoder (counter).
pub const PROTOCOL_ERRORS_TOTAL: &str = "protocol_errors_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_REJECTED_TOTAL,
            WS_SEND_DROPS_TOTAL,
            PAIRINGS_CREATED_TOTAL,
            RECONNECTS_TOTAL,
            GRACE_EXPIRED_TOTAL,
            RELAY_MESSAGES_TOTAL,
            RELAY_DROPPED_TOTAL,
            PROTOCOL_ERRORS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
