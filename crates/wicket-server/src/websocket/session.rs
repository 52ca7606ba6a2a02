//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, field, info, instrument, warn};

use super::connection::PeerConnection;
use super::handler::handle_frame;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::config::ServerConfig;
use crate::hub::SignalingHub;
use crate::metrics::{
    PROTOCOL_ERRORS_TOTAL, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};

/// Per-connection tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between server pings and liveness checks.
    pub heartbeat_interval: Duration,
    /// Silence after which the client is dropped.
    pub heartbeat_timeout: Duration,
    /// Outbound queue length.
    pub send_queue_capacity: usize,
}

impl From<&ServerConfig> for SessionConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_timeout: config.heartbeat_timeout(),
            send_queue_capacity: config.send_queue_capacity.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    StreamEnded,
    HeartbeatTimeout,
    Evicted,
    Shutdown,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the socket with the hub, which sends the `client-id` frame
/// 2. Dispatches incoming text (and UTF-8 binary) frames
/// 3. Forwards queued outbound frames and sends periodic pings
/// 4. Drops clients that stop answering or fall behind on outbound frames
/// 5. Reports the disconnect to the hub
#[instrument(skip_all, fields(conn_id = field::Empty))]
pub async fn run_ws_session(
    ws: WebSocket,
    hub: Arc<SignalingHub>,
    config: SessionConfig,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<String>(config.send_queue_capacity);
    let connection = Arc::new(PeerConnection::new(send_tx));
    let conn_id = connection.id.clone();
    let _ = Span::current().record("conn_id", field::display(&conn_id));

    let started = Instant::now();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let client_id = hub.connect(Arc::clone(&connection));
    info!(client_id = %client_id, "client connected");

    // Outbound forwarder with periodic Ping frames.
    let ping_every = config.heartbeat_interval;
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let heartbeat = run_heartbeat(
        Arc::clone(&connection),
        config.heartbeat_interval,
        config.heartbeat_timeout,
        shutdown.clone(),
    );
    tokio::pin!(heartbeat);

    let reason = loop {
        tokio::select! {
            frame = ws_rx.next() => {
                let Some(Ok(msg)) = frame else {
                    break CloseReason::StreamEnded;
                };
                connection.mark_alive();
                match msg {
                    Message::Text(text) => dispatch(&hub, &connection, text.as_str()),
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => dispatch(&hub, &connection, text),
                        Err(_) => debug!(len = data.len(), "non-UTF8 binary frame ignored"),
                    },
                    Message::Close(_) => break CloseReason::ClientClosed,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            () = connection.evicted() => break CloseReason::Evicted,
            result = &mut heartbeat => {
                break match result {
                    HeartbeatResult::TimedOut => {
                        warn!(
                            silent_for = ?connection.silent_for(),
                            "client unresponsive, disconnecting"
                        );
                        CloseReason::HeartbeatTimeout
                    }
                    HeartbeatResult::Cancelled => CloseReason::Shutdown,
                };
            }
        }
    };

    hub.disconnect(&conn_id);
    outbound.abort();

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(started.elapsed().as_secs_f64());
    info!(
        ?reason,
        lost_frames = connection.lost_frames(),
        "client disconnected"
    );
}

fn dispatch(hub: &Arc<SignalingHub>, connection: &PeerConnection, text: &str) {
    match handle_frame(hub, &connection.id, text) {
        Ok(dispatched) => debug!(?dispatched, "frame handled"),
        Err(e) => {
            counter!(PROTOCOL_ERRORS_TOTAL).increment(1);
            warn!(error = %e, "rejected client frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Full sessions need a real socket and are covered by tests/integration.rs.

    #[test]
    fn session_config_from_server_config() {
        let server = ServerConfig {
            heartbeat_interval_ms: 1_000,
            heartbeat_timeout_ms: 4_000,
            send_queue_capacity: 8,
            ..ServerConfig::default()
        };
        let config = SessionConfig::from(&server);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(4));
        assert_eq!(config.send_queue_capacity, 8);
    }

    #[test]
    fn zero_queue_capacity_is_clamped() {
        let server = ServerConfig {
            send_queue_capacity: 0,
            ..ServerConfig::default()
        };
        assert_eq!(SessionConfig::from(&server).send_queue_capacity, 1);
    }

    #[test]
    fn close_reasons_are_distinct() {
        assert_ne!(CloseReason::ClientClosed, CloseReason::StreamEnded);
        assert_ne!(CloseReason::HeartbeatTimeout, CloseReason::Shutdown);
        assert_ne!(CloseReason::Evicted, CloseReason::StreamEnded);
    }
}
