//! # wicket-server
//!
//! Axum HTTP + `WebSocket` server that pairs anonymous peers and relays
//! their signaling traffic.
//!
//! - `WebSocket` gateway: connection management, heartbeat, frame dispatch
//! - Matchmaker: identity registry, FIFO waiting pool, pairing table, grace periods
//! - Relay: opaque passthrough of negotiation and game frames to the partner
//! - HTTP endpoints: health check, Prometheus metrics
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod hub;
pub mod matchmaker;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{PairingError, ServerError};
pub use hub::SignalingHub;
pub use server::WicketServer;
