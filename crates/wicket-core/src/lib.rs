//! # wicket-core
//!
//! Foundation types shared by the wicket crates:
//!
//! - **Branded IDs**: [`ClientId`] (the client-persisted identity) and
//!   [`ConnectionId`] (one physical socket)
//! - **Wire protocol**: [`protocol::Inbound`] for client frames and
//!   [`protocol::ServerMessage`] for control messages the server emits
//! - **Errors**: [`ProtocolError`] via `thiserror`
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;

pub use errors::ProtocolError;
pub use ids::{ClientId, ConnectionId};
pub use protocol::{Inbound, ServerMessage};
