//! Server error types.

use thiserror::Error;
use wicket_core::ConnectionId;

/// Rejected pairing-table mutations.
///
/// These never reach a client; the caller logs them and carries on.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PairingError {
    /// One side already has a partner.
    #[error("connection {0} is already paired")]
    AlreadyPaired(ConnectionId),
    /// A connection cannot be paired with itself.
    #[error("connection {0} cannot be paired with itself")]
    SelfPairing(ConnectionId),
    /// `replace` was asked to swap out a connection that has no pairing.
    #[error("connection {0} is not paired")]
    NotPaired(ConnectionId),
}

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or serving the listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The Prometheus recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}
