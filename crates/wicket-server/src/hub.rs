//! Serialized access to the matchmaker.
//!
//! Every connection task and grace timer goes through [`SignalingHub`]. Each
//! call takes the lock, runs one matchmaker operation, releases the lock, and
//! only then pushes frames into connection queues and starts timers.
//!
//! Frames produced by one call reach each recipient in the order the
//! matchmaker emitted them. Calls racing on different tasks are serialized
//! by the lock but deliver after it is released, so a recipient may see
//! their control frames in either order. A peer whose queue cannot take a
//! frame is evicted and disconnected on the spot, which starts a grace
//! period if it was paired.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};
use wicket_core::protocol::RelayKind;
use wicket_core::{ClientId, ConnectionId};

use crate::matchmaker::{Effects, GraceTicket, Matchmaker, MatchmakerStats};
use crate::websocket::connection::PeerConnection;

/// Process-wide pairing and relay state.
#[derive(Debug)]
pub struct SignalingHub {
    state: Mutex<Matchmaker>,
}

impl SignalingHub {
    /// Create a hub that holds dropped pairings for `grace_period`.
    pub fn new(grace_period: Duration) -> Self {
        Self {
            state: Mutex::new(Matchmaker::new(grace_period)),
        }
    }

    /// Register a new socket. The client is sent its identifier.
    pub fn connect(self: &Arc<Self>, conn: Arc<PeerConnection>) -> ClientId {
        let (client_id, effects) = self.state.lock().connect(conn);
        self.apply(effects);
        client_id
    }

    /// Handle `join`.
    pub fn join(self: &Arc<Self>, conn: &ConnectionId, previous_id: Option<&ClientId>) {
        let effects = self.state.lock().join(conn, previous_id);
        self.apply(effects);
    }

    /// Handle `reconnect`.
    pub fn reconnect(self: &Arc<Self>, conn: &ConnectionId, client_id: &ClientId) {
        let effects = self.state.lock().reconnect(conn, client_id);
        self.apply(effects);
    }

    /// Forward a frame to the sender's partner.
    pub fn relay(self: &Arc<Self>, sender: &ConnectionId, kind: &RelayKind, raw: String) {
        let effects = self.state.lock().relay(sender, kind, raw);
        self.apply(effects);
    }

    /// Handle a closed socket.
    pub fn disconnect(self: &Arc<Self>, conn: &ConnectionId) {
        let effects = self.state.lock().disconnect(conn);
        self.apply(effects);
    }

    /// Run the expiry check for a grace timer.
    pub fn expire_grace(self: &Arc<Self>, client_id: &ClientId, generation: u64) {
        let effects = self.state.lock().expire_grace(client_id, generation);
        self.apply(effects);
    }

    /// Current counts.
    pub fn stats(&self) -> MatchmakerStats {
        self.state.lock().stats()
    }

    /// Configured grace period.
    pub fn grace_period(&self) -> Duration {
        self.state.lock().grace_period()
    }

    /// Read matchmaker state under the lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&Matchmaker) -> R) -> R {
        f(&*self.state.lock())
    }

    fn apply(self: &Arc<Self>, effects: Effects) {
        let mut pending = vec![effects];
        while let Some(effects) = pending.pop() {
            let delivered = effects.deliver();
            for ticket in delivered.timers {
                self.schedule(ticket);
            }
            for conn in delivered.overflowed {
                warn!(conn_id = %conn, "peer fell behind, disconnecting");
                pending.push(self.state.lock().disconnect(&conn));
            }
        }
    }

    /// Start a grace timer. The timer holds only a weak reference, so a
    /// dropped hub takes its pending timers with it.
    fn schedule(self: &Arc<Self>, ticket: GraceTicket) {
        let hub = Arc::downgrade(self);
        debug!(client_id = %ticket.client_id, generation = ticket.generation, "grace timer scheduled");
        let _ = tokio::spawn(async move {
            tokio::time::sleep(ticket.delay).await;
            if let Some(hub) = hub.upgrade() {
                hub.expire_grace(&ticket.client_id, ticket.generation);
            }
        });
    }
}
