//! Pairing state machine.
//!
//! [`Matchmaker`] owns every piece of shared pairing state: the live
//! connection set, the identity registry, the waiting pool, the pairing table
//! and the pending grace periods. Its methods are synchronous and never touch
//! a socket; each returns [`Effects`] describing the frames to send and the
//! timers to start, which the hub applies after releasing its lock.
//!
//! A connection is *live* from [`Matchmaker::connect`] until
//! [`Matchmaker::disconnect`]. A paired connection that closes stays in the
//! pairing table and keeps its identifier until its grace period resolves.

mod effects;
mod grace;
mod pairing;
mod pool;
mod registry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use wicket_core::protocol::RelayKind;
use wicket_core::{ClientId, ConnectionId, ServerMessage};

pub use effects::{Delivered, Delivery, Effects};
pub use grace::{DEFAULT_GRACE_PERIOD, GracePeriod, GraceTable, GraceTicket};
pub use pairing::PairingTable;
pub use pool::WaitingPool;
pub use registry::IdentityRegistry;

use crate::metrics::{
    GRACE_EXPIRED_TOTAL, PAIRINGS_CREATED_TOTAL, RECONNECTS_TOTAL, RELAY_DROPPED_TOTAL,
    RELAY_MESSAGES_TOTAL,
};
use crate::websocket::connection::PeerConnection;

/// Point-in-time counts of matchmaker state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MatchmakerStats {
    /// Live connections.
    pub connections: usize,
    /// Connections in the waiting pool.
    pub waiting: usize,
    /// Pairings, including ones held open by a grace period.
    pub pairings: usize,
    /// Pending grace periods.
    pub grace_periods: usize,
    /// Bound identifiers.
    pub identities: usize,
}

/// Shared pairing state. See the module docs.
#[derive(Debug)]
pub struct Matchmaker {
    connections: HashMap<ConnectionId, Arc<PeerConnection>>,
    registry: IdentityRegistry,
    pool: WaitingPool,
    pairings: PairingTable,
    graces: GraceTable,
    grace_period: Duration,
}

impl Matchmaker {
    /// Create an empty matchmaker that holds dropped pairings for `grace_period`.
    pub fn new(grace_period: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            registry: IdentityRegistry::new(),
            pool: WaitingPool::new(),
            pairings: PairingTable::new(),
            graces: GraceTable::new(),
            grace_period,
        }
    }

    /// Register a newly opened socket and issue it an identifier.
    pub fn connect(&mut self, conn: Arc<PeerConnection>) -> (ClientId, Effects) {
        let conn_id = conn.id.clone();
        let client_id = self.registry.issue();
        let _ = self.registry.bind(&conn_id, &client_id);
        let _ = self.connections.insert(conn_id.clone(), conn);

        let mut effects = Effects::none();
        self.notify(
            &mut effects,
            &conn_id,
            &ServerMessage::ClientId {
                client_id: client_id.clone(),
            },
        );
        debug!(conn_id = %conn_id, client_id = %client_id, "identifier issued");
        (client_id, effects)
    }

    /// Handle `join`. A `previous_id` makes it a reconnect attempt.
    pub fn join(&mut self, conn: &ConnectionId, previous_id: Option<&ClientId>) -> Effects {
        let mut effects = Effects::none();
        if !self.is_live(conn) {
            debug!(conn_id = %conn, "join from unknown connection ignored");
            return effects;
        }
        match previous_id {
            Some(previous_id) => self.restore_or_join(&mut effects, conn, previous_id),
            None => self.pair_or_wait(&mut effects, conn),
        }
        effects
    }

    /// Handle `reconnect` under a previously issued identifier.
    pub fn reconnect(&mut self, conn: &ConnectionId, client_id: &ClientId) -> Effects {
        self.join(conn, Some(client_id))
    }

    /// Forward `raw` unchanged to the sender's partner, if that partner is live.
    pub fn relay(&self, sender: &ConnectionId, kind: &RelayKind, raw: String) -> Effects {
        let mut effects = Effects::none();
        let partner = self
            .pairings
            .partner_of(sender)
            .and_then(|partner| self.connections.get(partner));
        match partner {
            Some(partner) => {
                metrics::counter!(RELAY_MESSAGES_TOTAL, "kind" => relay_label(kind)).increment(1);
                effects.send(partner, kind.as_str(), raw);
            }
            None => {
                metrics::counter!(RELAY_DROPPED_TOTAL).increment(1);
                debug!(conn_id = %sender, kind = %kind, "no live partner, frame dropped");
            }
        }
        effects
    }

    /// Handle a closed socket.
    ///
    /// Waiting or unpaired connections are forgotten immediately. A paired
    /// connection starts a grace period and its partner is told the drop is
    /// temporary. Calling this twice for the same connection is a no-op.
    pub fn disconnect(&mut self, conn: &ConnectionId) -> Effects {
        let mut effects = Effects::none();
        if self.connections.remove(conn).is_none() {
            return effects;
        }

        if self.pool.remove(conn) {
            self.release_identity(conn);
            debug!(conn_id = %conn, "waiting connection left");
            return effects;
        }

        let Some(partner) = self.pairings.partner_of(conn).cloned() else {
            self.release_identity(conn);
            debug!(conn_id = %conn, "unpaired connection left");
            return effects;
        };

        let Some(client_id) = self.client_id_of(conn) else {
            let _ = self.pairings.unpair(conn);
            warn!(conn_id = %conn, "paired connection had no identifier, dissolving pairing");
            self.orphan(&mut effects, &partner, None);
            return effects;
        };

        let partner_id = self.client_id_of(&partner);
        let ticket = self.graces.begin(&client_id, partner_id, self.grace_period);
        info!(
            conn_id = %conn,
            client_id = %client_id,
            grace = ?self.grace_period,
            "paired connection dropped, grace period started"
        );
        self.notify(
            &mut effects,
            &partner,
            &ServerMessage::PartnerDisconnected {
                temporary: true,
                partner_id: Some(client_id),
            },
        );
        effects.timers.push(ticket);
        effects
    }

    /// Fire the grace timer for `client_id`.
    ///
    /// Only acts if `generation` is still the pending period's and the
    /// identifier is not bound to a live connection; otherwise a reconnect
    /// already resolved it and this is a no-op.
    pub fn expire_grace(&mut self, client_id: &ClientId, generation: u64) -> Effects {
        let mut effects = Effects::none();
        if self.graces.take_if_current(client_id, generation).is_none() {
            debug!(client_id = %client_id, generation, "stale grace timer ignored");
            return effects;
        }

        let holder = self.registry.lookup(client_id).cloned();
        if holder.as_ref().is_some_and(|conn| self.is_live(conn)) {
            debug!(client_id = %client_id, "identifier is live again, grace timer ignored");
            return effects;
        }

        let _ = self.registry.release(client_id);
        metrics::counter!(GRACE_EXPIRED_TOTAL).increment(1);
        info!(client_id = %client_id, "grace period expired");

        if let Some(partner) = holder.and_then(|old| self.pairings.unpair(&old)) {
            self.orphan(&mut effects, &partner, Some(client_id.clone()));
        }
        effects
    }

    /// Current counts.
    pub fn stats(&self) -> MatchmakerStats {
        MatchmakerStats {
            connections: self.connections.len(),
            waiting: self.pool.len(),
            pairings: self.pairings.len(),
            grace_periods: self.graces.len(),
            identities: self.registry.len(),
        }
    }

    /// How long dropped pairings are held open.
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Partner of `conn`, live or not.
    pub fn partner_of(&self, conn: &ConnectionId) -> Option<&ConnectionId> {
        self.pairings.partner_of(conn)
    }

    /// Identifier held by `conn`.
    pub fn client_id_of(&self, conn: &ConnectionId) -> Option<ClientId> {
        self.registry.identifier_of(conn).cloned()
    }

    /// Connection currently bound to `client_id`.
    pub fn connection_for(&self, client_id: &ClientId) -> Option<&ConnectionId> {
        self.registry.lookup(client_id)
    }

    /// Whether `conn` is in the waiting pool.
    pub fn is_waiting(&self, conn: &ConnectionId) -> bool {
        self.pool.contains(conn)
    }

    /// Pending grace period for `client_id`.
    pub fn pending_grace(&self, client_id: &ClientId) -> Option<&GracePeriod> {
        self.graces.get(client_id)
    }

    fn is_live(&self, conn: &ConnectionId) -> bool {
        self.connections.contains_key(conn)
    }

    fn release_identity(&mut self, conn: &ConnectionId) {
        if let Some(id) = self.client_id_of(conn) {
            let _ = self.registry.release(&id);
        }
    }

    fn notify(&self, effects: &mut Effects, conn: &ConnectionId, message: &ServerMessage) {
        let Some(peer) = self.connections.get(conn) else {
            return;
        };
        match message.encode() {
            Ok(frame) => effects.send(peer, message.kind(), frame),
            Err(e) => {
                warn!(conn_id = %conn, kind = message.kind(), error = %e, "failed to encode server message");
            }
        }
    }

    /// Pair `conn` with the longest-waiting connection, or enqueue it.
    fn pair_or_wait(&mut self, effects: &mut Effects, conn: &ConnectionId) {
        if self.pairings.is_paired(conn) {
            warn!(conn_id = %conn, "join from paired connection ignored");
            return;
        }
        if self.pool.contains(conn) {
            debug!(conn_id = %conn, "connection already waiting");
            return;
        }

        while let Some(waiting) = self.pool.dequeue() {
            if !self.is_live(&waiting) {
                warn!(conn_id = %waiting, "closed connection found in waiting pool, skipped");
                continue;
            }
            if let Err(e) = self.pairings.pair(conn, &waiting) {
                warn!(error = %e, "pairing rejected");
                continue;
            }
            metrics::counter!(PAIRINGS_CREATED_TOTAL).increment(1);
            info!(initiator = %conn, responder = %waiting, "peers paired");

            if let (Some(conn_client), Some(waiting_client)) =
                (self.client_id_of(conn), self.client_id_of(&waiting))
            {
                self.notify(
                    effects,
                    conn,
                    &ServerMessage::PeerAssignment {
                        is_initiator: true,
                        partner_id: waiting_client,
                    },
                );
                self.notify(
                    effects,
                    &waiting,
                    &ServerMessage::PeerAssignment {
                        is_initiator: false,
                        partner_id: conn_client,
                    },
                );
            }
            return;
        }

        let _ = self.pool.enqueue(conn.clone());
        debug!(conn_id = %conn, waiting = self.pool.len(), "connection waiting for a partner");
    }

    /// Put `conn` into the pairing `previous_id` left behind, if it is still
    /// being held open; otherwise treat the request as a fresh join.
    fn restore_or_join(&mut self, effects: &mut Effects, conn: &ConnectionId, previous_id: &ClientId) {
        if self.registry.identifier_of(conn) == Some(previous_id) {
            self.pair_or_wait(effects, conn);
            return;
        }
        if self.pairings.is_paired(conn) {
            warn!(conn_id = %conn, "reconnect from paired connection ignored");
            return;
        }

        let Some(old) = self.registry.lookup(previous_id).cloned() else {
            info!(conn_id = %conn, client_id = %previous_id, "unknown identifier, joining as new client");
            self.pair_or_wait(effects, conn);
            return;
        };
        if self.is_live(&old) {
            // The old socket is most likely half-open and not yet noticed by
            // the heartbeat. The newest holder of an identifier wins.
            info!(
                conn_id = %conn,
                client_id = %previous_id,
                stale = %old,
                "identifier held by another live connection, displacing it"
            );
            self.displace(effects, &old);
        }
        if !self.pairings.is_paired(&old) {
            let _ = self.graces.resolve(previous_id);
            let _ = self.registry.release(previous_id);
            info!(conn_id = %conn, client_id = %previous_id, "pairing already dissolved, joining as new client");
            self.pair_or_wait(effects, conn);
            return;
        }

        let _ = self.pool.remove(conn);
        let partner = match self.pairings.replace(&old, conn) {
            Ok(partner) => partner,
            Err(e) => {
                warn!(error = %e, "failed to restore pairing");
                self.pair_or_wait(effects, conn);
                return;
            }
        };
        let _ = self.registry.bind(conn, previous_id);
        let _ = self.graces.resolve(previous_id);
        metrics::counter!(RECONNECTS_TOTAL).increment(1);
        info!(conn_id = %conn, client_id = %previous_id, partner = %partner, "pairing restored");

        let Some(partner_id) = self.client_id_of(&partner) else {
            warn!(conn_id = %partner, "restored partner has no identifier");
            return;
        };
        let is_initiator = self.pairings.is_initiator(conn).unwrap_or(false);
        self.notify(
            effects,
            conn,
            &ServerMessage::ReconnectSuccess {
                is_initiator,
                partner_id: partner_id.clone(),
            },
        );
        if self.is_live(&partner) {
            self.notify(
                effects,
                &partner,
                &ServerMessage::PartnerReconnected {
                    partner_id: previous_id.clone(),
                },
            );
        } else {
            self.notify(
                effects,
                conn,
                &ServerMessage::PartnerDisconnected {
                    temporary: true,
                    partner_id: Some(partner_id),
                },
            );
        }
    }

    /// Drop `conn` from the live set and have its socket closed. Its
    /// identifier and pairing stay for the caller to take over, and the
    /// session's own disconnect later finds nothing to do.
    fn displace(&mut self, effects: &mut Effects, conn: &ConnectionId) {
        let _ = self.pool.remove(conn);
        if let Some(peer) = self.connections.remove(conn) {
            effects.evictions.push(peer);
        }
    }

    /// Tell a surviving partner its pairing is gone and send it back to the pool.
    fn orphan(&mut self, effects: &mut Effects, partner: &ConnectionId, left: Option<ClientId>) {
        if !self.is_live(partner) {
            return;
        }
        self.notify(
            effects,
            partner,
            &ServerMessage::PartnerDisconnected {
                temporary: false,
                partner_id: left,
            },
        );
        self.pair_or_wait(effects, partner);
    }
}

fn relay_label(kind: &RelayKind) -> String {
    match kind {
        RelayKind::Other(_) => "other".to_owned(),
        known => known.as_str().to_owned(),
    }
}
