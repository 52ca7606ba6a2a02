//! Grace periods for paired clients whose socket closed.
//!
//! A grace period is never cancelled. Each one carries a generation number;
//! the timer that fires for it hands the generation back, and only the
//! current generation for that identifier may act. A reconnect resolves the
//! entry, so its timer later finds nothing and does nothing.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use wicket_core::ClientId;

/// Default time a pairing is held open for a dropped client.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Request to fire [`expire`](super::Matchmaker::expire_grace) after `delay`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraceTicket {
    /// Identifier of the client that dropped.
    pub client_id: ClientId,
    /// Generation the timer must present on expiry.
    pub generation: u64,
    /// How long to wait.
    pub delay: Duration,
}

/// A pending grace period.
#[derive(Clone, Debug)]
pub struct GracePeriod {
    /// Identity of the partner left waiting, if known.
    pub partner_id: Option<ClientId>,
    /// When the pairing will be torn down.
    pub deadline: Instant,
    /// Generation stamped on the timer.
    pub generation: u64,
}

/// All pending grace periods, at most one per identifier.
#[derive(Debug, Default)]
pub struct GraceTable {
    entries: HashMap<ClientId, GracePeriod>,
    next_generation: u64,
}

impl GraceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the grace period for `client_id`.
    pub fn begin(
        &mut self,
        client_id: &ClientId,
        partner_id: Option<ClientId>,
        delay: Duration,
    ) -> GraceTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        let _ = self.entries.insert(
            client_id.clone(),
            GracePeriod {
                partner_id,
                deadline: Instant::now() + delay,
                generation,
            },
        );
        GraceTicket {
            client_id: client_id.clone(),
            generation,
            delay,
        }
    }

    /// End the grace period because the client came back.
    pub fn resolve(&mut self, client_id: &ClientId) -> Option<GracePeriod> {
        self.entries.remove(client_id)
    }

    /// Take the entry for an expiring timer, but only if `generation` is
    /// still the current one.
    pub fn take_if_current(&mut self, client_id: &ClientId, generation: u64) -> Option<GracePeriod> {
        match self.entries.get(client_id) {
            Some(period) if period.generation == generation => self.entries.remove(client_id),
            _ => None,
        }
    }

    /// The pending grace period for `client_id`.
    pub fn get(&self, client_id: &ClientId) -> Option<&GracePeriod> {
        self.entries.get(client_id)
    }

    /// Number of pending grace periods.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
