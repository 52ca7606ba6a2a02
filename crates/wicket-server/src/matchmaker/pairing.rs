//! Symmetric pairing table.
//!
//! Each pairing is stored as two directed links (A→B and B→A) that are
//! inserted and removed together, so a half-pairing is never observable.

use std::collections::HashMap;

use wicket_core::ConnectionId;

use crate::errors::PairingError;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Link {
    partner: ConnectionId,
    initiator: bool,
}

/// Table of active pairings.
#[derive(Debug, Default)]
pub struct PairingTable {
    links: HashMap<ConnectionId, Link>,
}

impl PairingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `initiator` with `responder`.
    ///
    /// Fails without touching the table if either side is already paired.
    pub fn pair(
        &mut self,
        initiator: &ConnectionId,
        responder: &ConnectionId,
    ) -> Result<(), PairingError> {
        if initiator == responder {
            return Err(PairingError::SelfPairing(initiator.clone()));
        }
        for side in [initiator, responder] {
            if self.links.contains_key(side) {
                return Err(PairingError::AlreadyPaired(side.clone()));
            }
        }
        let _ = self.links.insert(
            initiator.clone(),
            Link {
                partner: responder.clone(),
                initiator: true,
            },
        );
        let _ = self.links.insert(
            responder.clone(),
            Link {
                partner: initiator.clone(),
                initiator: false,
            },
        );
        Ok(())
    }

    /// Partner of `conn`, if paired.
    pub fn partner_of(&self, conn: &ConnectionId) -> Option<&ConnectionId> {
        self.links.get(conn).map(|link| &link.partner)
    }

    /// Whether `conn` is the side that starts negotiation.
    pub fn is_initiator(&self, conn: &ConnectionId) -> Option<bool> {
        self.links.get(conn).map(|link| link.initiator)
    }

    /// Whether `conn` has a partner.
    pub fn is_paired(&self, conn: &ConnectionId) -> bool {
        self.links.contains_key(conn)
    }

    /// Dissolve the pairing containing `conn`, returning the former partner.
    ///
    /// Idempotent: returns `None` if `conn` is not paired.
    pub fn unpair(&mut self, conn: &ConnectionId) -> Option<ConnectionId> {
        let link = self.links.remove(conn)?;
        let _ = self.links.remove(&link.partner);
        Some(link.partner)
    }

    /// Put `new` in place of `old`, keeping the partner and `old`'s role.
    ///
    /// Returns the partner.
    pub fn replace(
        &mut self,
        old: &ConnectionId,
        new: &ConnectionId,
    ) -> Result<ConnectionId, PairingError> {
        if old == new {
            return self
                .partner_of(old)
                .cloned()
                .ok_or_else(|| PairingError::NotPaired(old.clone()));
        }
        if self.links.contains_key(new) {
            return Err(PairingError::AlreadyPaired(new.clone()));
        }
        let link = self
            .links
            .remove(old)
            .ok_or_else(|| PairingError::NotPaired(old.clone()))?;
        if let Some(mirror) = self.links.get_mut(&link.partner) {
            mirror.partner = new.clone();
        }
        let partner = link.partner.clone();
        let _ = self.links.insert(new.clone(), link);
        Ok(partner)
    }

    /// Number of pairings (not directed links).
    pub fn len(&self) -> usize {
        self.links.len() / 2
    }

    /// Whether there are no pairings.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
