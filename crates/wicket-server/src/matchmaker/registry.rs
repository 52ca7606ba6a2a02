//! Identity registry: `ClientId` ↔ `ConnectionId` in both directions.
//!
//! A binding outlives its socket while a grace period is pending, so
//! `lookup` may return a connection that has already closed. Callers decide
//! liveness against the matchmaker's live connection set.

use std::collections::HashMap;

use wicket_core::{ClientId, ConnectionId};

/// Bidirectional identifier table.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    by_client: HashMap<ClientId, ConnectionId>,
    by_conn: HashMap<ConnectionId, ClientId>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate an identifier not currently assigned to anyone.
    pub fn issue(&self) -> ClientId {
        loop {
            let id = ClientId::new();
            if !self.by_client.contains_key(&id) {
                return id;
            }
        }
    }

    /// Associate `conn` with `id`.
    ///
    /// Any identifier previously held by `conn` is released. If `id` was bound
    /// to another connection, that connection loses its identity and is
    /// returned.
    pub fn bind(&mut self, conn: &ConnectionId, id: &ClientId) -> Option<ConnectionId> {
        if let Some(old_id) = self.by_conn.remove(conn) {
            if old_id != *id {
                let _ = self.by_client.remove(&old_id);
            }
        }
        let displaced = self
            .by_client
            .insert(id.clone(), conn.clone())
            .filter(|prev| prev != conn);
        if let Some(prev) = &displaced {
            let _ = self.by_conn.remove(prev);
        }
        let _ = self.by_conn.insert(conn.clone(), id.clone());
        displaced
    }

    /// Connection currently bound to `id`.
    pub fn lookup(&self, id: &ClientId) -> Option<&ConnectionId> {
        self.by_client.get(id)
    }

    /// Identifier currently held by `conn`.
    pub fn identifier_of(&self, conn: &ConnectionId) -> Option<&ClientId> {
        self.by_conn.get(conn)
    }

    /// Drop the binding for `id`, returning the connection it pointed at.
    pub fn release(&mut self, id: &ClientId) -> Option<ConnectionId> {
        let conn = self.by_client.remove(id)?;
        let _ = self.by_conn.remove(&conn);
        Some(conn)
    }

    /// Number of bound identifiers.
    pub fn len(&self) -> usize {
        self.by_client.len()
    }

    /// Whether no identifier is bound.
    pub fn is_empty(&self) -> bool {
        self.by_client.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    fn client(s: &str) -> ClientId {
        ClientId::from(s)
    }

    #[test]
    fn issue_is_unique_among_bound() {
        let mut reg = IdentityRegistry::new();
        let a = reg.issue();
        let _ = reg.bind(&conn("c1"), &a);
        let b = reg.issue();
        assert_ne!(a, b);
    }

    #[test]
    fn bind_and_lookup_both_directions() {
        let mut reg = IdentityRegistry::new();
        assert!(reg.bind(&conn("c1"), &client("a")).is_none());
        assert_eq!(reg.lookup(&client("a")), Some(&conn("c1")));
        assert_eq!(reg.identifier_of(&conn("c1")), Some(&client("a")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn rebinding_connection_releases_previous_identifier() {
        let mut reg = IdentityRegistry::new();
        let _ = reg.bind(&conn("c1"), &client("fresh"));
        let _ = reg.bind(&conn("c1"), &client("restored"));
        assert!(reg.lookup(&client("fresh")).is_none());
        assert_eq!(reg.identifier_of(&conn("c1")), Some(&client("restored")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn binding_taken_identifier_displaces_old_connection() {
        let mut reg = IdentityRegistry::new();
        let _ = reg.bind(&conn("old"), &client("a"));
        let displaced = reg.bind(&conn("new"), &client("a"));
        assert_eq!(displaced, Some(conn("old")));
        assert_eq!(reg.lookup(&client("a")), Some(&conn("new")));
        assert!(reg.identifier_of(&conn("old")).is_none());
    }

    #[test]
    fn rebinding_same_pair_is_noop() {
        let mut reg = IdentityRegistry::new();
        let _ = reg.bind(&conn("c1"), &client("a"));
        assert!(reg.bind(&conn("c1"), &client("a")).is_none());
        assert_eq!(reg.lookup(&client("a")), Some(&conn("c1")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn release_removes_both_directions() {
        let mut reg = IdentityRegistry::new();
        let _ = reg.bind(&conn("c1"), &client("a"));
        assert_eq!(reg.release(&client("a")), Some(conn("c1")));
        assert!(reg.lookup(&client("a")).is_none());
        assert!(reg.identifier_of(&conn("c1")).is_none());
        assert!(reg.is_empty());
        assert_eq!(reg.release(&client("a")), None);
    }
}
