//! FIFO waiting pool of unpaired connections.

use std::collections::VecDeque;

use wicket_core::ConnectionId;

/// Connections waiting for a partner, oldest first.
#[derive(Debug, Default)]
pub struct WaitingPool {
    queue: VecDeque<ConnectionId>,
}

impl WaitingPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `conn` to the tail. Returns `false` if it was already waiting.
    pub fn enqueue(&mut self, conn: ConnectionId) -> bool {
        if self.contains(&conn) {
            return false;
        }
        self.queue.push_back(conn);
        true
    }

    /// Remove and return the longest-waiting connection.
    pub fn dequeue(&mut self) -> Option<ConnectionId> {
        self.queue.pop_front()
    }

    /// Remove `conn` wherever it sits. Returns `true` if it was waiting.
    pub fn remove(&mut self, conn: &ConnectionId) -> bool {
        match self.queue.iter().position(|c| c == conn) {
            Some(idx) => self.queue.remove(idx).is_some(),
            None => false,
        }
    }

    /// Whether `conn` is waiting.
    pub fn contains(&self, conn: &ConnectionId) -> bool {
        self.queue.contains(conn)
    }

    /// Number of waiting connections.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
