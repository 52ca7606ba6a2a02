//! Side effects produced by a matchmaker operation.
//!
//! Operations run under the matchmaker lock and must not block, so instead
//! of sending they record what to send and which timers to start. The hub
//! applies the effects after the lock is released.

use std::sync::Arc;

use tracing::{debug, warn};
use wicket_core::ConnectionId;

use super::grace::GraceTicket;
use crate::metrics::WS_SEND_DROPS_TOTAL;
use crate::websocket::connection::PeerConnection;

/// A frame bound for one connection.
#[derive(Debug)]
pub struct Delivery {
    /// Recipient.
    pub to: Arc<PeerConnection>,
    /// Text frame.
    pub frame: String,
    /// `type` of the frame, for logs.
    pub kind: String,
}

/// Everything an operation wants done once the lock is released.
#[derive(Debug, Default)]
#[must_use = "effects do nothing until delivered"]
pub struct Effects {
    /// Frames to send, in order.
    pub deliveries: Vec<Delivery>,
    /// Grace timers to start.
    pub timers: Vec<GraceTicket>,
    /// Sockets already dropped from the matchmaker that must be closed.
    pub evictions: Vec<Arc<PeerConnection>>,
}

/// What happened when [`Effects`] were applied.
#[derive(Debug, Default)]
pub struct Delivered {
    /// Frames accepted by their recipient's queue.
    pub sent: usize,
    /// Recipients that could not take a frame and were evicted. Each still
    /// needs a matchmaker disconnect.
    pub overflowed: Vec<ConnectionId>,
    /// Grace timers to start.
    pub timers: Vec<GraceTicket>,
}

impl Effects {
    /// No effects.
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn send(&mut self, to: &Arc<PeerConnection>, kind: impl Into<String>, frame: String) {
        self.deliveries.push(Delivery {
            to: Arc::clone(to),
            frame,
            kind: kind.into(),
        });
    }

    /// Frames queued for `conn`, in order.
    pub fn frames_for(&self, conn: &ConnectionId) -> Vec<&str> {
        self.deliveries
            .iter()
            .filter(|d| d.to.id == *conn)
            .map(|d| d.frame.as_str())
            .collect()
    }

    /// Whether nothing is to be sent, scheduled or closed.
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty() && self.timers.is_empty() && self.evictions.is_empty()
    }

    /// Close evicted sockets, then push every frame into its recipient's queue.
    ///
    /// Once a recipient misses a frame it is evicted and gets nothing else
    /// from this batch.
    pub fn deliver(self) -> Delivered {
        for peer in &self.evictions {
            peer.evict();
        }

        let mut outcome = Delivered {
            timers: self.timers,
            ..Delivered::default()
        };
        for delivery in self.deliveries {
            if outcome.overflowed.contains(&delivery.to.id) {
                continue;
            }
            if delivery.to.send(delivery.frame) {
                outcome.sent += 1;
                debug!(conn_id = %delivery.to.id, kind = %delivery.kind, "frame queued");
            } else {
                metrics::counter!(WS_SEND_DROPS_TOTAL).increment(1);
                warn!(
                    conn_id = %delivery.to.id,
                    kind = %delivery.kind,
                    "outbound queue full or closed, evicting peer"
                );
                outcome.overflowed.push(delivery.to.id.clone());
            }
        }
        outcome
    }
}
