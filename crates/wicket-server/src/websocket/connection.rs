//! Handle to one peer socket, shared between its session and the hub.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use wicket_core::ConnectionId;

/// One peer socket as the hub sees it.
///
/// The session task drains `outbox` into the socket. The hub only pushes
/// frames and, when a frame cannot be queued, evicts the peer: a peer that
/// missed a frame no longer agrees with the server about its pairing, so
/// the socket is closed and the disconnect runs like any other drop.
pub struct PeerConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    outbox: mpsc::Sender<String>,
    evicted: CancellationToken,
    heard_since_tick: AtomicBool,
    last_heard: Mutex<Instant>,
    lost_frames: AtomicU64,
}

impl PeerConnection {
    /// Wrap the sending half of a session's outbound queue.
    pub fn new(outbox: mpsc::Sender<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            outbox,
            evicted: CancellationToken::new(),
            heard_since_tick: AtomicBool::new(true),
            last_heard: Mutex::new(Instant::now()),
            lost_frames: AtomicU64::new(0),
        }
    }

    /// Queue a text frame without waiting.
    ///
    /// A full or closed queue loses the frame and evicts the peer. Returns
    /// whether the frame was queued.
    pub fn send(&self, frame: String) -> bool {
        if self.evicted.is_cancelled() {
            let _ = self.lost_frames.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        match self.outbox.try_send(frame) {
            Ok(()) => true,
            Err(_) => {
                let _ = self.lost_frames.fetch_add(1, Ordering::Relaxed);
                self.evict();
                false
            }
        }
    }

    /// Ask the session to close the socket.
    pub fn evict(&self) {
        self.evicted.cancel();
    }

    /// Whether the peer has been evicted.
    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }

    /// Resolves once the peer is evicted.
    pub fn evicted(&self) -> WaitForCancellationFuture<'_> {
        self.evicted.cancelled()
    }

    /// Frames that never reached the outbound queue.
    pub fn lost_frames(&self) -> u64 {
        self.lost_frames.load(Ordering::Relaxed)
    }

    /// Record activity from the client (any frame, including pongs).
    pub fn mark_alive(&self) {
        self.heard_since_tick.store(true, Ordering::Relaxed);
        *self.last_heard.lock() = Instant::now();
    }

    /// Time since the client was last heard from.
    pub fn silent_for(&self) -> Duration {
        self.last_heard.lock().elapsed()
    }

    /// Whether the client was heard from since the previous call.
    pub fn check_alive(&self) -> bool {
        self.heard_since_tick.swap(false, Ordering::Relaxed)
    }
}

impl std::fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConnection")
            .field("id", &self.id)
            .field("evicted", &self.is_evicted())
            .field("lost_frames", &self.lost_frames())
            .finish_non_exhaustive()
    }
}
