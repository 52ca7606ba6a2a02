//! Graceful shutdown: stop accepting, close every session, and wait until
//! each one has reported its disconnect to the hub.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::drain`] waits when no timeout is given.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shutdown signal shared by the listener and every WebSocket session.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal shutdown without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Count `session` as open until it completes.
    pub fn track_session<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Sessions that have not finished yet.
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Signal shutdown, then wait for the listener task and every tracked
    /// session. Returns `false` if `timeout` (10 s by default) ran out first.
    pub async fn drain(&self, listener: JoinHandle<()>, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();
        let _ = self.sessions.close();
        info!(sessions = self.open_sessions(), ?timeout, "draining");

        let sessions = self.sessions.clone();
        let all_done = async move {
            let _ = listener.await;
            sessions.wait().await;
        };
        if tokio::time::timeout(timeout, all_done).await.is_err() {
            warn!(sessions = self.open_sessions(), "drain timed out, sessions still open");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_listener(coord: &ShutdownCoordinator) -> JoinHandle<()> {
        let token = coord.token();
        tokio::spawn(async move { token.cancelled().await })
    }

    #[test]
    fn starts_open() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
        assert_eq!(coord.open_sessions(), 0);
    }

    #[test]
    fn shutdown_reaches_every_token() {
        let coord = ShutdownCoordinator::new();
        let session = coord.token();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(session.is_cancelled());
    }

    #[tokio::test]
    async fn drain_waits_for_sessions_to_finish() {
        let coord = ShutdownCoordinator::new();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let token = coord.token();
        let _ = tokio::spawn(coord.track_session(async move {
            token.cancelled().await;
            let _ = done_tx.send(());
        }));
        assert_eq!(coord.open_sessions(), 1);

        let listener = idle_listener(&coord);
        assert!(coord.drain(listener, None).await);
        assert_eq!(coord.open_sessions(), 0);
        assert!(done_rx.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_on_stuck_session() {
        let coord = ShutdownCoordinator::new();
        let _ = tokio::spawn(coord.track_session(tokio::time::sleep(Duration::from_secs(300))));

        let listener = idle_listener(&coord);
        assert!(!coord.drain(listener, Some(Duration::from_millis(100))).await);
        assert_eq!(coord.open_sessions(), 1);
    }
}
