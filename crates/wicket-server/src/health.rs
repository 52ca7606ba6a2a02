//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::matchmaker::MatchmakerStats;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Connections waiting for a partner.
    pub waiting: usize,
    /// Active pairings, including ones held by a grace period.
    pub pairings: usize,
    /// Pending grace periods.
    pub grace_periods: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, stats: MatchmakerStats) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.connections,
        waiting: stats.waiting,
        pairings: stats.pairings,
        grace_periods: stats.grace_periods,
    }
}
