//! Process-wide request and error counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::observability::metrics;

/// Counters shared by every request of one server.
#[derive(Debug)]
pub struct ServerState {
    started_at: Instant,
    request_count: AtomicU64,
    error_count: AtomicU64,
}

/// Point-in-time view of [`ServerState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub request_count: u64,
    pub error_count: u64,
    pub uptime_secs: u64,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }

    pub fn add_request_count(&self, n: u64) {
        self.request_count.fetch_add(n, Ordering::Relaxed);
        metrics::inc_requests(n);
    }

    pub fn add_error_count(&self, n: u64) {
        self.error_count.fetch_add(n, Ordering::Relaxed);
        metrics::inc_errors(n);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            request_count: self.request_count(),
            error_count: self.error_count(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let state = ServerState::new();
        state.add_request_count(1);
        state.add_request_count(2);
        state.add_error_count(1);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.request_count, 3);
        assert_eq!(snapshot.error_count, 1);
    }
}
