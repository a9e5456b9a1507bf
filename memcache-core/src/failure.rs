//! Failure manager. Per-server rolling failure accounting that gates the
//! connector, never the selector — a shunned server still gets its keys
//! assigned; those requests just fail fast.

use hashbrown::HashMap;
use std::time::{Duration, Instant};

struct Window {
    count: u32,
    window_start: Instant,
    shunned_until: Option<Instant>,
}

/// Tracks `(count, window_start)` per server and decides whether the connector may touch
/// it. `max_failures == 0` disables shunning entirely.
pub struct FailureManager {
    max_failures: u32,
    failure_timeout: Duration,
    windows: HashMap<usize, Window>,
}

impl FailureManager {
    pub fn new(max_failures: u32, failure_timeout: Duration) -> FailureManager {
        FailureManager {
            max_failures,
            failure_timeout,
            windows: HashMap::new(),
        }
    }

    /// Record a connect/protocol error against `server_index` at time `now`.
    pub fn record_failure(&mut self, server_index: usize, now: Instant) {
        if self.max_failures == 0 {
            return;
        }

        let timeout = self.failure_timeout;
        let entry = self.windows.entry(server_index).or_insert_with(|| Window {
            count: 0,
            window_start: now,
            shunned_until: None,
        });

        if now.duration_since(entry.window_start) > timeout {
            entry.count = 1;
            entry.window_start = now;
            entry.shunned_until = None;
        } else {
            entry.count += 1;
        }

        if entry.count >= self.max_failures {
            let shun_until = entry.window_start + timeout;
            if entry.shunned_until.is_none() {
                tracing::warn!(server_index, ?shun_until, "shunning server after failure burst");
            }
            entry.shunned_until = Some(shun_until);
        }
    }

    /// Clear a server's failure window on a successful connect/operation.
    pub fn record_success(&mut self, server_index: usize) {
        self.windows.remove(&server_index);
    }

    /// Whether the connector may currently attempt to reach `server_index`.
    pub fn is_shunned(&mut self, server_index: usize, now: Instant) -> bool {
        match self.windows.get_mut(&server_index) {
            Some(window) => match window.shunned_until {
                Some(until) if now >= until => {
                    window.shunned_until = None;
                    window.count = 0;
                    false
                }
                Some(_) => true,
                None => false,
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_when_max_failures_zero() {
        let mut mgr = FailureManager::new(0, Duration::from_secs(10));
        let now = Instant::now();
        for _ in 0..100 {
            mgr.record_failure(0, now);
        }
        assert!(!mgr.is_shunned(0, now));
    }

    #[test]
    fn shuns_after_burst_and_clears_after_timeout() {
        let mut mgr = FailureManager::new(3, Duration::from_millis(50));
        let t0 = Instant::now();

        mgr.record_failure(0, t0);
        assert!(!mgr.is_shunned(0, t0));
        mgr.record_failure(0, t0);
        assert!(!mgr.is_shunned(0, t0));
        mgr.record_failure(0, t0);
        assert!(mgr.is_shunned(0, t0));

        // Still shunned just before the window elapses.
        assert!(mgr.is_shunned(0, t0 + Duration::from_millis(40)));
        // Cleared once the window has fully elapsed.
        assert!(!mgr.is_shunned(0, t0 + Duration::from_millis(60)));
    }

    #[test]
    fn window_resets_after_timeout_without_reaching_threshold() {
        let mut mgr = FailureManager::new(3, Duration::from_millis(50));
        let t0 = Instant::now();

        mgr.record_failure(0, t0);
        mgr.record_failure(0, t0 + Duration::from_millis(60));
        // Second failure arrived after the window elapsed, so it starts a fresh window of 1.
        assert!(!mgr.is_shunned(0, t0 + Duration::from_millis(60)));
    }

    #[test]
    fn success_clears_window() {
        let mut mgr = FailureManager::new(2, Duration::from_secs(10));
        let t0 = Instant::now();
        mgr.record_failure(0, t0);
        mgr.record_success(0);
        mgr.record_failure(0, t0);
        assert!(!mgr.is_shunned(0, t0));
    }
}
