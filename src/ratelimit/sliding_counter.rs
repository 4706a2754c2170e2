//! Sliding window counter.
//!
//! Approximates a true sliding window by weighting the previous window's count
//! by how much of it still overlaps the trailing interval.

use std::time::Instant;
use tracing::{debug, trace};

use super::algorithm::{AdmissionAlgorithm, Decision};
use super::fixed_window::Window;
use super::rules::{RouteConfig, RouteTable};
use super::store::ClientStore;

/// A fixed window plus the count carried over from the window before it.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window: Window,
    previous_count: u32,
}

impl SlidingWindow {
    /// Open a first window at `now` with no carried-over count.
    pub fn new(rule: &RouteConfig, now: Instant) -> Self {
        Self {
            window: Window::new(rule, now),
            previous_count: 0,
        }
    }

    /// Roll over to a new window if the current one has expired.
    pub fn check_window(&mut self, now: Instant) {
        if self.window.is_expired(now) {
            self.previous_count = self.window.take_current(now);
        }
    }

    /// Estimated request count including the request being evaluated.
    pub fn weight(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.window.window_start());
        let fraction = (elapsed.as_secs_f64() / self.window.window_size().as_secs_f64()).min(1.0);

        (1.0 - fraction) * f64::from(self.previous_count)
            + f64::from(self.window.current_requests())
            + 1.0
    }

    /// Admit one request if the weighted estimate stays below capacity.
    pub fn try_acquire(&mut self, now: Instant) -> Decision {
        self.check_window(now);

        if self.weight(now) < f64::from(self.window.capacity()) {
            self.window.record();
            return Decision::admit();
        }

        Decision::reject(self.window.remaining(now))
    }

    /// Count carried over from the window before the current one.
    pub fn previous_count(&self) -> u32 {
        self.previous_count
    }

    /// Requests admitted in the current window.
    pub fn current_requests(&self) -> u32 {
        self.window.current_requests()
    }
}

/// Sliding window counter over all configured routes.
pub struct SlidingWindowCounter {
    windows: ClientStore<SlidingWindow>,
}

impl AdmissionAlgorithm for SlidingWindowCounter {
    fn from_routes(routes: &RouteTable) -> Self {
        Self {
            windows: ClientStore::new(routes),
        }
    }

    fn allow_request_at(&self, client_key: &str, route: &str, now: Instant) -> Decision {
        let Some(slot) = self
            .windows
            .slot(route, client_key, |rule| SlidingWindow::new(rule, now))
        else {
            trace!(route = %route, "Route is whitelisted");
            return Decision::admit();
        };

        let decision = slot.lock().try_acquire(now);
        if !decision.admitted {
            debug!(
                route = %route,
                client = %client_key,
                retry_after = ?decision.retry_after,
                "Sliding window weight over capacity"
            );
        }
        decision
    }

    fn client_count(&self) -> usize {
        self.windows.client_count()
    }
}
