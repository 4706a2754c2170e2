//! Fixed window counter.
//!
//! Each client gets a counter that resets once its window has fully elapsed.
//! Up to `2 x limit` requests may pass across a window boundary; that burst is
//! inherent to the algorithm.

use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::algorithm::{AdmissionAlgorithm, Decision};
use super::rules::{RouteConfig, RouteTable};
use super::store::ClientStore;

/// A counting window for one client on one route.
#[derive(Debug, Clone)]
pub struct Window {
    /// Maximum requests per window, copied from the route at creation
    capacity: u32,
    /// Requests admitted in the current window
    current_requests: u32,
    /// When the current window started
    window_start: Instant,
    /// Length of a window
    window_size: Duration,
}

impl Window {
    /// Open a first window at `now` with the route's limit and interval.
    pub fn new(rule: &RouteConfig, now: Instant) -> Self {
        Self {
            capacity: rule.limit,
            current_requests: 0,
            window_start: now,
            window_size: rule.interval,
        }
    }

    /// Whether the window starting at `window_start` is over at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.window_size
    }

    /// Start a fresh window at `now` if the current one has expired.
    pub fn check_window(&mut self, now: Instant) {
        if self.is_expired(now) {
            self.current_requests = 0;
            self.window_start = now;
        }
    }

    /// Time left until the current window ends, zero if already over.
    pub fn remaining(&self, now: Instant) -> Duration {
        (self.window_start + self.window_size).saturating_duration_since(now)
    }

    /// Admit one request if the window has room.
    pub fn try_acquire(&mut self, now: Instant) -> Decision {
        self.check_window(now);

        if self.current_requests < self.capacity {
            self.current_requests += 1;
            return Decision::admit();
        }

        Decision::reject(self.remaining(now))
    }

    /// Maximum requests per window.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Requests admitted in the current window.
    pub fn current_requests(&self) -> u32 {
        self.current_requests
    }

    /// When the current window opened.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Length of each window.
    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    pub(super) fn take_current(&mut self, now: Instant) -> u32 {
        self.window_start = now;
        std::mem::take(&mut self.current_requests)
    }

    pub(super) fn record(&mut self) {
        self.current_requests += 1;
    }
}

/// Fixed window counter over all configured routes.
pub struct FixedWindowCounter {
    windows: ClientStore<Window>,
}

impl AdmissionAlgorithm for FixedWindowCounter {
    fn from_routes(routes: &RouteTable) -> Self {
        Self {
            windows: ClientStore::new(routes),
        }
    }

    fn allow_request_at(&self, client_key: &str, route: &str, now: Instant) -> Decision {
        let Some(slot) = self
            .windows
            .slot(route, client_key, |rule| Window::new(rule, now))
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
                "Fixed window exhausted"
            );
        }
        decision
    }

    fn client_count(&self) -> usize {
        self.windows.client_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, interval: Duration) -> FixedWindowCounter {
        let rule = RouteConfig::new("/api", limit, interval).unwrap();
        FixedWindowCounter::from_routes(&RouteTable::new([rule]).unwrap())
    }

    #[test]
    fn test_scenario_two_per_second() {
        let fw = limiter(2, Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(fw.allow_request_at("c", "/api", t0).admitted);
        assert!(fw.allow_request_at("c", "/api", t0 + Duration::from_millis(100)).admitted);

        let rejected = fw.allow_request_at("c", "/api", t0 + Duration::from_millis(200));
        assert!(!rejected.admitted);
        assert_eq!(rejected.retry_after, Duration::from_millis(800));
    }

    #[test]
    fn test_rejects_after_limit() {
        let fw = limiter(5, Duration::from_secs(10));
        let t0 = Instant::now();

        for i in 0..5 {
            let at = t0 + Duration::from_millis(i * 10);
            assert!(fw.allow_request_at("c", "/api", at).admitted, "request {i}");
        }
        assert!(!fw.allow_request_at("c", "/api", t0 + Duration::from_secs(9)).admitted);
    }

    #[test]
    fn test_reset_restores_capacity_once() {
        let fw = limiter(3, Duration::from_secs(1));
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(fw.allow_request_at("c", "/api", t0).admitted);
        }
        // Rejected requests pile up during the window without affecting the reset.
        for _ in 0..20 {
            assert!(!fw.allow_request_at("c", "/api", t0 + Duration::from_millis(500)).admitted);
        }

        let t1 = t0 + Duration::from_secs(1);
        for _ in 0..3 {
            assert!(fw.allow_request_at("c", "/api", t1).admitted);
        }
        let rejected = fw.allow_request_at("c", "/api", t1 + Duration::from_millis(250));
        assert!(!rejected.admitted);
        assert_eq!(rejected.retry_after, Duration::from_millis(750));
    }

    #[test]
    fn test_boundary_burst_is_allowed() {
        let fw = limiter(2, Duration::from_secs(1));
        let t0 = Instant::now();
        let late = t0 + Duration::from_millis(999);
        let early_next = t0 + Duration::from_millis(1000);

        assert!(fw.allow_request_at("c", "/api", t0).admitted);
        assert!(fw.allow_request_at("c", "/api", late).admitted);
        assert!(fw.allow_request_at("c", "/api", early_next).admitted);
        assert!(fw.allow_request_at("c", "/api", early_next).admitted);
        assert!(!fw.allow_request_at("c", "/api", early_next).admitted);
    }

    #[test]
    fn test_clients_are_independent() {
        let fw = limiter(1, Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(fw.allow_request_at("a", "/api", t0).admitted);
        assert!(fw.allow_request_at("b", "/api", t0).admitted);
        assert!(!fw.allow_request_at("a", "/api", t0).admitted);
        assert_eq!(fw.client_count(), 2);
    }

    #[test]
    fn test_whitelisted_route() {
        let fw = limiter(1, Duration::from_secs(1));
        let t0 = Instant::now();

        for _ in 0..1000 {
            assert_eq!(fw.allow_request_at("c", "/other", t0), Decision::admit());
        }
        assert_eq!(fw.client_count(), 0);
    }

    #[test]
    fn test_clock_going_backwards_clamps_wait() {
        let rule = RouteConfig::new("/api", 1, Duration::from_secs(1)).unwrap();
        let t0 = Instant::now();
        let mut window = Window::new(&rule, t0 + Duration::from_secs(5));

        assert!(window.try_acquire(t0 + Duration::from_secs(5)).admitted);
        // Earlier than window_start: not expired, wait measured from the real end.
        let rejected = window.try_acquire(t0);
        assert!(!rejected.admitted);
        assert_eq!(rejected.retry_after, Duration::from_secs(6));

        assert_eq!(window.remaining(t0 + Duration::from_secs(60)), Duration::ZERO);
    }
}
