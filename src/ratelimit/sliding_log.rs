//! Sliding window log.
//!
//! Keeps the exact timestamps of admitted requests within the trailing
//! interval. This is the most precise algorithm and also the most memory
//! hungry: each client holds up to `limit` timestamps, and a decision may prune
//! up to `limit` of them.
//!
//! Pruning happens inside the same critical section as the admission, so a
//! concurrent request for the same client never observes a half-pruned log.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::algorithm::{AdmissionAlgorithm, Decision};
use super::rules::{RouteConfig, RouteTable};
use super::store::ClientStore;

/// Upper bound on the capacity reserved up front for a single client log.
const MAX_PRESIZED_ENTRIES: usize = 4096;

/// Admitted request timestamps for one client on one route, oldest first.
#[derive(Debug, Clone)]
pub struct RequestLog {
    entries: VecDeque<Instant>,
    limit: usize,
    interval: Duration,
}

impl RequestLog {
    /// Create an empty log sized for the route's limit.
    pub fn new(rule: &RouteConfig) -> Self {
        let limit = rule.limit as usize;
        Self {
            entries: VecDeque::with_capacity(limit.min(MAX_PRESIZED_ENTRIES)),
            limit,
            interval: rule.interval,
        }
    }

    /// Drop entries that are no longer inside `(now - interval, now]`.
    pub fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.entries.front() {
            if now.saturating_duration_since(oldest) < self.interval {
                break;
            }
            self.entries.pop_front();
        }
    }

    /// Admit one request if fewer than `limit` entries remain in the interval.
    ///
    /// An instant older than the newest entry (a caller that read the clock
    /// before waiting on the lock) is treated as the newest entry's instant,
    /// so the log stays sorted and front-only pruning stays exact.
    pub fn try_acquire(&mut self, now: Instant) -> Decision {
        let now = self.entries.back().map_or(now, |newest| now.max(*newest));

        // Optimistic path: room is available without looking at old entries.
        if self.entries.len() < self.limit {
            self.entries.push_back(now);
            self.prune(now);
            return Decision::admit();
        }

        self.prune(now);
        if self.entries.len() < self.limit {
            self.entries.push_back(now);
            return Decision::admit();
        }

        Decision::reject(self.time_until_oldest_expires(now))
    }

    /// Time until the oldest retained entry leaves the trailing interval.
    fn time_until_oldest_expires(&self, now: Instant) -> Duration {
        self.entries
            .front()
            .map(|oldest| {
                self.interval
                    .saturating_sub(now.saturating_duration_since(*oldest))
            })
            .unwrap_or(Duration::ZERO)
    }

    /// Number of retained timestamps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timestamps are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retained timestamps, oldest first.
    pub fn timestamps(&self) -> impl Iterator<Item = &Instant> {
        self.entries.iter()
    }
}

/// Sliding window log over all configured routes.
pub struct SlidingWindowLog {
    logs: ClientStore<RequestLog>,
}

impl AdmissionAlgorithm for SlidingWindowLog {
    fn from_routes(routes: &RouteTable) -> Self {
        Self {
            logs: ClientStore::new(routes),
        }
    }

    fn allow_request_at(&self, client_key: &str, route: &str, now: Instant) -> Decision {
        let Some(slot) = self.logs.slot(route, client_key, RequestLog::new) else {
            trace!(route = %route, "Route is whitelisted");
            return Decision::admit();
        };

        let decision = slot.lock().try_acquire(now);
        if !decision.admitted {
            debug!(
                route = %route,
                client = %client_key,
                retry_after = ?decision.retry_after,
                "Request log full"
            );
        }
        decision
    }

    fn client_count(&self) -> usize {
        self.logs.client_count()
    }
}
