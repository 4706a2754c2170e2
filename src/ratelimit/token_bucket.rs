//! Token bucket.
//!
//! Buckets start full, so a client may burst up to `limit` requests, and then
//! regain one token every `interval / limit`.

use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::algorithm::{AdmissionAlgorithm, Decision};
use super::rules::{RouteConfig, RouteTable};
use super::store::ClientStore;

/// Token state for one client on one route.
#[derive(Debug, Clone)]
pub struct Bucket {
    capacity: u32,
    cur_tokens: u32,
    refill_interval: Duration,
    last_refill: Instant,
}

impl Bucket {
    /// Create a full bucket for the route.
    pub fn new(rule: &RouteConfig, now: Instant) -> Self {
        // Sub-nanosecond slices would make the refill division meaningless.
        let refill_interval = (rule.interval / rule.limit).max(Duration::from_nanos(1));
        Self {
            capacity: rule.limit,
            cur_tokens: rule.limit,
            refill_interval,
            last_refill: now,
        }
    }

    /// Add the whole tokens earned since the last refill.
    ///
    /// `last_refill` only moves when at least one token was added, so partial
    /// progress toward the next token is not lost between calls.
    pub fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let tokens_to_add = elapsed.as_nanos() / self.refill_interval.as_nanos();
        if tokens_to_add == 0 {
            return;
        }

        let refilled = (u128::from(self.cur_tokens) + tokens_to_add).min(u128::from(self.capacity));
        self.cur_tokens = refilled as u32;
        self.last_refill = now;
    }

    /// Take one token if any are available after refilling.
    pub fn try_acquire(&mut self, now: Instant) -> Decision {
        self.refill(now);

        if self.cur_tokens > 0 {
            self.cur_tokens -= 1;
            return Decision::admit();
        }

        let since_refill = now.saturating_duration_since(self.last_refill);
        Decision::reject(self.refill_interval.saturating_sub(since_refill))
    }

    /// Tokens currently available.
    pub fn tokens(&self) -> u32 {
        self.cur_tokens
    }

    /// Maximum tokens the bucket holds.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Time to earn one token.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }
}

/// Token buckets over all configured routes.
pub struct TokenBucket {
    buckets: ClientStore<Bucket>,
}

impl AdmissionAlgorithm for TokenBucket {
    fn from_routes(routes: &RouteTable) -> Self {
        Self {
            buckets: ClientStore::new(routes),
        }
    }

    fn allow_request_at(&self, client_key: &str, route: &str, now: Instant) -> Decision {
        let Some(slot) = self
            .buckets
            .slot(route, client_key, |rule| Bucket::new(rule, now))
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
                "Token bucket empty"
            );
        }
        decision
    }

    fn client_count(&self) -> usize {
        self.buckets.client_count()
    }
}
