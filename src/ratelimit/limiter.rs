//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, trace};

use super::algorithm::{Algorithm, AlgorithmKind, Decision};
use super::clock::{Clock, SystemClock};
use super::rules::{RateLimitConfig, RouteTable};

/// The engine facade: one globally selected algorithm behind a single call.
///
/// This struct is thread-safe and can be shared across multiple tasks. It is
/// built once at start-up and only the per-client state inside the algorithm
/// changes afterwards.
pub struct RateLimiter {
    algorithm: Algorithm,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter running `kind` over the given routes.
    pub fn new(kind: AlgorithmKind, routes: &RouteTable) -> Self {
        Self::with_clock(kind, routes, Arc::new(SystemClock))
    }

    /// Create a rate limiter from a loaded configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.algorithm, &config.routes)
    }

    /// Create a rate limiter with a custom time source.
    pub fn with_clock(kind: AlgorithmKind, routes: &RouteTable, clock: Arc<dyn Clock>) -> Self {
        info!(
            algorithm = %kind,
            routes = routes.len(),
            "Rate limiter initialized"
        );
        Self {
            algorithm: Algorithm::new(kind, routes),
            clock,
        }
    }

    /// Decide whether `client_key` may call `route` now.
    pub fn allow_request(&self, client_key: &str, route: &str) -> Decision {
        self.allow_request_at(client_key, route, self.clock.now())
    }

    /// Decide whether `client_key` may call `route` at the given instant.
    pub fn allow_request_at(&self, client_key: &str, route: &str, now: Instant) -> Decision {
        let decision = self.algorithm.allow_request_at(client_key, route, now);
        trace!(
            client = %client_key,
            route = %route,
            admitted = decision.admitted,
            retry_after = ?decision.retry_after,
            "Admission decision"
        );
        decision
    }

    /// The active algorithm.
    pub fn algorithm(&self) -> AlgorithmKind {
        self.algorithm.kind()
    }

    /// Get the number of per-client states created so far.
    pub fn client_count(&self) -> usize {
        self.algorithm.client_count()
    }
}
