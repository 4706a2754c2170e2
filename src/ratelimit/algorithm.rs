//! The admission decision contract and the closed set of algorithms.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::warn;

use super::fixed_window::FixedWindowCounter;
use super::rules::RouteTable;
use super::sliding_counter::SlidingWindowCounter;
use super::sliding_log::SlidingWindowLog;
use super::token_bucket::TokenBucket;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub admitted: bool,
    /// How long the client should wait before retrying. Always zero when admitted.
    pub retry_after: Duration,
}

impl Decision {
    /// An admission with no wait.
    pub fn admit() -> Self {
        Self {
            admitted: true,
            retry_after: Duration::ZERO,
        }
    }

    /// A rejection asking the client to wait `retry_after`.
    pub fn reject(retry_after: Duration) -> Self {
        Self {
            admitted: false,
            retry_after,
        }
    }

    /// Whether the request may proceed.
    pub fn is_admitted(&self) -> bool {
        self.admitted
    }
}

/// A rate limiting algorithm keeping per-route, per-client state.
pub trait AdmissionAlgorithm: Send + Sync {
    /// Build the algorithm with one empty client map per configured route.
    fn from_routes(routes: &RouteTable) -> Self
    where
        Self: Sized;

    /// Decide whether `client_key` may call `route` at `now`.
    ///
    /// Routes that are not configured are always admitted.
    fn allow_request_at(&self, client_key: &str, route: &str, now: Instant) -> Decision;

    /// Number of per-client state slots created so far, across all routes.
    fn client_count(&self) -> usize;
}

/// Selector for the globally configured algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlgorithmKind {
    FixedWindow,
    SlidingWindowCounter,
    #[default]
    SlidingWindowLog,
    TokenBucket,
}

impl AlgorithmKind {
    /// Resolve a selector string from configuration.
    ///
    /// Matching ignores case, `-` and `_`, so `TokenBucket`, `token_bucket`
    /// and `token-bucket` are equivalent. Unrecognized names fall back to
    /// the sliding window log.
    pub fn from_selector(selector: &str) -> Self {
        let normalized: String = selector
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "fixedwindowcounter" | "fixedwindow" => AlgorithmKind::FixedWindow,
            "slidingwindowcounter" => AlgorithmKind::SlidingWindowCounter,
            "slidingwindowlog" => AlgorithmKind::SlidingWindowLog,
            "tokenbucket" => AlgorithmKind::TokenBucket,
            _ => {
                warn!(
                    selector = %selector,
                    fallback = %AlgorithmKind::SlidingWindowLog,
                    "Unrecognized algorithm, using fallback"
                );
                AlgorithmKind::SlidingWindowLog
            }
        }
    }

    /// Canonical selector name, as written in rules files.
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::FixedWindow => "FixedWindowCounter",
            AlgorithmKind::SlidingWindowCounter => "SlidingWindowCounter",
            AlgorithmKind::SlidingWindowLog => "SlidingWindowLog",
            AlgorithmKind::TokenBucket => "TokenBucket",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The active algorithm, one variant per implementation.
pub enum Algorithm {
    FixedWindow(FixedWindowCounter),
    SlidingWindowCounter(SlidingWindowCounter),
    SlidingWindowLog(SlidingWindowLog),
    TokenBucket(TokenBucket),
}

impl Algorithm {
    /// Build the selected algorithm for the given routes.
    pub fn new(kind: AlgorithmKind, routes: &RouteTable) -> Self {
        match kind {
            AlgorithmKind::FixedWindow => {
                Algorithm::FixedWindow(FixedWindowCounter::from_routes(routes))
            }
            AlgorithmKind::SlidingWindowCounter => {
                Algorithm::SlidingWindowCounter(SlidingWindowCounter::from_routes(routes))
            }
            AlgorithmKind::SlidingWindowLog => {
                Algorithm::SlidingWindowLog(SlidingWindowLog::from_routes(routes))
            }
            AlgorithmKind::TokenBucket => Algorithm::TokenBucket(TokenBucket::from_routes(routes)),
        }
    }

    /// Which algorithm this is.
    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Algorithm::FixedWindow(_) => AlgorithmKind::FixedWindow,
            Algorithm::SlidingWindowCounter(_) => AlgorithmKind::SlidingWindowCounter,
            Algorithm::SlidingWindowLog(_) => AlgorithmKind::SlidingWindowLog,
            Algorithm::TokenBucket(_) => AlgorithmKind::TokenBucket,
        }
    }

    /// Forward a decision to the active algorithm.
    pub fn allow_request_at(&self, client_key: &str, route: &str, now: Instant) -> Decision {
        match self {
            Algorithm::FixedWindow(inner) => inner.allow_request_at(client_key, route, now),
            Algorithm::SlidingWindowCounter(inner) => inner.allow_request_at(client_key, route, now),
            Algorithm::SlidingWindowLog(inner) => inner.allow_request_at(client_key, route, now),
            Algorithm::TokenBucket(inner) => inner.allow_request_at(client_key, route, now),
        }
    }

    /// Per-client states held by the active algorithm.
    pub fn client_count(&self) -> usize {
        match self {
            Algorithm::FixedWindow(inner) => inner.client_count(),
            Algorithm::SlidingWindowCounter(inner) => inner.client_count(),
            Algorithm::SlidingWindowLog(inner) => inner.client_count(),
            Algorithm::TokenBucket(inner) => inner.client_count(),
        }
    }
}
