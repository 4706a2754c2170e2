//! Rate limiting algorithms and per-client state management.

mod algorithm;
mod clock;
mod fixed_window;
mod limiter;
mod rules;
mod sliding_counter;
mod sliding_log;
mod store;
mod token_bucket;

pub use algorithm::{AdmissionAlgorithm, Algorithm, AlgorithmKind, Decision};
pub use clock::{Clock, SystemClock};
pub use fixed_window::{FixedWindowCounter, Window};
pub use limiter::RateLimiter;
pub use rules::{parse_interval, RateLimitConfig, RawRouteConfig, RawRulesFile, RouteConfig, RouteTable};
pub use sliding_counter::{SlidingWindow, SlidingWindowCounter};
pub use sliding_log::{RequestLog, SlidingWindowLog};
pub use store::{ClientSlot, ClientStore};
pub use token_bucket::{Bucket, TokenBucket};
