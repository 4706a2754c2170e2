//! Turnstile - In-process Request Admission Controller
//!
//! This crate decides, per client and route, whether a request may proceed and
//! how long a rejected client should wait. Four interchangeable algorithms are
//! available (fixed window counter, sliding window counter, sliding window log
//! and token bucket); one is selected globally at start-up.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
