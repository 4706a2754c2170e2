//! HTTP transport for the admission controller.
//!
//! Every path is routed to a single handler that asks the rate limiter about
//! the caller's IP address and the request path.

mod server;
mod service;

pub use server::HttpServer;
pub use service::{retry_after_secs, router};
