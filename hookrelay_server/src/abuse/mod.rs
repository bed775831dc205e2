//! Abuse prevention module
//!
//! Per-client rate limiting for every route. Endpoint identifiers are free
//! form, so there is no name blocklist.

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, spawn_cleanup, RateLimitConfig, RateLimiter};
