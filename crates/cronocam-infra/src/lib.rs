//! Cronocam Infrastructure Library
//!
//! Shared runtime plumbing for the cronocam crates:
//! - Request rate limiting (token bucket)
//! - Tracing initialization

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

#[cfg(feature = "observability-basic")]
pub use telemetry::init_telemetry;

#[cfg(feature = "rate-limit")]
pub use rate_limit::{AcquireError, RateLimiter};
