//! Request rate limiting

mod limiter;

pub use limiter::{AcquireError, RateLimiter};
