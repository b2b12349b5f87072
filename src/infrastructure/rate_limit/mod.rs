//! Rate limiting infrastructure

mod limiter;

pub use limiter::RateLimiter;
