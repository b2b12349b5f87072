//! Rate limiting domain - fixed-window admission control

mod config;
mod decision;

pub use self::config::{FailureMode, RateLimitConfig};
pub use decision::{DenyReason, RateLimitCounter, RateLimitDecision, LIMIT_KEY_PREFIX};
