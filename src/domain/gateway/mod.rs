//! Gateway domain - request context, upstream messages and transport seam

mod context;
mod message;
mod transport;

pub use context::{
    extract_prompt, CacheStatus, RequestContext, CACHE_HIT_HEADER, CACHE_TIER_HEADER,
};
pub use message::{UpstreamRequest, UpstreamResponse};
pub use transport::UpstreamTransport;

#[cfg(test)]
pub use transport::MockUpstreamTransport;
