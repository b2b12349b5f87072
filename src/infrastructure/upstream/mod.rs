//! Upstream infrastructure - forwarding, retries and request rewriting

mod director;
mod http_transport;
mod retry;

pub use director::{strip_hop_by_hop, RequestDirector};
pub use http_transport::ReqwestTransport;
pub use retry::{RetryConfig, RetryingTransport};
