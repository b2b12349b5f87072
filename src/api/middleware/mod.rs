//! API middleware components

pub mod logging;
pub mod metrics;
pub mod rate_limit;

pub use logging::{extract_request_id, logging_middleware, REQUEST_ID_HEADER};
pub use metrics::metrics_middleware;
pub use rate_limit::{client_identity, normalize_client_ip, peer_addr, rate_limit_middleware};
