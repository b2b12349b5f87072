//! Infrastructure layer - External service implementations

pub mod cache;
pub mod embedding;
pub mod logging;
pub mod observability;
pub mod rate_limit;
pub mod services;
pub mod store;
pub mod upstream;
pub mod vector;
pub mod write_back;
