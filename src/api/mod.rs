//! API layer - operational endpoints, proxy fallback and middleware

pub mod health;
pub mod middleware;
pub mod proxy;
pub mod router;
pub mod state;
pub mod types;

pub use router::create_router;
pub use state::AppState;
