//! Write-back infrastructure - asynchronous cache population

mod queue;

pub use queue::{WriteBackConfig, WriteBackJob, WriteBackQueue, WriteBackStats};
