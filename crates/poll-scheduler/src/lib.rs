//! Poll Scheduler
//!
//! Drives a periodic tick on a fixed interval. Each tick runs as its own
//! task so a slow or failed tick never delays the next one.

mod scheduler;

pub use scheduler::{PollScheduler, SchedulerConfig};

use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("No tokio runtime available to drive the scheduler")]
    NoRuntime,
    #[error("Poll interval must be greater than zero")]
    ZeroInterval,
}
