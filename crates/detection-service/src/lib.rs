//! Detection Service
//!
//! Polls the detection backend on a fixed interval and turns its snapshots
//! into operator-facing state:
//! - novelty filtering with a bounded event history
//! - per (camera, category) report cooldown
//! - one active alert, replaced by newer incidents
//! - state fan-out to subscribed listeners

mod config;
mod hub;
mod notify;
mod service;
mod state;

pub use config::ServiceConfig;
pub use hub::{Listener, ListenerHub, ListenerResult, Subscription};
pub use notify::{AlertNotifier, Beep, Notification, NotifyError, SilentNotifier, TerminalNotifier, ALERT_PATTERN};
pub use service::DetectionService;
pub use state::AggregateState;

use poll_scheduler::SchedulerError;
use thiserror::Error;

/// Service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("A non-empty credential is required to start polling")]
    MissingCredential,

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}
