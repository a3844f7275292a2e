//! Externally observable service state

use alerting::ActiveAlert;
use chrono::{DateTime, Utc};
use detection_protocol::Sample;
use detection_tracker::HistoryEntry;
use serde::Serialize;

/// Snapshot pushed to every listener
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateState {
    /// Latest sample polled, new event or not
    pub current_sample: Sample,
    /// Accepted events, newest first
    pub history: Vec<HistoryEntry>,
    /// Last successful poll; `None` until the first one
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Outcome of the most recent poll
    pub is_connected: bool,
    pub active_alert: Option<ActiveAlert>,
}
