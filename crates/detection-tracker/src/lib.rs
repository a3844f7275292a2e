//! Detection Tracker
//!
//! Decides which polled samples are new events and keeps a bounded,
//! newest-first history of them.

mod dedup;
mod history;

pub use dedup::{Deduplicator, Verdict};
pub use history::{DetectionHistory, HistoryEntry, DEFAULT_HISTORY_CAPACITY};
