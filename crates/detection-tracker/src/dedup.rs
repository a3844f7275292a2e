//! Detection Deduplicator
//!
//! The backend keeps serving the same snapshot across polls until it
//! changes, so only transitions to a new snapshot token count as events.
//! Novelty is judged against the last *accepted* token: an intervening
//! non-detecting sample does not make a repeated token new again.

use crate::history::{DetectionHistory, HistoryEntry};
use detection_protocol::{Sample, TimestampToken};
use tracing::debug;

/// Classification of a polled sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// New event, recorded in history and forwarded downstream
    NewEvent,
    /// Detecting sample carrying an already accepted token
    Repeat,
    /// Nothing detected, no objects, or no token
    Inactive,
}

impl Verdict {
    pub fn is_new_event(self) -> bool {
        self == Verdict::NewEvent
    }
}

/// Novelty classifier owning the event history
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    history: DetectionHistory,
    last_accepted: Option<TimestampToken>,
}

impl Deduplicator {
    /// Create a deduplicator whose history keeps `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            history: DetectionHistory::new(capacity),
            last_accepted: None,
        }
    }

    /// Classify without recording anything
    pub fn classify(&self, sample: &Sample) -> Verdict {
        let token = match &sample.timestamp {
            Some(token) if sample.detected && !sample.objects.is_empty() => token,
            _ => return Verdict::Inactive,
        };

        if self.last_accepted.as_ref() == Some(token) {
            Verdict::Repeat
        } else {
            Verdict::NewEvent
        }
    }

    /// Classify and, for a new event, record it
    pub fn observe(&mut self, sample: &Sample) -> Verdict {
        let verdict = self.classify(sample);

        if verdict.is_new_event() {
            self.last_accepted = sample.timestamp.clone();
            self.history.push(HistoryEntry::from(sample));
            debug!(
                "Accepted new detection (history: {}/{})",
                self.history.len(),
                self.history.capacity()
            );
        }

        verdict
    }

    /// Event history, newest first
    pub fn history(&self) -> &DetectionHistory {
        &self.history
    }

    /// Token of the most recently accepted event
    pub fn last_accepted(&self) -> Option<&TimestampToken> {
        self.last_accepted.as_ref()
    }

    /// Forget all events
    pub fn clear(&mut self) {
        self.history.clear();
        self.last_accepted = None;
    }
}
