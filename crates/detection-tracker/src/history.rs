//! Bounded Detection History

use detection_protocol::{ObjectStats, Sample, TimestampToken};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of retained events
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Retained copy of an accepted detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub detected: bool,
    pub objects: IndexMap<String, ObjectStats>,
    pub timestamp: Option<TimestampToken>,
}

impl From<&Sample> for HistoryEntry {
    fn from(sample: &Sample) -> Self {
        Self {
            detected: sample.detected,
            objects: sample.objects.clone(),
            timestamp: sample.timestamp.clone(),
        }
    }
}

/// Newest-first history that drops the oldest entry on overflow
#[derive(Debug, Clone)]
pub struct DetectionHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl DetectionHistory {
    /// Create a history holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert as newest entry
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(entry);
    }

    /// Entries, newest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Most recent entry
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Owned copy, newest first
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for DetectionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(ts: u64) -> HistoryEntry {
        HistoryEntry {
            detected: true,
            objects: [("knife".to_string(), ObjectStats::new(1, vec![0.5]))]
                .into_iter()
                .collect(),
            timestamp: Some(ts.into()),
        }
    }

    #[test]
    fn test_newest_first() {
        let mut history = DetectionHistory::default();
        history.push(entry(1));
        history.push(entry(2));

        let stamps: Vec<_> = history.iter().map(|e| e.timestamp.clone().unwrap()).collect();
        assert_eq!(stamps, vec![TimestampToken::from(2u64), TimestampToken::from(1u64)]);
        assert_eq!(history.latest(), Some(&entry(2)));
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut history = DetectionHistory::new(3);
        for ts in 0..5 {
            history.push(entry(ts));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.to_vec(), vec![entry(4), entry(3), entry(2)]);
    }

    proptest! {
        #[test]
        fn prop_length_is_bounded(n in 0usize..200) {
            let mut history = DetectionHistory::default();
            for ts in 0..n {
                history.push(entry(ts as u64));
            }

            prop_assert_eq!(history.len(), n.min(DEFAULT_HISTORY_CAPACITY));
            if n > 0 {
                prop_assert_eq!(history.latest(), Some(&entry(n as u64 - 1)));
            }
        }
    }
}
