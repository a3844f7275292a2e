//! Time-Windowed Cache
//!
//! Remembers when each key was last written and treats entries older than
//! the window as absent. Expired entries are dropped on `put` or on an
//! explicit `purge_expired`; there is no background sweep.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Map of key to write time, valid for a fixed window
#[derive(Debug, Clone)]
pub struct WindowCache<K> {
    window: Duration,
    entries: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> WindowCache<K> {
    /// Create an empty cache with the given validity window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Write time of `key`, if written less than one window before `now`
    pub fn get(&self, key: &K, now: Instant) -> Option<Instant> {
        self.entries
            .get(key)
            .copied()
            .filter(|written| !self.is_expired(*written, now))
    }

    /// Record `key` as written at `now`, purging expired entries first
    pub fn put(&mut self, key: K, now: Instant) {
        self.purge_expired(now);
        self.entries.insert(key, now);
    }

    /// Drop every entry older than the window. Returns how many were dropped.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let window = self.window;
        self.entries
            .retain(|_, written| now.saturating_duration_since(*written) < window);
        before - self.entries.len()
    }

    /// Time left before `key` expires
    pub fn remaining(&self, key: &K, now: Instant) -> Option<Duration> {
        self.get(key, now)
            .map(|written| self.window - now.saturating_duration_since(written))
    }

    /// Keys still inside the window at `now`
    pub fn live_keys(&self, now: Instant) -> Vec<K> {
        self.entries
            .iter()
            .filter(|(_, written)| !self.is_expired(**written, now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn is_expired(&self, written: Instant, now: Instant) -> bool {
        now.saturating_duration_since(written) >= self.window
    }
}
