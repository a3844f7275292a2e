//! Report Cooldown Gate
//!
//! Advises whether a detection for a (camera, category) pair is worth
//! submitting. The gate never learns about a submission by itself: callers
//! `mark_reported` only once the backend confirms a new log record.

use crate::category::normalize_category;
use crate::window::WindowCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cooldown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Suppression window per (camera, category) in seconds (default: 300)
    pub cooldown_seconds: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 300, // 5 minutes
        }
    }
}

/// (camera, normalized category) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CooldownKey {
    pub source_id: u32,
    pub category: String,
}

impl CooldownKey {
    /// Build a key, normalizing the raw detector label
    pub fn new(source_id: u32, label: &str) -> Self {
        Self {
            source_id,
            category: normalize_category(label),
        }
    }
}

impl fmt::Display for CooldownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.category)
    }
}

/// Per-key report suppression
#[derive(Debug, Clone)]
pub struct CooldownGate {
    reported: WindowCache<CooldownKey>,
}

impl CooldownGate {
    /// Create a gate with the configured window
    pub fn new(config: &CooldownConfig) -> Self {
        info!("Creating cooldown gate with {}s window", config.cooldown_seconds);
        Self {
            reported: WindowCache::new(Duration::from_secs(config.cooldown_seconds)),
        }
    }

    /// True when `key` was reported less than one window before `now`
    pub fn should_suppress(&self, key: &CooldownKey, now: Instant) -> bool {
        match self.reported.remaining(key, now) {
            Some(remaining) => {
                debug!(
                    "Skipping {} - cooldown {}s remaining",
                    key,
                    remaining.as_secs()
                );
                true
            }
            None => false,
        }
    }

    /// Start a cooldown for `key` at `now`
    pub fn mark_reported(&mut self, key: CooldownKey, now: Instant) {
        debug!("Cooldown started for {}", key);
        self.reported.put(key, now);
    }

    /// Keys currently cooling down
    pub fn hot_keys(&self, now: Instant) -> Vec<CooldownKey> {
        self.reported.live_keys(now)
    }

    /// Forget every cooldown
    pub fn clear(&mut self) {
        self.reported.clear();
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(&CooldownConfig::default())
    }
}
