//! Service configuration

use alerting::CooldownConfig;
use detection_tracker::DEFAULT_HISTORY_CAPACITY;
use poll_scheduler::SchedulerConfig;
use reporter::ReporterConfig;
use serde::{Deserialize, Serialize};

/// Detection service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Poll period in milliseconds (default: 2000)
    pub poll_interval_ms: u64,
    /// Camera this service reports for
    pub camera_id: u32,
    /// Report cooldown per (camera, category) in seconds (default: 300)
    pub cooldown_seconds: u64,
    /// Retained events (default: 50)
    pub history_capacity: usize,
    /// Delay between category submissions of one event (milliseconds)
    pub pacing_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            camera_id: 1,
            cooldown_seconds: 300,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            pacing_ms: 100,
        }
    }
}

impl ServiceConfig {
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval_ms: self.poll_interval_ms,
        }
    }

    pub fn cooldown(&self) -> CooldownConfig {
        CooldownConfig {
            cooldown_seconds: self.cooldown_seconds,
        }
    }

    pub fn reporter(&self) -> ReporterConfig {
        ReporterConfig {
            camera_id: self.camera_id,
            pacing_ms: self.pacing_ms,
        }
    }
}
