//! Active Alert Slot
//!
//! Holds the one incident awaiting operator attention. A newer incident
//! overwrites the held one; nothing is queued or merged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The incident currently shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAlert {
    /// Backend incident id
    pub id: i64,
    /// Incident detail as returned by the backend
    pub payload: serde_json::Value,
    /// When this alert entered the slot
    pub created_at: DateTime<Utc>,
}

/// Single-cell alert holder
#[derive(Debug, Clone, Default)]
pub struct AlertSlot {
    current: Option<ActiveAlert>,
}

impl AlertSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held alert. Returns the alert that was displaced.
    pub fn set(&mut self, id: i64, payload: serde_json::Value) -> Option<ActiveAlert> {
        let replaced = self.current.replace(ActiveAlert {
            id,
            payload,
            created_at: Utc::now(),
        });

        match &replaced {
            Some(old) => info!("Alert {} replaced by incident {}", old.id, id),
            None => info!("Alert raised for incident {}", id),
        }
        replaced
    }

    /// Clear the slot. Returns the dismissed alert, if any.
    pub fn dismiss(&mut self) -> Option<ActiveAlert> {
        let dismissed = self.current.take();
        if let Some(alert) = &dismissed {
            info!("Alert {} dismissed", alert.id);
        }
        dismissed
    }

    pub fn get(&self) -> Option<&ActiveAlert> {
        self.current.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}
