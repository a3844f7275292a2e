//! Detection Wire Types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque timestamp token attached to a detection snapshot.
///
/// The backend may send either a string or a number. Tokens are only ever
/// compared for equality, never ordered or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampToken {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for TimestampToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampToken::Text(s) => f.write_str(s),
            TimestampToken::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for TimestampToken {
    fn from(value: &str) -> Self {
        TimestampToken::Text(value.to_string())
    }
}

impl From<u64> for TimestampToken {
    fn from(value: u64) -> Self {
        TimestampToken::Number(value.into())
    }
}

/// Per-category detection statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectStats {
    /// Number of instances seen in the frame
    #[serde(default)]
    pub count: u32,
    /// Confidence of each instance, 0.0 to 1.0
    #[serde(default)]
    pub confidences: Vec<f64>,
}

impl ObjectStats {
    /// Create stats from a list of confidences
    pub fn new(count: u32, confidences: Vec<f64>) -> Self {
        Self { count, confidences }
    }

    /// Whether this category carries enough data to be reported
    pub fn is_reportable(&self) -> bool {
        self.count > 0 && !self.confidences.is_empty()
    }

    /// Mean of the confidence values, if any
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.confidences.is_empty() {
            return None;
        }
        let sum: f64 = self.confidences.iter().sum();
        Some(sum / self.confidences.len() as f64)
    }
}

/// One detection-status snapshot returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Whether anything was detected
    #[serde(default)]
    pub detected: bool,
    /// Detected categories, in the order the backend reported them
    #[serde(default)]
    pub objects: IndexMap<String, ObjectStats>,
    /// Snapshot token, absent when the backend has nothing to report
    #[serde(default)]
    pub timestamp: Option<TimestampToken>,
}

impl Sample {
    /// Build a detecting sample
    pub fn detecting(
        objects: impl IntoIterator<Item = (String, ObjectStats)>,
        timestamp: impl Into<TimestampToken>,
    ) -> Self {
        Self {
            detected: true,
            objects: objects.into_iter().collect(),
            timestamp: Some(timestamp.into()),
        }
    }

    /// Category labels in reported order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }
}

/// Body of a log-detection submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDetectionRequest {
    pub camera_id: u32,
    pub weapon_type: String,
    pub confidence_score: f64,
}

/// Successful response to a log-detection submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogDetectionResponse {
    #[serde(default)]
    pub message: String,
    /// A new log record was created (not deduplicated remotely)
    #[serde(default)]
    pub is_new_log: bool,
    #[serde(default)]
    pub incident_id: Option<i64>,
    /// The incident referenced by `incident_id` was created by this call
    #[serde(default)]
    pub is_new_incident: bool,
}

impl LogDetectionResponse {
    /// Incident id, only when this submission opened a new incident
    pub fn new_incident(&self) -> Option<i64> {
        if self.is_new_incident {
            self.incident_id
        } else {
            None
        }
    }
}

/// Incident detail envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentDetail {
    pub incident: serde_json::Value,
}

/// Error body the backend sends with non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteErrorBody {
    pub error: String,
}
