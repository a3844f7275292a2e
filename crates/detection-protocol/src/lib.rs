//! Detection Backend Protocol
//!
//! This crate provides the wire types exchanged with the weapon detection
//! backend and an async client for its three endpoints. A scriptable
//! in-memory backend is included for tests.

mod client;
mod error;
mod mock;
mod types;

pub use client::{ClientConfig, DetectionApi, HttpDetectionClient};
pub use error::DetectionError;
pub use mock::MockDetectionApi;
pub use types::{
    IncidentDetail, LogDetectionRequest, LogDetectionResponse, ObjectStats, RemoteErrorBody, Sample,
    TimestampToken,
};

/// Backend endpoint paths
pub mod endpoint {
    /// Latest detection snapshot
    pub const DETECTION_STATUS: &str = "/api/detection-status";
    /// Detection log submission
    pub const LOG_DETECTION: &str = "/api/log-detection";

    /// Incident detail for `incident_id`
    pub fn incident(incident_id: i64) -> String {
        format!("/api/incidents/{}", incident_id)
    }
}
