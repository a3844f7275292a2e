//! In-memory backend for tests and offline runs

use crate::error::DetectionError;
use crate::types::{IncidentDetail, LogDetectionRequest, LogDetectionResponse, Sample};
use crate::client::DetectionApi;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct MockState {
    status: Option<Sample>,
    status_delay: Duration,
    scripted_status: VecDeque<(Result<Sample, DetectionError>, Duration)>,
    log_responses: VecDeque<Result<LogDetectionResponse, DetectionError>>,
    submissions: Vec<LogDetectionRequest>,
    incidents: HashMap<i64, serde_json::Value>,
    status_queries: usize,
}

/// Scriptable [`DetectionApi`] with no network access.
///
/// The status snapshot is repeated on every poll until replaced, the way the
/// real backend keeps serving the last detection. With no snapshot set the
/// backend reports itself unreachable.
#[derive(Default)]
pub struct MockDetectionApi {
    state: Mutex<MockState>,
}

impl MockDetectionApi {
    /// Create an unreachable mock backend
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `sample` on every subsequent poll
    pub fn set_status(&self, sample: Sample) {
        self.state().status = Some(sample);
    }

    /// Make subsequent polls fail with a transport error
    pub fn set_offline(&self) {
        self.state().status = None;
    }

    /// Delay every status response by `delay`
    pub fn set_status_delay(&self, delay: Duration) {
        self.state().status_delay = delay;
    }

    /// Queue the answer for the next poll, delivered after `delay`.
    ///
    /// Queued answers are used in order before falling back to the snapshot
    /// set with [`set_status`](Self::set_status).
    pub fn push_status(&self, status: Result<Sample, DetectionError>, delay: Duration) {
        self.state().scripted_status.push_back((status, delay));
    }

    /// Queue the response for the next log submission.
    ///
    /// When the queue is empty submissions answer with a plain new log record.
    pub fn push_log_response(&self, response: Result<LogDetectionResponse, DetectionError>) {
        self.state().log_responses.push_back(response);
    }

    /// Register incident detail returned by `incident`
    pub fn insert_incident(&self, incident_id: i64, incident: serde_json::Value) {
        self.state().incidents.insert(incident_id, incident);
    }

    /// All submissions received so far, in order
    pub fn submissions(&self) -> Vec<LogDetectionRequest> {
        self.state().submissions.clone()
    }

    /// Number of status polls received
    pub fn status_queries(&self) -> usize {
        self.state().status_queries
    }
}

#[async_trait]
impl DetectionApi for MockDetectionApi {
    async fn detection_status(&self) -> Result<Sample, DetectionError> {
        let (status, delay) = {
            let mut state = self.state();
            state.status_queries += 1;
            match state.scripted_status.pop_front() {
                Some(scripted) => scripted,
                None => (
                    state
                        .status
                        .clone()
                        .ok_or_else(|| DetectionError::Transport("mock backend offline".to_string())),
                    state.status_delay,
                ),
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        status
    }

    async fn log_detection(
        &self,
        _credential: &str,
        request: &LogDetectionRequest,
    ) -> Result<LogDetectionResponse, DetectionError> {
        let mut state = self.state();
        state.submissions.push(request.clone());
        debug!("Mock backend received {} submission(s)", state.submissions.len());

        state.log_responses.pop_front().unwrap_or_else(|| {
            Ok(LogDetectionResponse {
                message: "Detection logged successfully".to_string(),
                is_new_log: true,
                ..Default::default()
            })
        })
    }

    async fn incident(&self, _credential: &str, incident_id: i64) -> Result<IncidentDetail, DetectionError> {
        self.state()
            .incidents
            .get(&incident_id)
            .cloned()
            .map(|incident| IncidentDetail { incident })
            .ok_or_else(|| DetectionError::Rejected {
                status: 404,
                message: "Incident not found".to_string(),
            })
    }
}
