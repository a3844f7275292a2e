//! Detection Reporter
//!
//! Submits each category of a confirmed event to the backend log endpoint:
//! - cooldown advice is consulted before submitting
//! - a cooldown starts only when the backend confirms a new log record
//! - a newly opened incident is fetched and handed to the alert slot
//! - failures are logged and never stop sibling categories

use alerting::CooldownKey;
use detection_protocol::{DetectionApi, DetectionError, LogDetectionRequest, Sample};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Reporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Camera id submitted with every record
    pub camera_id: u32,
    /// Delay after each submission within one event (milliseconds)
    pub pacing_ms: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            camera_id: 1,
            pacing_ms: 100,
        }
    }
}

/// Shared state the reporter reads and updates while reporting.
///
/// Implementations must not hold locks across calls; each method is a short
/// critical section.
pub trait ReportContext: Send + Sync {
    /// Cooldown advice for `key`
    fn should_suppress(&self, key: &CooldownKey, now: Instant) -> bool;

    /// Backend confirmed a new log record for `key`
    fn mark_reported(&self, key: CooldownKey, now: Instant);

    /// Backend opened a new incident and its detail was fetched
    fn incident_opened(&self, incident_id: i64, incident: serde_json::Value);
}

/// Result of reporting one category
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryOutcome {
    /// Count or confidences missing
    Skipped,
    /// Still cooling down, nothing submitted
    Suppressed,
    /// Submitted and answered
    Submitted {
        new_log: bool,
        new_incident: Option<i64>,
    },
    /// Submission failed; the message is diagnostic only
    Failed(String),
}

/// Per-category outcome of one event
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryReport {
    pub key: CooldownKey,
    pub outcome: CategoryOutcome,
}

/// Detection log reporter
pub struct Reporter {
    api: Arc<dyn DetectionApi>,
    config: ReporterConfig,
}

impl Reporter {
    /// Create a new reporter
    pub fn new(api: Arc<dyn DetectionApi>, config: ReporterConfig) -> Self {
        Self { api, config }
    }

    /// Report every category of `sample`, in reported order
    pub async fn report_event(
        &self,
        credential: &str,
        sample: &Sample,
        ctx: &dyn ReportContext,
    ) -> Vec<CategoryReport> {
        let mut reports = Vec::with_capacity(sample.objects.len());

        for (label, stats) in &sample.objects {
            let key = CooldownKey::new(self.config.camera_id, label);

            let confidence = stats.is_reportable().then(|| stats.mean_confidence()).flatten();
            let Some(confidence) = confidence else {
                debug!("Skipping {} - no instances to report", key);
                reports.push(CategoryReport { key, outcome: CategoryOutcome::Skipped });
                continue;
            };

            let now = tokio::time::Instant::now().into_std();
            if ctx.should_suppress(&key, now) {
                counter!("detection_submissions_suppressed_total").increment(1);
                reports.push(CategoryReport { key, outcome: CategoryOutcome::Suppressed });
                continue;
            }

            let outcome = match self.submit(credential, &key, confidence, now, ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Failed to log {} detection: {}", key.category, e);
                    CategoryOutcome::Failed(e.to_string())
                }
            };
            reports.push(CategoryReport { key, outcome });

            tokio::time::sleep(Duration::from_millis(self.config.pacing_ms)).await;
        }

        reports
    }

    async fn submit(
        &self,
        credential: &str,
        key: &CooldownKey,
        confidence: f64,
        now: Instant,
        ctx: &dyn ReportContext,
    ) -> Result<CategoryOutcome, DetectionError> {
        info!(
            "Logging detection: {} ({:.1}% confidence)",
            key.category,
            confidence * 100.0
        );
        counter!("detection_submissions_total").increment(1);

        let request = LogDetectionRequest {
            camera_id: key.source_id,
            weapon_type: key.category.clone(),
            confidence_score: confidence,
        };
        let response = self.api.log_detection(credential, &request).await?;
        info!("{}", response.message);

        if response.is_new_log {
            ctx.mark_reported(key.clone(), now);
        }

        let new_incident = response.new_incident();
        if let Some(incident_id) = new_incident {
            info!("New incident #{} created for {}", incident_id, key.category);
            match self.api.incident(credential, incident_id).await {
                Ok(detail) => ctx.incident_opened(incident_id, detail.incident),
                Err(e) => error!("Error fetching incident #{} details: {}", incident_id, e),
            }
        }

        Ok(CategoryOutcome::Submitted {
            new_log: response.is_new_log,
            new_incident,
        })
    }
}
