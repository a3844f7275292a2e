//! Detection Service
//!
//! Owns every piece of mutable pipeline state behind one mutex. Ticks,
//! reporting callbacks and operator actions each take the lock for a short,
//! non-async critical section; no lock is ever held across I/O.
//!
//! Ticks are numbered when they start. A tick that completes after a later
//! one has already landed is dropped, so connectivity, the current sample
//! and novelty always follow the newest poll.

use crate::config::ServiceConfig;
use crate::hub::{Listener, ListenerHub, Subscription};
use crate::notify::{self, AlertNotifier, Notification};
use crate::state::AggregateState;
use crate::ServiceError;
use alerting::{AlertSlot, CooldownGate, CooldownKey};
use chrono::{DateTime, Local, Utc};
use detection_protocol::{DetectionApi, Sample};
use detection_tracker::Deduplicator;
use metrics::{counter, gauge};
use poll_scheduler::PollScheduler;
use reporter::{ReportContext, Reporter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Mutable pipeline state
struct PipelineState {
    dedup: Deduplicator,
    current_sample: Sample,
    last_checked_at: Option<DateTime<Utc>>,
    is_connected: bool,
    gate: CooldownGate,
    alert: AlertSlot,
    credential: Option<String>,
    /// Newest tick whose result has been applied
    applied_tick: u64,
}

impl PipelineState {
    fn new(config: &ServiceConfig) -> Self {
        Self {
            dedup: Deduplicator::new(config.history_capacity),
            current_sample: Sample::default(),
            last_checked_at: None,
            is_connected: false,
            gate: CooldownGate::new(&config.cooldown()),
            alert: AlertSlot::new(),
            credential: None,
            applied_tick: 0,
        }
    }

    /// Claim `tick` as the newest applied poll. False when a later tick
    /// already landed.
    fn advance(&mut self, tick: u64) -> bool {
        if tick <= self.applied_tick {
            return false;
        }
        self.applied_tick = tick;
        true
    }

    fn snapshot(&self) -> AggregateState {
        AggregateState {
            current_sample: self.current_sample.clone(),
            history: self.dedup.history().to_vec(),
            last_checked_at: self.last_checked_at,
            is_connected: self.is_connected,
            active_alert: self.alert.get().cloned(),
        }
    }
}

struct Inner {
    api: Arc<dyn DetectionApi>,
    notifier: Arc<dyn AlertNotifier>,
    reporter: Reporter,
    config: ServiceConfig,
    state: Mutex<PipelineState>,
    hub: ListenerHub,
    scheduler: Mutex<PollScheduler>,
    next_tick: AtomicU64,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scheduler(&self) -> MutexGuard<'_, PollScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a fresh snapshot to every listener
    fn publish(&self) {
        self.hub.publish(|| self.state().snapshot());
    }

    /// Number the next tick
    fn begin_tick(&self) -> u64 {
        self.next_tick.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// One poll cycle: query, classify, report, publish
    async fn tick(self: Arc<Self>, tick: u64) {
        counter!("detection_ticks_total").increment(1);

        match self.api.detection_status().await {
            Ok(sample) => {
                let applied = {
                    let mut state = self.state();
                    if state.advance(tick) {
                        state.is_connected = true;
                        state.last_checked_at = Some(Utc::now());
                        let verdict = state.dedup.observe(&sample);
                        state.current_sample = sample.clone();
                        Some((verdict, state.credential.clone()))
                    } else {
                        None
                    }
                };
                let Some((verdict, credential)) = applied else {
                    debug!("Dropping result of superseded poll #{}", tick);
                    return;
                };
                gauge!("detection_connected").set(1.0);

                if verdict.is_new_event() {
                    self.handle_event(&sample, credential.as_deref()).await;
                } else {
                    debug!("Poll result: {:?}", verdict);
                }
            }
            Err(e) => {
                warn!("Error checking detection: {}", e);
                counter!("detection_query_failures_total").increment(1);

                let applied = {
                    let mut state = self.state();
                    let applied = state.advance(tick);
                    if applied {
                        state.is_connected = false;
                    }
                    applied
                };
                if !applied {
                    debug!("Dropping failure of superseded poll #{}", tick);
                    return;
                }
                gauge!("detection_connected").set(0.0);
            }
        }

        self.publish();
    }

    async fn handle_event(&self, sample: &Sample, credential: Option<&str>) {
        counter!("detection_events_total").increment(1);
        info!(
            timestamp = ?sample.timestamp,
            categories = ?sample.categories().collect::<Vec<_>>(),
            "New detection"
        );

        notify::dispatch(
            Arc::clone(&self.notifier),
            Notification::for_detection(sample, Local::now()),
        );

        match credential {
            Some(credential) => {
                self.reporter.report_event(credential, sample, self).await;
            }
            None => warn!("No credential available for logging detection"),
        }
    }
}

impl ReportContext for Inner {
    fn should_suppress(&self, key: &CooldownKey, now: Instant) -> bool {
        self.state().gate.should_suppress(key, now)
    }

    fn mark_reported(&self, key: CooldownKey, now: Instant) {
        self.state().gate.mark_reported(key, now);
    }

    fn incident_opened(&self, incident_id: i64, incident: serde_json::Value) {
        self.state().alert.set(incident_id, incident);
        self.publish();
    }
}

/// Polling detection service.
///
/// Cheap to clone; clones share one pipeline.
#[derive(Clone)]
pub struct DetectionService {
    inner: Arc<Inner>,
}

impl DetectionService {
    /// Create a stopped service
    pub fn new(
        api: Arc<dyn DetectionApi>,
        notifier: Arc<dyn AlertNotifier>,
        config: ServiceConfig,
    ) -> Self {
        info!(
            "Creating detection service for camera {} (poll every {}ms)",
            config.camera_id, config.poll_interval_ms
        );

        let inner = Inner {
            reporter: Reporter::new(Arc::clone(&api), config.reporter()),
            scheduler: Mutex::new(PollScheduler::new(config.scheduler())),
            state: Mutex::new(PipelineState::new(&config)),
            hub: ListenerHub::new(),
            next_tick: AtomicU64::new(0),
            api,
            notifier,
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Start polling with `credential` for reporting.
    ///
    /// Returns `Ok(false)` when already polling; the held credential is left
    /// unchanged in that case.
    pub fn start_polling(&self, credential: &str) -> Result<bool, ServiceError> {
        if credential.trim().is_empty() {
            return Err(ServiceError::MissingCredential);
        }

        let mut scheduler = self.inner.scheduler();
        if scheduler.is_running() {
            warn!("Detection service already polling");
            return Ok(false);
        }

        self.inner.state().credential = Some(credential.to_string());

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let started = scheduler.start(move || {
            let pending = weak.upgrade().map(|inner| {
                let tick = inner.begin_tick();
                (inner, tick)
            });
            async move {
                if let Some((inner, tick)) = pending {
                    inner.tick(tick).await;
                }
            }
        });
        if let Err(e) = started {
            self.inner.state().credential = None;
            return Err(e.into());
        }

        info!(
            "Detection service started - polling every {}ms",
            self.inner.config.poll_interval_ms
        );
        Ok(true)
    }

    /// Stop polling. In-flight ticks still complete.
    pub fn stop_polling(&self) -> bool {
        let stopped = self.inner.scheduler().stop();
        if stopped {
            info!("Detection service stopped");
        }
        stopped
    }

    pub fn is_polling(&self) -> bool {
        self.inner.scheduler().is_running()
    }

    /// Run one poll cycle immediately, outside the schedule
    pub async fn poll_once(&self) {
        let tick = self.inner.begin_tick();
        Arc::clone(&self.inner).tick(tick).await;
    }

    /// Current state snapshot
    pub fn get_state(&self) -> AggregateState {
        self.inner.state().snapshot()
    }

    /// Register `listener`; it receives the current state right away
    pub fn subscribe(&self, listener: Arc<Listener>) -> Subscription {
        self.inner
            .hub
            .subscribe(listener, || self.inner.state().snapshot())
    }

    /// Clear the active alert and notify listeners
    pub fn dismiss_alert(&self) {
        self.inner.state().alert.dismiss();
        self.inner.publish();
    }

    /// Stop polling and forget everything: history, cooldowns, alert,
    /// credential and listeners. Ticks still in flight are discarded.
    pub fn reset(&self) {
        self.stop_polling();
        let mut fresh = PipelineState::new(&self.inner.config);
        fresh.applied_tick = self.inner.next_tick.load(Ordering::SeqCst);
        *self.inner.state() = fresh;
        self.inner.hub.clear();
        info!("Detection service reset");
    }

    /// (camera, category) pairs currently cooling down
    pub fn hot_keys(&self) -> Vec<CooldownKey> {
        let now = tokio::time::Instant::now().into_std();
        self.inner.state().gate.hot_keys(now)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.hub.len()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }
}
