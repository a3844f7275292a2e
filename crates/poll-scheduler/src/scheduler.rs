//! Poll Scheduler Implementation

use crate::SchedulerError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Configuration for the poll scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick period in milliseconds (default: 2000)
    pub interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_ms: 2000 }
    }
}

impl SchedulerConfig {
    /// Tick period
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Fixed-interval scheduler.
///
/// The first tick fires immediately on start. Stopping cancels the schedule
/// only; ticks already spawned run to completion.
pub struct PollScheduler {
    /// Configuration
    config: SchedulerConfig,
    /// Timer loop, present while running
    handle: Option<JoinHandle<()>>,
    /// Ticks spawned since creation
    ticks: Arc<AtomicU64>,
}

impl PollScheduler {
    /// Create a stopped scheduler
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            handle: None,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start ticking.
    ///
    /// Returns `Ok(false)` without touching the running schedule when already
    /// started.
    pub fn start<F, Fut>(&mut self, tick: F) -> Result<bool, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            debug!("Poll scheduler already running");
            return Ok(false);
        }
        if self.config.interval_ms == 0 {
            return Err(SchedulerError::ZeroInterval);
        }
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let period = self.config.interval();
        let ticks = Arc::clone(&self.ticks);

        self.handle = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let n = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Poll tick {}", n);
                tokio::spawn(tick());
            }
        }));

        info!("Poll scheduler started - ticking every {}ms", self.config.interval_ms);
        Ok(true)
    }

    /// Stop ticking. Returns `false` when not running.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                info!("Poll scheduler stopped");
                true
            }
            None => false,
        }
    }

    /// Check if scheduler is running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Number of ticks spawned so far
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_tick(counter: &Arc<AtomicU64>) -> impl Fn() -> std::future::Ready<()> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate_then_periodic() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());

        assert!(scheduler.start(counting_tick(&counter)).unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.tick_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());

        assert!(scheduler.start(counting_tick(&counter)).unwrap());
        assert!(!scheduler.start(counting_tick(&counter)).unwrap());

        tokio::time::sleep(Duration::from_millis(4100)).await;
        // One schedule only: ticks at 0, 2000, 4000
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_and_is_idempotent() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());
        scheduler.start(counting_tick(&counter)).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert!(!scheduler.is_running());

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_does_not_delay_schedule() {
        let started = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicU64::new(0));
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());

        let (s, f) = (Arc::clone(&started), Arc::clone(&finished));
        scheduler
            .start(move || {
                let (s, f) = (Arc::clone(&s), Arc::clone(&f));
                async move {
                    s.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5000)).await;
                    f.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(6100)).await;
        // Ticks at 0, 2000, 4000, 6000 all started; only the first finished
        assert_eq!(started.load(Ordering::SeqCst), 4);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let mut scheduler = PollScheduler::new(SchedulerConfig { interval_ms: 0 });
        let result = scheduler.start(|| std::future::ready(()));
        assert!(matches!(result, Err(SchedulerError::ZeroInterval)));
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let mut scheduler = PollScheduler::new(SchedulerConfig::default());
        let result = scheduler.start(|| std::future::ready(()));
        assert!(matches!(result, Err(SchedulerError::NoRuntime)));
        assert!(!scheduler.is_running());
    }
}
