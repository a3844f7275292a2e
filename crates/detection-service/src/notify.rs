//! Operator Side Effects
//!
//! Audio alert and user notification fired once per new detection event.
//! Both are fire-and-forget: they run on their own task and a host without
//! the capability only produces a diagnostic.

use alerting::display_name;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use detection_protocol::Sample;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Notifier errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{0} not available on this host")]
    CapabilityUnavailable(&'static str),
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// One tone of the alert pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beep {
    pub frequency_hz: u32,
    pub duration: Duration,
    /// Start offset from the beginning of the pattern
    pub offset: Duration,
}

/// Three 880 Hz tones, the last one longer
pub const ALERT_PATTERN: [Beep; 3] = [
    Beep {
        frequency_hz: 880,
        duration: Duration::from_millis(200),
        offset: Duration::ZERO,
    },
    Beep {
        frequency_hz: 880,
        duration: Duration::from_millis(200),
        offset: Duration::from_millis(300),
    },
    Beep {
        frequency_hz: 880,
        duration: Duration::from_millis(400),
        offset: Duration::from_millis(600),
    },
];

/// User-facing notification content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Notifications with the same tag replace each other
    pub tag: String,
}

impl Notification {
    /// Notification for a detection seen at `at`
    pub fn for_detection(sample: &Sample, at: DateTime<Local>) -> Self {
        let weapons = sample
            .categories()
            .map(display_name)
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            title: "Weapon Detected!".to_string(),
            body: format!("{} detected at {}", weapons, at.format("%H:%M:%S")),
            tag: "weapon-detection".to_string(),
        }
    }
}

/// Host capabilities for operator alerts
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Play [`ALERT_PATTERN`]
    async fn play_alert_sound(&self) -> Result<(), NotifyError>;

    /// Show `notification` to the user
    async fn show_notification(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Terminal bell for audio, stderr line for notifications.
///
/// Each capability is only available when the matching stream is a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

#[async_trait]
impl AlertNotifier for TerminalNotifier {
    async fn play_alert_sound(&self) -> Result<(), NotifyError> {
        if !std::io::stdout().is_terminal() {
            return Err(NotifyError::CapabilityUnavailable("audio"));
        }

        let mut elapsed = Duration::ZERO;
        for beep in ALERT_PATTERN {
            sleep(beep.offset.saturating_sub(elapsed)).await;
            elapsed = beep.offset;

            let mut out = std::io::stdout();
            out.write_all(b"\x07")?;
            out.flush()?;
        }
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<(), NotifyError> {
        if !std::io::stderr().is_terminal() {
            return Err(NotifyError::CapabilityUnavailable("notifications"));
        }

        writeln!(std::io::stderr(), "[{}] {}", notification.title, notification.body)?;
        Ok(())
    }
}

/// Host without audio or notification support
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

#[async_trait]
impl AlertNotifier for SilentNotifier {
    async fn play_alert_sound(&self) -> Result<(), NotifyError> {
        Err(NotifyError::CapabilityUnavailable("audio"))
    }

    async fn show_notification(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::CapabilityUnavailable("notifications"))
    }
}

fn log_outcome(what: &str, result: Result<(), NotifyError>) {
    match result {
        Ok(()) => {}
        Err(NotifyError::CapabilityUnavailable(cap)) => debug!("Skipping {}: no {} capability", what, cap),
        Err(e) => warn!("Could not {}: {}", what, e),
    }
}

/// Fire both side effects on a background task
pub(crate) fn dispatch(notifier: Arc<dyn AlertNotifier>, notification: Notification) {
    info!("{}: {}", notification.title, notification.body);
    tokio::spawn(async move {
        let (sound, shown) = tokio::join!(
            notifier.play_alert_sound(),
            notifier.show_notification(&notification)
        );
        log_outcome("play alert sound", sound);
        log_outcome("show notification", shown);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use detection_protocol::ObjectStats;

    #[test]
    fn test_notification_lists_display_names() {
        let sample = Sample::detecting(
            [
                ("gun".to_string(), ObjectStats::new(1, vec![0.9])),
                ("heavy-weapon".to_string(), ObjectStats::new(1, vec![0.8])),
                ("baseball_bat".to_string(), ObjectStats::new(1, vec![0.6])),
            ],
            "t1",
        );
        let at = Local.with_ymd_and_hms(2024, 5, 1, 14, 3, 9).unwrap();

        let notification = Notification::for_detection(&sample, at);
        assert_eq!(notification.title, "Weapon Detected!");
        assert_eq!(
            notification.body,
            "Pistol, Heavy Weapon, baseball bat detected at 14:03:09"
        );
        assert_eq!(notification.tag, "weapon-detection");
    }

    #[test]
    fn test_alert_pattern_offsets_increase() {
        assert!(ALERT_PATTERN.windows(2).all(|w| w[0].offset < w[1].offset));
        assert!(ALERT_PATTERN.iter().all(|b| b.frequency_hz == 880));
    }

    #[tokio::test]
    async fn test_silent_notifier_degrades() {
        let notifier = SilentNotifier;
        assert!(matches!(
            notifier.play_alert_sound().await,
            Err(NotifyError::CapabilityUnavailable("audio"))
        ));
        let n = Notification {
            title: "t".to_string(),
            body: "b".to_string(),
            tag: "x".to_string(),
        };
        assert!(notifier.show_notification(&n).await.is_err());
    }
}
