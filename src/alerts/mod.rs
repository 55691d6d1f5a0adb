//! Signal-quality degradation alerting
//!
//! [`QualityMonitor`] consumes device-list snapshots and keeps a timer per
//! watched channel whose quality has fallen below the configured threshold.
//! Once a channel stays continuously degraded for the configured duration,
//! exactly one alert is emitted; the channel must recover (or leave the
//! watch-set) before it can alert again.

pub mod notify;

pub use notify::{LogSink, NotificationSink};

use crate::model::{Channel, Device};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};

/// Tracking entry for a channel currently below threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrackedChannel {
    /// Start of the current degraded interval
    since: DateTime<Utc>,
    /// Whether the alert for this interval has already fired
    notified: bool,
}

/// Per-channel degraded-signal detector
///
/// Ticks are driven by device-list snapshots; there is no independent timer.
/// A consequence is that an alert can only fire on a snapshot tick: if the
/// engine stops emitting snapshots while a channel is degraded, the nominal
/// duration may elapse without an alert until the next snapshot arrives.
pub struct QualityMonitor {
    /// Quality strictly below this value counts as degraded
    quality_threshold: f64,
    /// Continuous degradation time before the alert fires
    duration_threshold: Duration,
    /// Channel ids eligible for alerting
    watched: BTreeSet<String>,
    /// Channels currently below threshold; an entry exists only while its
    /// channel is watched and degraded
    tracked: HashMap<String, TrackedChannel>,
    sink: Box<dyn NotificationSink>,
}

impl QualityMonitor {
    /// Create a monitor delivering alerts through `sink`
    ///
    /// Requests notification permission once; denial is logged and alerting
    /// continues without visible effect.
    pub fn new(mut sink: Box<dyn NotificationSink>) -> Self {
        if let Err(e) = sink.request_permission() {
            tracing::warn!(error = %e, "Notification permission not granted");
        }
        Self {
            quality_threshold: crate::DEFAULT_QUALITY_THRESHOLD,
            duration_threshold: Duration::seconds(crate::DEFAULT_DURATION_THRESHOLD_SECS as i64),
            watched: BTreeSet::new(),
            tracked: HashMap::new(),
            sink,
        }
    }

    /// Re-arm thresholds and watch-set after a config change
    ///
    /// Tracked state survives for channels that remain watched; entries for
    /// channels that left the watch-set are purged, so re-adding a channel
    /// later starts a fresh timer.
    pub fn reconfigure(
        &mut self,
        quality_threshold: f64,
        duration_threshold: Duration,
        watched: BTreeSet<String>,
    ) {
        self.quality_threshold = quality_threshold;
        self.duration_threshold = duration_threshold;
        self.watched = watched;
        let watched = &self.watched;
        self.tracked.retain(|id, _| watched.contains(id));
    }

    /// Whether a channel is currently tracked as degraded
    pub fn is_tracking(&self, channel_id: &str) -> bool {
        self.tracked.contains_key(channel_id)
    }

    /// Process one device-list snapshot taken at `now`
    pub fn process(&mut self, now: DateTime<Utc>, devices: &[Device]) {
        for device in devices {
            for channel in &device.channels {
                if !self.watched.contains(&channel.id) {
                    self.tracked.remove(&channel.id);
                    continue;
                }

                // Unknown or out-of-range scores cannot count as degraded
                let quality = match channel.signal_quality {
                    Some(q) if (0.0..=1.0).contains(&q) => f64::from(q),
                    _ => {
                        self.tracked.remove(&channel.id);
                        continue;
                    }
                };

                if quality >= self.quality_threshold {
                    self.tracked.remove(&channel.id);
                    continue;
                }

                match self.tracked.get_mut(&channel.id) {
                    Some(entry) => {
                        if !entry.notified && now - entry.since >= self.duration_threshold {
                            entry.notified = true;
                            // `since` stays put: further ticks in the same
                            // degraded interval must not re-notify
                            Self::notify(&mut self.sink, device, channel);
                        }
                    }
                    None => {
                        self.tracked.insert(
                            channel.id.clone(),
                            TrackedChannel {
                                since: now,
                                notified: false,
                            },
                        );
                    }
                }
            }
        }
    }

    fn notify(sink: &mut Box<dyn NotificationSink>, device: &Device, channel: &Channel) {
        let identifier = format!("{}-{}", device.id, channel.id);
        let body = format!("{} - {} has low signal quality.", device.name, channel.name);
        tracing::info!(
            device = %device.id,
            channel = %channel.id,
            "Signal quality degraded, raising alert"
        );
        if let Err(e) = sink.deliver(&identifier, "Low Signal Quality Alert", &body) {
            tracing::warn!(error = %e, channel = %channel.id, "Alert delivery failed");
        }
    }
}
