//! Delivery of degradation alerts to the platform notification layer
//!
//! The platform layer (user-visible notifications, permission prompts) is an
//! external collaborator; everything behind [`NotificationSink`] is
//! fire-and-forget and failures are logged, never propagated.

use anyhow::Result;

/// Outbound alert delivery
pub trait NotificationSink: Send {
    /// Ask the platform for permission to show notifications
    ///
    /// Called once at startup; a denied permission is not fatal, alerts just
    /// stay invisible.
    fn request_permission(&mut self) -> Result<()>;

    /// Deliver one alert
    ///
    /// `identifier` is derived from device and channel so that repeat
    /// deliveries for the same channel collapse at the platform layer.
    fn deliver(&mut self, identifier: &str, title: &str, body: &str) -> Result<()>;
}

/// Sink that writes alerts to the log
///
/// Stands in for a platform notification center in headless runs.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn request_permission(&mut self) -> Result<()> {
        Ok(())
    }

    fn deliver(&mut self, identifier: &str, title: &str, body: &str) -> Result<()> {
        tracing::info!(identifier, title, body, "Alert");
        Ok(())
    }
}
