//! Config-driven coordination of the acquisition session
//!
//! [`Coordinator`] compares every incoming [`AppConfig`] against the last
//! applied one. An unchanged config is a no-op; a changed config spawns a
//! fresh engine, atomically swaps it in, and re-arms the quality monitor.
//! The coordinator also owns the run loop that ticks the monitor on every
//! bridged device snapshot, so all lifecycle state is touched from exactly
//! one task and needs no locking.

use crate::alerts::QualityMonitor;
use crate::config::AppConfig;
use crate::engine::{EngineFactory, EngineId};
use crate::session::bridge::EventBridge;
use crate::session::SessionManager;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Session, bridge, and alerting glue driven by config values
pub struct Coordinator<F: EngineFactory> {
    factory: F,
    bridge: Arc<EventBridge>,
    session: SessionManager,
    monitor: QualityMonitor,
    applied: Option<AppConfig>,
}

impl<F: EngineFactory> Coordinator<F> {
    /// Wire a coordinator to `bridge`, spawning engines through `factory`
    pub fn new(factory: F, bridge: Arc<EventBridge>, monitor: QualityMonitor) -> Self {
        let session = SessionManager::new(bridge.generation_cell());
        Self {
            factory,
            bridge,
            session,
            monitor,
            applied: None,
        }
    }

    /// Apply a configuration value
    ///
    /// Idempotent: a config structurally equal to the last applied one causes
    /// no engine churn. On change, the replacement is all-or-nothing: if the
    /// new engine cannot be constructed, the previously active engine keeps
    /// running, the old config stays applied, and the error is returned to
    /// the caller.
    pub fn apply(&mut self, config: &AppConfig) -> Result<()> {
        if self.applied.as_ref() == Some(config) {
            tracing::debug!("Config unchanged, keeping current engine");
            return Ok(());
        }

        let id = EngineId::next();
        let sink = self.bridge.sink(id);
        let handle = self
            .factory
            .spawn(config, sink)
            .context("Engine construction failed, previous engine kept")?;

        self.session.replace(handle);
        self.monitor.reconfigure(
            config.notification_quality_threshold,
            Duration::seconds(config.notification_duration_threshold_secs as i64),
            config.watched_channels.clone(),
        );
        self.applied = Some(config.clone());
        tracing::info!(engine = %id, "Config applied, engine session replaced");
        Ok(())
    }

    /// Suspend acquisition
    pub fn pause(&mut self) {
        self.session.pause();
    }

    /// Resume acquisition
    pub fn resume(&mut self) {
        self.session.resume();
    }

    /// Trigger a device clock sync
    pub fn sync_time(&self) {
        self.session.sync_time();
    }

    /// Last successfully applied config, if any
    pub fn applied(&self) -> Option<&AppConfig> {
        self.applied.as_ref()
    }

    /// Session state, for inspection
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Mutable access to the quality monitor
    pub fn monitor_mut(&mut self) -> &mut QualityMonitor {
        &mut self.monitor
    }

    /// Drive the session until the config channel closes
    ///
    /// Applies config edits as they arrive and ticks the quality monitor on
    /// every device snapshot. This loop is the single context from which
    /// session, coordinator, and monitor state are reached. On exit the
    /// active engine is stopped.
    pub async fn run(mut self, mut config_rx: mpsc::Receiver<AppConfig>) {
        let mut devices_rx = self.bridge.subscribe_devices();
        loop {
            tokio::select! {
                maybe_config = config_rx.recv() => {
                    let Some(config) = maybe_config else { break };
                    if let Err(e) = self.apply(&config) {
                        tracing::warn!(error = %e, "Config not applied");
                    }
                }
                changed = devices_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let devices = devices_rx.borrow_and_update().clone();
                    self.monitor.process(Utc::now(), &devices);
                }
            }
        }
        self.session.shutdown();
    }
}
