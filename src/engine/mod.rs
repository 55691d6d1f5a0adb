//! Acquisition engine contract
//!
//! The engine is an external component: it scans for devices, keeps their
//! clocks synchronized, and analyzes incoming PPG/ECG signals on its own
//! threads. This crate drives it through a narrow command surface and
//! receives its output as bridged events.
//!
//! Every spawned engine gets a unique [`EngineId`]. The id tags all events
//! the engine pushes into the bridge, which is what lets the session layer
//! drop stale callbacks from an engine that has already been replaced.

pub mod mock;

use crate::config::AppConfig;
use crate::session::bridge::EngineSink;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors that can occur while constructing or starting an engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No BLE adapter available")]
    NoAdapter,

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to start acquisition: {0}")]
    StartFailed(String),
}

/// Identity of one spawned engine instance
///
/// Ids are process-unique and monotonically increasing; id value 0 is
/// reserved for "no engine active".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(u64);

/// Reserved generation value meaning "no engine active"
pub const ENGINE_ID_NONE: u64 = 0;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

impl EngineId {
    /// Allocate the next engine id
    pub fn next() -> Self {
        EngineId(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw generation value, for the shared active-generation cell
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Reconstruct an id from a raw generation value
    pub fn from_u64(raw: u64) -> Self {
        EngineId(raw)
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Commands accepted by a running engine
///
/// All commands are fire-and-forget: the engine acknowledges nothing, and
/// any observable effect arrives later as ordinary bridged events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Begin scanning and acquisition
    Start,
    /// Suspend acquisition, keeping connections alive
    Pause,
    /// Resume a paused acquisition
    Resume,
    /// Trigger an immediate device clock sync
    SyncTime,
    /// Shut the engine down; the engine thread exits after draining
    Stop,
}

/// Command surface of one live engine instance
///
/// The handle owns the sending side of the engine's command channel. Commands
/// sent after the engine thread has exited are logged and dropped.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    id: EngineId,
    cmd_tx: crossbeam_channel::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Create a handle from an id and the engine's command channel
    pub fn new(id: EngineId, cmd_tx: crossbeam_channel::Sender<EngineCommand>) -> Self {
        Self { id, cmd_tx }
    }

    /// Identity of this engine instance
    pub fn id(&self) -> EngineId {
        self.id
    }

    /// Begin scanning and acquisition
    pub fn start(&self) {
        self.send(EngineCommand::Start);
    }

    /// Suspend acquisition
    pub fn pause(&self) {
        self.send(EngineCommand::Pause);
    }

    /// Resume a paused acquisition
    pub fn resume(&self) {
        self.send(EngineCommand::Resume);
    }

    /// Trigger an immediate device clock sync
    pub fn sync_time(&self) {
        self.send(EngineCommand::SyncTime);
    }

    /// Shut the engine down
    pub fn stop(&self) {
        self.send(EngineCommand::Stop);
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            tracing::debug!(engine = %self.id, ?command, "Engine already stopped, command dropped");
        }
    }
}

/// Constructor for engine instances
///
/// The coordinator spawns a fresh engine for every config change; tests
/// inject factories that fail or that record spawn counts.
pub trait EngineFactory {
    /// Construct and launch an engine for `config`, pushing its callbacks
    /// into `sink`. The returned handle is not started; the caller issues
    /// [`EngineHandle::start`] once it is installed.
    fn spawn(&self, config: &AppConfig, sink: EngineSink) -> Result<EngineHandle, EngineError>;
}
