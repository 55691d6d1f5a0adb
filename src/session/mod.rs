//! Session lifecycle: bridging, engine ownership, config coordination

pub mod bridge;
pub mod coordinator;

use crate::engine::{EngineHandle, EngineId, ENGINE_ID_NONE};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle state of the acquisition session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No engine has been installed yet
    Uninitialized,
    /// An engine is installed and acquiring
    Running,
    /// An engine is installed but acquisition is suspended
    Paused,
    /// The session was shut down; no further engine may be installed
    Terminated,
}

/// Owner of the single live engine instance
///
/// `SessionManager` guarantees that at most one [`EngineHandle`] is active at
/// any instant. The active engine's generation is published through a shared
/// atomic cell that the event bridge reads when filtering callbacks, so a
/// retired engine's in-flight events are dropped rather than forwarded. The
/// cell is the only cross-thread state this type touches; everything else is
/// reachable from the coordinator's context alone.
pub struct SessionManager {
    state: SessionState,
    active: Option<EngineHandle>,
    /// Generation of the active engine, shared with the bridge pump
    generation: Arc<AtomicU64>,
}

impl SessionManager {
    /// Create a session manager publishing the active generation into `generation`
    pub fn new(generation: Arc<AtomicU64>) -> Self {
        Self {
            state: SessionState::Uninitialized,
            active: None,
            generation,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identity of the active engine, if any
    pub fn active_id(&self) -> Option<EngineId> {
        self.active.as_ref().map(|h| h.id())
    }

    /// Install `handle` as the active engine and start it
    ///
    /// The new generation is published before the old engine is stopped, so
    /// from the caller's point of view the swap is atomic: any event tagged
    /// with the retired generation that is still in flight will fail the
    /// bridge's identity check. The retired handle is issued a cooperative
    /// stop; it may keep emitting briefly, which is exactly what the
    /// generation filter absorbs.
    pub fn replace(&mut self, handle: EngineHandle) {
        if self.state == SessionState::Terminated {
            tracing::warn!(engine = %handle.id(), "Session already terminated, refusing new engine");
            handle.stop();
            return;
        }

        let new_id = handle.id();
        self.generation.store(new_id.as_u64(), Ordering::Release);

        if let Some(retired) = self.active.replace(handle) {
            tracing::info!(retired = %retired.id(), active = %new_id, "Replacing acquisition engine");
            retired.stop();
        } else {
            tracing::info!(active = %new_id, "Starting first acquisition engine");
        }

        if let Some(active) = &self.active {
            active.start();
        }
        self.state = SessionState::Running;
    }

    /// Suspend acquisition; no-op unless currently running
    pub fn pause(&mut self) {
        match (&self.active, self.state) {
            (Some(handle), SessionState::Running) => {
                handle.pause();
                self.state = SessionState::Paused;
            }
            _ => {
                tracing::debug!(state = ?self.state, "Pause ignored");
            }
        }
    }

    /// Resume a paused acquisition; no-op unless currently paused
    pub fn resume(&mut self) {
        match (&self.active, self.state) {
            (Some(handle), SessionState::Paused) => {
                handle.resume();
                self.state = SessionState::Running;
            }
            _ => {
                tracing::debug!(state = ?self.state, "Resume ignored");
            }
        }
    }

    /// Trigger a device clock sync on the active engine; fire-and-forget
    pub fn sync_time(&self) {
        if let Some(handle) = &self.active {
            handle.sync_time();
        }
    }

    /// Stop the active engine and refuse any further replacements
    pub fn shutdown(&mut self) {
        self.generation.store(ENGINE_ID_NONE, Ordering::Release);
        if let Some(handle) = self.active.take() {
            tracing::info!(engine = %handle.id(), "Stopping acquisition engine for shutdown");
            handle.stop();
        }
        self.state = SessionState::Terminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineCommand;

    fn test_handle() -> (EngineHandle, crossbeam_channel::Receiver<EngineCommand>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (EngineHandle::new(EngineId::next(), tx), rx)
    }

    #[test]
    fn test_initial_state() {
        let session = SessionManager::new(Arc::new(AtomicU64::new(ENGINE_ID_NONE)));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(session.active_id(), None);
    }

    #[test]
    fn test_replace_publishes_generation_and_starts() {
        let cell = Arc::new(AtomicU64::new(ENGINE_ID_NONE));
        let mut session = SessionManager::new(cell.clone());

        let (handle, rx) = test_handle();
        let id = handle.id();
        session.replace(handle);

        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.active_id(), Some(id));
        assert_eq!(cell.load(Ordering::Acquire), id.as_u64());
        assert_eq!(rx.try_recv(), Ok(EngineCommand::Start));
    }

    #[test]
    fn test_replace_stops_retired_engine() {
        let cell = Arc::new(AtomicU64::new(ENGINE_ID_NONE));
        let mut session = SessionManager::new(cell.clone());

        let (first, first_rx) = test_handle();
        session.replace(first);
        assert_eq!(first_rx.try_recv(), Ok(EngineCommand::Start));

        let (second, second_rx) = test_handle();
        let second_id = second.id();
        session.replace(second);

        assert_eq!(first_rx.try_recv(), Ok(EngineCommand::Stop));
        assert_eq!(second_rx.try_recv(), Ok(EngineCommand::Start));
        assert_eq!(session.active_id(), Some(second_id));
        assert_eq!(cell.load(Ordering::Acquire), second_id.as_u64());
    }

    #[test]
    fn test_pause_resume_roundtrip() {
        let mut session = SessionManager::new(Arc::new(AtomicU64::new(ENGINE_ID_NONE)));
        let (handle, rx) = test_handle();
        session.replace(handle);
        let _ = rx.try_recv(); // Start

        session.pause();
        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(rx.try_recv(), Ok(EngineCommand::Pause));

        session.resume();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(rx.try_recv(), Ok(EngineCommand::Resume));
    }

    #[test]
    fn test_pause_without_engine_is_noop() {
        let mut session = SessionManager::new(Arc::new(AtomicU64::new(ENGINE_ID_NONE)));
        session.pause();
        session.resume();
        session.sync_time();
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_resume_while_running_sends_nothing() {
        let mut session = SessionManager::new(Arc::new(AtomicU64::new(ENGINE_ID_NONE)));
        let (handle, rx) = test_handle();
        session.replace(handle);
        let _ = rx.try_recv(); // Start

        session.resume();
        assert!(rx.try_recv().is_err());
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn test_shutdown_clears_generation_and_refuses_replacement() {
        let cell = Arc::new(AtomicU64::new(ENGINE_ID_NONE));
        let mut session = SessionManager::new(cell.clone());

        let (handle, rx) = test_handle();
        session.replace(handle);
        let _ = rx.try_recv(); // Start

        session.shutdown();
        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(cell.load(Ordering::Acquire), ENGINE_ID_NONE);
        assert_eq!(rx.try_recv(), Ok(EngineCommand::Stop));

        let (late, late_rx) = test_handle();
        session.replace(late);
        assert_eq!(late_rx.try_recv(), Ok(EngineCommand::Stop));
        assert_eq!(session.active_id(), None);
    }
}
