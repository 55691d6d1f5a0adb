//! Event bridge between the engine's threads and the application
//!
//! The acquisition engine pushes device snapshots and sample batches from its
//! own threads. The bridge marshals those callbacks into a single pump task,
//! which is the only place bridge state is mutated, and fans them out with
//! two delivery semantics:
//!
//! - device snapshots are a latest-value broadcast (`tokio::sync::watch`):
//!   every new snapshot overwrites the previous one, and a late subscriber
//!   only observes snapshots published after it attached;
//! - sample batches are keyed by channel id and delivered only to
//!   subscribers of that channel (`tokio::sync::broadcast` per channel).
//!
//! Events are tagged with the generation of the engine that produced them.
//! The pump drops any event whose generation is not the active one, which is
//! what makes replacing an engine safe while its callbacks are still in
//! flight. Per-engine ordering is preserved because all events flow through
//! one mpsc channel into one pump.

use crate::engine::{EngineId, ENGINE_ID_NONE};
use crate::model::{Device, SampleBatch};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, watch};

/// Buffered batches per channel subscription before a slow subscriber lags
const SAMPLE_CHANNEL_CAPACITY: usize = 32;

/// One bridged engine callback
#[derive(Debug)]
enum EngineEvent {
    Devices(Vec<Device>),
    Samples(SampleBatch),
}

#[derive(Debug)]
struct TaggedEvent {
    generation: u64,
    event: EngineEvent,
}

/// Ingress handle given to a spawned engine
///
/// Cheap to clone, callable from any thread, and never blocks the caller.
/// The sink is pre-tagged with its engine's generation; once that engine is
/// retired, everything pushed through the sink is dropped by the pump.
#[derive(Debug, Clone)]
pub struct EngineSink {
    id: EngineId,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EngineSink {
    /// Identity of the engine this sink belongs to
    pub fn engine_id(&self) -> EngineId {
        self.id
    }

    /// Push a full device-list snapshot
    pub fn devices_changed(&self, devices: Vec<Device>) {
        self.push(EngineEvent::Devices(devices));
    }

    /// Push a batch of samples for one channel
    pub fn new_samples(&self, channel_id: String, samples: Vec<u16>) {
        self.push(EngineEvent::Samples(SampleBatch {
            channel_id,
            samples,
        }));
    }

    fn push(&self, event: EngineEvent) {
        let tagged = TaggedEvent {
            generation: self.id.as_u64(),
            event,
        };
        if self.tx.send(tagged).is_err() {
            tracing::debug!(engine = %self.id, "Bridge closed, engine event dropped");
        }
    }
}

/// Bridge from engine callbacks to broadcast streams
pub struct EventBridge {
    devices_tx: Arc<watch::Sender<Vec<Device>>>,
    samples: Arc<Mutex<HashMap<String, broadcast::Sender<SampleBatch>>>>,
    active_generation: Arc<AtomicU64>,
    ingress_tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventBridge {
    /// Create the bridge and spawn its pump task
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (ingress_tx, ingress_rx) = mpsc::unbounded_channel();
        let devices_tx = Arc::new(watch::channel(Vec::new()).0);
        let samples: Arc<Mutex<HashMap<String, broadcast::Sender<SampleBatch>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let active_generation = Arc::new(AtomicU64::new(ENGINE_ID_NONE));

        tokio::spawn(pump(
            ingress_rx,
            devices_tx.clone(),
            samples.clone(),
            active_generation.clone(),
        ));

        Self {
            devices_tx,
            samples,
            active_generation,
            ingress_tx,
        }
    }

    /// The active-generation cell shared with [`crate::session::SessionManager`]
    pub fn generation_cell(&self) -> Arc<AtomicU64> {
        self.active_generation.clone()
    }

    /// Create an ingress sink for the engine identified by `id`
    pub fn sink(&self, id: EngineId) -> EngineSink {
        EngineSink {
            id,
            tx: self.ingress_tx.clone(),
        }
    }

    /// Subscribe to device-list snapshots
    ///
    /// The receiver observes only snapshots published after this call; await
    /// `changed()` and then `borrow_and_update()` to consume them.
    pub fn subscribe_devices(&self) -> watch::Receiver<Vec<Device>> {
        self.devices_tx.subscribe()
    }

    /// Subscribe to sample batches for one channel
    ///
    /// Batches for other channels are filtered out before delivery. A
    /// subscriber that falls more than [`SAMPLE_CHANNEL_CAPACITY`] batches
    /// behind loses the oldest batches rather than stalling the pump.
    pub fn subscribe_channel(&self, channel_id: &str) -> broadcast::Receiver<SampleBatch> {
        let mut map = lock_samples(&self.samples);
        map.entry(channel_id.to_string())
            .or_insert_with(|| broadcast::channel(SAMPLE_CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

fn lock_samples(
    samples: &Mutex<HashMap<String, broadcast::Sender<SampleBatch>>>,
) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<SampleBatch>>> {
    samples.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pump task: the single consumption context for engine callbacks
async fn pump(
    mut ingress_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    devices_tx: Arc<watch::Sender<Vec<Device>>>,
    samples: Arc<Mutex<HashMap<String, broadcast::Sender<SampleBatch>>>>,
    active_generation: Arc<AtomicU64>,
) {
    while let Some(tagged) = ingress_rx.recv().await {
        let active = active_generation.load(Ordering::Acquire);
        if tagged.generation != active {
            tracing::debug!(
                generation = tagged.generation,
                active,
                "Dropping event from retired engine"
            );
            continue;
        }

        match tagged.event {
            EngineEvent::Devices(devices) => {
                let _ = devices_tx.send_replace(devices);
            }
            EngineEvent::Samples(batch) => {
                let mut map = lock_samples(&samples);
                if let Some(tx) = map.get(&batch.channel_id) {
                    if tx.receiver_count() == 0 {
                        // Last subscriber left, drop the lane
                        map.remove(&batch.channel_id);
                    } else {
                        let _ = tx.send(batch);
                    }
                }
            }
        }
    }
    tracing::debug!("Bridge pump finished, all sinks dropped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceStatus, SampleBatch};

    fn device(id: &str) -> Device {
        Device {
            id: id.to_string(),
            serial: 1,
            name: format!("Device {id}"),
            connected: true,
            battery: 80,
            drift_us: 30,
            channels: Vec::new(),
            status: DeviceStatus::Ok,
        }
    }

    fn activate(bridge: &EventBridge, id: EngineId) {
        bridge
            .generation_cell()
            .store(id.as_u64(), Ordering::Release);
    }

    #[tokio::test]
    async fn test_devices_reach_subscriber() {
        let bridge = EventBridge::new();
        let id = EngineId::next();
        activate(&bridge, id);

        let mut rx = bridge.subscribe_devices();
        bridge.sink(id).devices_changed(vec![device("aa")]);

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update()[0].id, "aa");
    }

    #[tokio::test]
    async fn test_inactive_generation_is_dropped() {
        let bridge = EventBridge::new();
        let retired = EngineId::next();
        let active = EngineId::next();
        activate(&bridge, active);

        let mut rx = bridge.subscribe_devices();
        bridge.sink(retired).devices_changed(vec![device("old")]);
        bridge.sink(active).devices_changed(vec![device("new")]);

        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "new");
    }

    #[tokio::test]
    async fn test_keyed_delivery_filters_by_channel() {
        let bridge = EventBridge::new();
        let id = EngineId::next();
        activate(&bridge, id);

        let mut rx = bridge.subscribe_channel("ch-1");
        let sink = bridge.sink(id);
        sink.new_samples("ch-2".to_string(), vec![1, 2]);
        sink.new_samples("ch-1".to_string(), vec![3, 4]);

        let batch = rx.recv().await.unwrap();
        assert_eq!(
            batch,
            SampleBatch {
                channel_id: "ch-1".to_string(),
                samples: vec![3, 4],
            }
        );
    }

    #[tokio::test]
    async fn test_sink_survives_bridge_drop() {
        let bridge = EventBridge::new();
        let sink = bridge.sink(EngineId::next());
        drop(bridge);

        // Must not panic; the event is silently discarded
        sink.devices_changed(vec![device("aa")]);
    }
}
