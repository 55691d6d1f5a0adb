//! Mock acquisition engine
//!
//! Emits synthetic device snapshots and PPG/ECG waveforms at a fixed cadence
//! from a dedicated thread, honoring the same command surface as the real
//! engine. Used by the demo binary and by lifecycle tests; also supports
//! spawn-failure injection for the coordinator's error path.

use crate::config::AppConfig;
use crate::engine::{EngineCommand, EngineError, EngineFactory, EngineHandle};
use crate::model::{Channel, ChannelStatus, ChannelType, Device, DeviceStatus};
use crate::session::bridge::EngineSink;
use crossbeam_channel::RecvTimeoutError;
use rand::Rng;
use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Snapshot cadence of the mock engine
const TICK: Duration = Duration::from_secs(1);

/// Channel layout of a mock device, matching the hardware channel mapping
const CHANNEL_LAYOUT: [(&str, ChannelType); 4] = [
    ("CNT", ChannelType::Cnt),
    ("PPG", ChannelType::Ppg),
    ("PPG", ChannelType::Ppg),
    ("ECG", ChannelType::Ecg),
];

/// Factory spawning mock engines
pub struct MockEngineFactory {
    fail_spawn: bool,
    spawned: Arc<AtomicUsize>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self {
            fail_spawn: false,
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Factory whose every spawn fails, for error-path tests
    pub fn failing() -> Self {
        Self {
            fail_spawn: true,
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of engines spawned so far
    pub fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Clonable counter handle, usable after the factory moved into a coordinator
    pub fn spawn_counter(&self) -> Arc<AtomicUsize> {
        self.spawned.clone()
    }
}

impl Default for MockEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFactory for MockEngineFactory {
    fn spawn(&self, config: &AppConfig, sink: EngineSink) -> Result<EngineHandle, EngineError> {
        if self.fail_spawn {
            return Err(EngineError::NoAdapter);
        }
        if config.hist_size_api == 0 {
            return Err(EngineError::InvalidConfig(
                "hist_size_api must be positive".to_string(),
            ));
        }

        let id = sink.engine_id();
        let batch_len = config.analysis_interval_points.max(1) as usize;
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();

        std::thread::Builder::new()
            .name(format!("mock-engine-{}", id.as_u64()))
            .spawn(move || run_engine(sink, cmd_rx, batch_len))
            .map_err(|e| EngineError::StartFailed(e.to_string()))?;

        self.spawned.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(engine = %id, "Mock engine spawned");
        Ok(EngineHandle::new(id, cmd_tx))
    }
}

/// Engine thread: waits for commands, emits one tick per second while running
fn run_engine(
    sink: EngineSink,
    cmd_rx: crossbeam_channel::Receiver<EngineCommand>,
    batch_len: usize,
) {
    let mut running = false;
    let mut paused = false;
    let mut tick: u64 = 0;
    let mut quality: HashMap<String, f32> = HashMap::new();

    loop {
        match cmd_rx.recv_timeout(TICK) {
            Ok(EngineCommand::Start) => running = true,
            Ok(EngineCommand::Pause) => paused = true,
            Ok(EngineCommand::Resume) => paused = false,
            Ok(EngineCommand::SyncTime) => {
                tracing::debug!(engine = %sink.engine_id(), "Mock device clock sync");
            }
            Ok(EngineCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if running && !paused {
                    emit_tick(&sink, &mut quality, tick, batch_len);
                    tick += 1;
                }
            }
        }
    }
    tracing::debug!(engine = %sink.engine_id(), "Mock engine stopped");
}

fn emit_tick(sink: &EngineSink, quality: &mut HashMap<String, f32>, tick: u64, batch_len: usize) {
    let devices = mock_devices(quality);
    sink.devices_changed(devices.clone());

    for device in &devices {
        for channel in &device.channels {
            let samples = (0..batch_len)
                .map(|i| {
                    let time = tick as f32 + i as f32 / batch_len as f32;
                    generate_sample(time, tick * batch_len as u64 + i as u64, channel.channel_type)
                })
                .collect();
            sink.new_samples(channel.id.clone(), samples);
        }
    }
}

/// Synthetic waveform: slow sine for PPG, composite sine for ECG, raw
/// counter for CNT, with a little noise on the biosignals
fn generate_sample(time: f32, counter: u64, channel_type: ChannelType) -> u16 {
    let base = match channel_type {
        ChannelType::Ppg => 20480.0 + 10240.0 * (2.0 * PI * time).sin(),
        ChannelType::Ecg => {
            20480.0
                + 10240.0 * (2.0 * PI * time * 4.0).sin()
                + 5120.0 * (2.0 * PI * time * 20.0).sin()
        }
        ChannelType::Cnt => return (counter % u64::from(u16::MAX)) as u16,
    };
    let noise: f32 = rand::thread_rng().gen_range(-100.0..100.0);
    (base + noise).clamp(0.0, f32::from(u16::MAX)) as u16
}

/// Random-walk quality score per channel, starting healthy
fn walk_quality(quality: &mut HashMap<String, f32>, channel_id: &str) -> f32 {
    let entry = quality.entry(channel_id.to_string()).or_insert(0.9);
    let step: f32 = rand::thread_rng().gen_range(-0.08..0.08);
    *entry = (*entry + step).clamp(0.0, 1.0);
    *entry
}

fn mock_devices(quality: &mut HashMap<String, f32>) -> Vec<Device> {
    let mut rng = rand::thread_rng();
    (1..=2u16)
        .map(|serial| {
            let mac = format!("00:11:22:33:00:{serial:02}");
            let channels = CHANNEL_LAYOUT
                .iter()
                .enumerate()
                .map(|(index, (name, channel_type))| {
                    let id = format!("{}-{}", mac, index + 1);
                    let signal_quality = match channel_type {
                        ChannelType::Cnt => None,
                        _ => Some(walk_quality(quality, &id)),
                    };
                    Channel {
                        id,
                        name: (*name).to_string(),
                        channel_type: *channel_type,
                        signal_quality,
                        signal_min: 0,
                        signal_max: u16::MAX,
                        status: ChannelStatus::Ok,
                    }
                })
                .collect();
            Device {
                id: mac,
                serial,
                name: format!("Device {serial}"),
                connected: true,
                battery: rng.gen_range(1..100),
                drift_us: rng.gen_range(-50..50),
                channels,
                status: DeviceStatus::Ok,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_factory_reports_no_adapter() {
        let factory = MockEngineFactory::failing();
        assert_eq!(factory.spawn_count(), 0);
    }

    #[test]
    fn test_ppg_waveform_stays_in_range() {
        for i in 0..1000 {
            let sample = generate_sample(i as f32 * 0.01, i, ChannelType::Ppg);
            assert!(sample >= 9000, "sample {sample} below expected floor");
            assert!(sample <= 32000, "sample {sample} above expected ceiling");
        }
    }

    #[test]
    fn test_ppg_waveform_peaks_at_quarter_cycle() {
        // Peak of the slow sine, modulo the +-100 noise floor
        let sample = generate_sample(0.25, 0, ChannelType::Ppg);
        approx::assert_abs_diff_eq!(f32::from(sample), 30720.0, epsilon = 150.0);
    }

    #[test]
    fn test_cnt_channel_counts() {
        assert_eq!(generate_sample(0.0, 41, ChannelType::Cnt), 41);
    }

    #[test]
    fn test_quality_walk_stays_normalized() {
        let mut quality = HashMap::new();
        for _ in 0..1000 {
            let q = walk_quality(&mut quality, "ch-1");
            assert!((0.0..=1.0).contains(&q));
        }
    }

    #[test]
    fn test_mock_device_layout() {
        let mut quality = HashMap::new();
        let devices = mock_devices(&mut quality);
        assert_eq!(devices.len(), 2);
        for device in &devices {
            assert_eq!(device.channels.len(), 4);
            assert_eq!(device.channels[0].channel_type, ChannelType::Cnt);
            assert!(device.channels[0].signal_quality.is_none());
            assert!(device.channels[3].signal_quality.is_some());
        }
    }
}
