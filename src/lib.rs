//! Vitalmon - Session lifecycle and signal-quality alerting
//!
//! This library coordinates a wearable vitals acquisition engine (BLE
//! scanning, PPG/ECG analysis) from the application side. It decides when a
//! configuration change requires replacing the running engine, bridges the
//! engine's push callbacks into broadcast streams that UI subscribers can
//! consume safely, and watches per-channel signal quality to raise
//! deduplicated degradation alerts.

pub mod alerts;
pub mod config;
pub mod engine;
pub mod model;
pub mod session;

pub use alerts::QualityMonitor;
pub use config::AppConfig;
pub use engine::{EngineFactory, EngineHandle, EngineId};
pub use session::bridge::EventBridge;
pub use session::coordinator::Coordinator;
pub use session::SessionManager;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default signal-quality threshold below which a channel counts as degraded
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.5;

/// Default continuous degradation time before an alert fires (seconds)
pub const DEFAULT_DURATION_THRESHOLD_SECS: u64 = 300;
