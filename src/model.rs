//! Device and channel snapshots produced by the acquisition engine
//!
//! The engine owns discovery, connection handling, and signal analysis; this
//! crate only ever sees the resulting snapshots and treats them as read-only.

use serde::{Deserialize, Serialize};

/// Signal type carried by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    /// Raw sample counter, used for loss diagnostics
    Cnt,
    /// Electrocardiogram
    Ecg,
    /// Photoplethysmogram
    Ppg,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Cnt => write!(f, "CNT"),
            ChannelType::Ecg => write!(f, "ECG"),
            ChannelType::Ppg => write!(f, "PPG"),
        }
    }
}

/// Engine-derived health of a single channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    Ok,
    SignalIssue,
}

/// Engine-derived health of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Ok,
    SignalIssue,
    WrongMode,
}

/// Coarse quality grade used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityGrade {
    Poor,
    Fair,
    Good,
}

/// One signal channel of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Stable channel identifier, derived from the device MAC and channel index
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Signal type
    pub channel_type: ChannelType,
    /// Normalized signal-quality confidence in [0, 1]; `None` when the
    /// analyzer has not produced a score (too little data, CNT channel, ...)
    pub signal_quality: Option<f32>,
    /// Lower bound of the display range
    pub signal_min: u16,
    /// Upper bound of the display range
    pub signal_max: u16,
    /// Engine-derived status
    pub status: ChannelStatus,
}

impl Channel {
    /// Coarse grade for the current quality score, `None` when unknown
    pub fn quality_grade(&self) -> Option<QualityGrade> {
        let quality = self.signal_quality?;
        match quality {
            q if (0.0..0.5).contains(&q) => Some(QualityGrade::Poor),
            q if (0.5..0.75).contains(&q) => Some(QualityGrade::Fair),
            q if (0.75..=1.0).contains(&q) => Some(QualityGrade::Good),
            _ => None,
        }
    }
}

/// Snapshot of one connected (or recently seen) device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier (MAC address)
    pub id: String,
    /// Device serial number
    pub serial: u16,
    /// Advertised name
    pub name: String,
    /// Whether a BLE connection is currently established
    pub connected: bool,
    /// Battery level in percent
    pub battery: u8,
    /// Measured clock drift against host time, microseconds
    pub drift_us: i64,
    /// Channels in the device's fixed channel order
    pub channels: Vec<Channel>,
    /// Engine-derived status
    pub status: DeviceStatus,
}

/// A batch of samples for a single channel
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    /// Channel the samples belong to
    pub channel_id: String,
    /// Raw samples in acquisition order
    pub samples: Vec<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_with_quality(quality: Option<f32>) -> Channel {
        Channel {
            id: "00:11:22:33:00:01-1".to_string(),
            name: "PPG".to_string(),
            channel_type: ChannelType::Ppg,
            signal_quality: quality,
            signal_min: 0,
            signal_max: u16::MAX,
            status: ChannelStatus::Ok,
        }
    }

    #[test]
    fn test_quality_grade_bands() {
        assert_eq!(
            channel_with_quality(Some(0.0)).quality_grade(),
            Some(QualityGrade::Poor)
        );
        assert_eq!(
            channel_with_quality(Some(0.49)).quality_grade(),
            Some(QualityGrade::Poor)
        );
        assert_eq!(
            channel_with_quality(Some(0.5)).quality_grade(),
            Some(QualityGrade::Fair)
        );
        assert_eq!(
            channel_with_quality(Some(0.75)).quality_grade(),
            Some(QualityGrade::Good)
        );
        assert_eq!(
            channel_with_quality(Some(1.0)).quality_grade(),
            Some(QualityGrade::Good)
        );
    }

    #[test]
    fn test_quality_grade_unknown() {
        assert_eq!(channel_with_quality(None).quality_grade(), None);
    }

    #[test]
    fn test_channel_type_display() {
        assert_eq!(ChannelType::Cnt.to_string(), "CNT");
        assert_eq!(ChannelType::Ecg.to_string(), "ECG");
        assert_eq!(ChannelType::Ppg.to_string(), "PPG");
    }
}
