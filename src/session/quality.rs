//! Latency samples and connection quality classification
//!
//! Classification is memoryless: only the most recent sample counts. Noisy
//! links can flap between tiers; smoothing is a product decision, not done here.

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::config::QualityThresholds;

/// Most recent round-trip timing, or the failure sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencySample {
    Measured(Duration),
    Failed,
}

impl LatencySample {
    pub const FAILED_MILLIS: i64 = -1;

    /// Build from milliseconds; any negative value is the failure sentinel
    pub fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            LatencySample::Failed
        } else {
            LatencySample::Measured(Duration::from_millis(ms as u64))
        }
    }

    /// Milliseconds, `-1` for a failed probe
    pub fn as_millis(&self) -> i64 {
        match self {
            LatencySample::Measured(d) => d.as_millis().min(i64::MAX as u128) as i64,
            LatencySample::Failed => Self::FAILED_MILLIS,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LatencySample::Failed)
    }
}

impl Serialize for LatencySample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_millis())
    }
}

/// Latency-derived health of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Disconnected,
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionQuality::Excellent => "excellent",
            ConnectionQuality::Good => "good",
            ConnectionQuality::Poor => "poor",
            ConnectionQuality::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Classify a sample; anything but a connected session reports `Disconnected`
pub fn classify(
    sample: LatencySample,
    connected: bool,
    thresholds: &QualityThresholds,
) -> ConnectionQuality {
    let latency = match sample {
        LatencySample::Measured(d) if connected => d,
        _ => return ConnectionQuality::Disconnected,
    };

    let ms = latency.as_millis();
    if ms <= thresholds.excellent_ms as u128 {
        ConnectionQuality::Excellent
    } else if ms <= thresholds.good_ms as u128 {
        ConnectionQuality::Good
    } else {
        ConnectionQuality::Poor
    }
}
