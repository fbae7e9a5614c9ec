use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Remote backend settings
    pub api: ApiConfig,
    /// Session controller timing
    pub session: SessionConfig,
    /// Connection quality thresholds
    pub thresholds: QualityThresholds,
}

/// Backend gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the camera backend (no trailing slash required)
    pub base_url: String,
    /// Total attempts per remote call, including the first one
    pub retry_attempts: u32,
    /// Base retry delay, multiplied by the attempt number
    pub retry_delay_ms: u64,
    /// Per-request timeout
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            retry_attempts: 3,
            retry_delay_ms: 1000,
            timeout_ms: 10_000,
        }
    }
}

impl ApiConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Session controller configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Base reconnect delay after a failed connect
    pub reconnect_delay_ms: u64,
    /// Upper bound for any reconnect delay
    pub reconnect_ceiling_ms: u64,
    /// Non-forced status checks within this window are served from cache
    pub status_cache_ms: u64,
    /// Full status check period while connected
    pub status_poll_interval_ms: u64,
    /// Lightweight health check period while connected
    pub health_poll_interval_ms: u64,
    /// Validity window of a streaming credential
    pub token_validity_secs: u64,
    /// Fraction of the validity window after which the credential is renewed
    pub token_renewal_ratio: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 5000,
            reconnect_ceiling_ms: 30_000,
            status_cache_ms: 5000,
            status_poll_interval_ms: 120_000,
            health_poll_interval_ms: 30_000,
            token_validity_secs: 300,
            token_renewal_ratio: 0.8,
        }
    }
}

impl SessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn reconnect_ceiling(&self) -> Duration {
        Duration::from_millis(self.reconnect_ceiling_ms)
    }

    pub fn status_cache(&self) -> Duration {
        Duration::from_millis(self.status_cache_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    pub fn token_validity(&self) -> Duration {
        Duration::from_secs(self.token_validity_secs)
    }

    /// Renewal period, e.g. 240s for a 300s credential at 0.8
    ///
    /// Ratios outside (0, 1] fall back to the default 0.8.
    pub fn token_renewal_interval(&self) -> Duration {
        let ratio = if self.token_renewal_ratio > 0.0 && self.token_renewal_ratio <= 1.0 {
            self.token_renewal_ratio
        } else {
            0.8
        };
        self.token_validity().mul_f64(ratio)
    }
}

/// Latency thresholds for connection quality classification (milliseconds)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QualityThresholds {
    pub excellent_ms: u64,
    pub good_ms: u64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent_ms: 100,
            good_ms: 300,
        }
    }
}
