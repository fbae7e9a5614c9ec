//! Wire types of the camera backend HTTP API

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::Result;

/// API paths
pub mod endpoints {
    pub const HEALTH: &str = "/health";
    pub const CAMERA_STATUS: &str = "/camera/status";
    pub const CAMERA_DEBUG: &str = "/camera/debug";
    pub const CAMERA_START: &str = "/camera/start";
    pub const CAMERA_STOP: &str = "/camera/stop";
    pub const CAMERA_SNAPSHOT: &str = "/camera/snapshot";
    pub const CAMERA_FEED: &str = "/camera/feed";
    pub const STREAMING_TOKEN: &str = "/camera/streaming-token";
    pub const AUTH_LOGIN: &str = "/auth/login";
    pub const AUTH_INFO: &str = "/auth/info";
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// `GET /camera/status`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamStatus {
    pub streaming: bool,
    pub camera_available: bool,
    pub camera_index: Option<i32>,
    pub resolution: Option<(u32, u32)>,
    pub fps: Option<f32>,
    pub error: Option<String>,
}

impl StreamStatus {
    /// Stream running on an available camera
    pub fn is_live(&self) -> bool {
        self.streaming && self.camera_available
    }

    /// Reason the stream is not live, for `last_error`
    pub fn failure_reason(&self) -> String {
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return error.to_string();
        }
        if !self.camera_available {
            "Camera not detected".to_string()
        } else {
            "Video stream unavailable".to_string()
        }
    }
}

/// `GET /camera/debug`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDebug {
    pub available_cameras: Vec<CameraProbe>,
    pub current_camera: Option<i32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraProbe {
    pub index: i32,
    pub resolution: (u32, u32),
    pub fps: f32,
    pub working: bool,
}

/// Acknowledgement of `POST /camera/start` and `POST /camera/stop`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandAck {
    pub message: Option<String>,
}

/// `POST /camera/streaming-token`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingToken {
    #[serde(alias = "streaming_token", alias = "access_token")]
    pub token: String,
    /// Validity in seconds, when the backend reports it
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// `POST /auth/login` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// `POST /auth/login` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Validity in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// `GET /auth/info`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthInfo {
    pub authenticated: bool,
    pub user_id: Option<String>,
}

/// Image returned by `GET /camera/snapshot`
///
/// A transient local handle: nothing refers to it once dropped.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: Uuid,
    pub content_type: String,
    pub data: Bytes,
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_type: content_type.into(),
            data,
            taken_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File extension matching the content type
    pub fn extension(&self) -> &'static str {
        match self.content_type.split(';').next().unwrap_or_default().trim() {
            "image/png" => "png",
            "image/webp" => "webp",
            "application/json" => "json",
            _ => "jpg",
        }
    }

    /// Default file name, e.g. `snapshot-20250101-120000.jpg`
    pub fn file_name(&self) -> String {
        format!(
            "snapshot-{}.{}",
            self.taken_at.format("%Y%m%d-%H%M%S"),
            self.extension()
        )
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, &self.data).await?;
        Ok(())
    }
}
