//! User preference storage
//!
//! Durable key/value settings that survive restarts: selected quality tier,
//! audio toggles and volumes, and the stored admin token. Values are JSON
//! encoded so the backends only deal in strings.

mod memory;
mod sqlite;

pub use memory::MemoryPreferences;
pub use sqlite::SqlitePreferences;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::session::QualityTier;

/// Storage keys
pub mod keys {
    pub const VIDEO_QUALITY: &str = "ptt-home-video-quality";
    pub const MICROPHONE_ENABLED: &str = "ptt-home-microphone-enabled";
    pub const SPEAKER_ENABLED: &str = "ptt-home-speaker-enabled";
    pub const MICROPHONE_VOLUME: &str = "ptt-home-microphone-volume";
    pub const SPEAKER_VOLUME: &str = "ptt-home-speaker-volume";
    pub const ADMIN_TOKEN: &str = "admin_token";
}

pub const DEFAULT_VOLUME: u8 = 50;
pub const MAX_VOLUME: u8 = 100;

/// Raw key/value backend
#[async_trait]
pub trait PreferenceBackend: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    async fn set_raw(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// Snapshot of every stored user preference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub quality: QualityTier,
    pub microphone_enabled: bool,
    pub speaker_enabled: bool,
    pub microphone_volume: u8,
    pub speaker_volume: u8,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            quality: QualityTier::default(),
            microphone_enabled: true,
            speaker_enabled: true,
            microphone_volume: DEFAULT_VOLUME,
            speaker_volume: DEFAULT_VOLUME,
        }
    }
}

/// Typed facade over a [`PreferenceBackend`]
#[derive(Clone)]
pub struct PreferenceStore {
    backend: Arc<dyn PreferenceBackend>,
}

impl PreferenceStore {
    pub fn new(backend: Arc<dyn PreferenceBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryPreferences::new()))
    }

    /// Read a value, falling back to `default` when missing or unreadable
    pub async fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.backend.get_raw(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Ignoring unreadable preference {}: {}", key, e);
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                warn!("Failed to read preference {}: {}", key, e);
                default
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.set_raw(key, &raw).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove(key).await
    }

    pub async fn load(&self) -> Preferences {
        let defaults = Preferences::default();
        Preferences {
            quality: self.get_or(keys::VIDEO_QUALITY, defaults.quality).await,
            microphone_enabled: self
                .get_or(keys::MICROPHONE_ENABLED, defaults.microphone_enabled)
                .await,
            speaker_enabled: self
                .get_or(keys::SPEAKER_ENABLED, defaults.speaker_enabled)
                .await,
            microphone_volume: self
                .get_or(keys::MICROPHONE_VOLUME, defaults.microphone_volume)
                .await
                .min(MAX_VOLUME),
            speaker_volume: self
                .get_or(keys::SPEAKER_VOLUME, defaults.speaker_volume)
                .await
                .min(MAX_VOLUME),
        }
    }

    pub async fn quality(&self) -> QualityTier {
        self.get_or(keys::VIDEO_QUALITY, QualityTier::default()).await
    }

    pub async fn set_quality(&self, quality: QualityTier) -> Result<()> {
        self.set(keys::VIDEO_QUALITY, &quality).await
    }

    pub async fn set_microphone_enabled(&self, enabled: bool) -> Result<()> {
        self.set(keys::MICROPHONE_ENABLED, &enabled).await
    }

    pub async fn set_speaker_enabled(&self, enabled: bool) -> Result<()> {
        self.set(keys::SPEAKER_ENABLED, &enabled).await
    }

    /// Persist a microphone volume, clamped to 0-100
    pub async fn set_microphone_volume(&self, volume: u8) -> Result<()> {
        self.set(keys::MICROPHONE_VOLUME, &volume.min(MAX_VOLUME)).await
    }

    /// Persist a speaker volume, clamped to 0-100
    pub async fn set_speaker_volume(&self, volume: u8) -> Result<()> {
        self.set(keys::SPEAKER_VOLUME, &volume.min(MAX_VOLUME)).await
    }

    pub async fn admin_token(&self) -> Option<String> {
        self.get_or::<Option<String>>(keys::ADMIN_TOKEN, None).await
    }

    pub async fn set_admin_token(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => self.set(keys::ADMIN_TOKEN, token).await,
            None => self.remove(keys::ADMIN_TOKEN).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let prefs = PreferenceStore::in_memory();
        assert_eq!(prefs.load().await, Preferences::default());
        assert_eq!(prefs.quality().await, QualityTier::P720);
        assert_eq!(prefs.admin_token().await, None);
    }

    #[tokio::test]
    async fn test_typed_round_trip_and_clamp() {
        let prefs = PreferenceStore::in_memory();
        prefs.set_quality(QualityTier::P1080).await.unwrap();
        prefs.set_speaker_enabled(false).await.unwrap();
        prefs.set_microphone_volume(250).await.unwrap();
        prefs.set_speaker_volume(30).await.unwrap();

        let loaded = prefs.load().await;
        assert_eq!(loaded.quality, QualityTier::P1080);
        assert!(!loaded.speaker_enabled);
        assert!(loaded.microphone_enabled);
        assert_eq!(loaded.microphone_volume, 100);
        assert_eq!(loaded.speaker_volume, 30);
    }

    #[tokio::test]
    async fn test_corrupt_value_falls_back() {
        let backend = Arc::new(MemoryPreferences::new());
        backend.set_raw(keys::VIDEO_QUALITY, "\"4k\"").await.unwrap();
        let prefs = PreferenceStore::new(backend);
        assert_eq!(prefs.quality().await, QualityTier::P720);
        assert!(prefs.get::<QualityTier>(keys::VIDEO_QUALITY).await.is_err());
    }

    #[tokio::test]
    async fn test_admin_token_set_and_clear() {
        let prefs = PreferenceStore::in_memory();
        prefs.set_admin_token(Some("abc")).await.unwrap();
        assert_eq!(prefs.admin_token().await.as_deref(), Some("abc"));
        prefs.set_admin_token(None).await.unwrap();
        assert_eq!(prefs.admin_token().await, None);
    }
}
