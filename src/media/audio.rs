//! Local audio side-channel
//!
//! Microphone and speaker toggles plus their volumes. Settings persist in the
//! preference store; the actual device work is behind [`AudioDevice`].

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::prefs::{PreferenceStore, MAX_VOLUME};

/// Local audio hardware as seen by the controller
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Whether capture hardware exists at all
    fn is_available(&self) -> bool;

    /// Open the microphone; `AppError::Media` when access is denied
    async fn acquire_microphone(&self) -> Result<()>;

    async fn release_microphone(&self);

    /// Gain in percent, 0-100
    fn apply_microphone_volume(&self, volume: u8);

    fn apply_speaker(&self, enabled: bool, volume: u8);
}

/// Device for hosts without audio hardware
pub struct NoAudioDevice;

#[async_trait]
impl AudioDevice for NoAudioDevice {
    fn is_available(&self) -> bool {
        false
    }

    async fn acquire_microphone(&self) -> Result<()> {
        Err(AppError::Media("No audio capture device".to_string()))
    }

    async fn release_microphone(&self) {}

    fn apply_microphone_volume(&self, _volume: u8) {}

    fn apply_speaker(&self, _enabled: bool, _volume: u8) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioChannel {
    Microphone,
    Speaker,
}

/// Audio settings plus the local recording flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioState {
    pub microphone_enabled: bool,
    pub speaker_enabled: bool,
    pub microphone_volume: u8,
    pub speaker_volume: u8,
    pub is_recording: bool,
    /// Microphone currently held open
    pub capturing: bool,
}

pub struct AudioController {
    device: Arc<dyn AudioDevice>,
    prefs: PreferenceStore,
    state: RwLock<AudioState>,
}

impl AudioController {
    /// Restore settings from preferences
    ///
    /// A stored "microphone enabled" flag does not open the device; that
    /// happens on the next toggle or recording start.
    pub async fn new(device: Arc<dyn AudioDevice>, prefs: PreferenceStore) -> Self {
        let stored = prefs.load().await;
        device.apply_speaker(stored.speaker_enabled, stored.speaker_volume);
        Self {
            device,
            prefs,
            state: RwLock::new(AudioState {
                microphone_enabled: stored.microphone_enabled,
                speaker_enabled: stored.speaker_enabled,
                microphone_volume: stored.microphone_volume,
                speaker_volume: stored.speaker_volume,
                is_recording: false,
                capturing: false,
            }),
        }
    }

    pub async fn state(&self) -> AudioState {
        self.state.read().await.clone()
    }

    pub fn device_available(&self) -> bool {
        self.device.is_available()
    }

    /// Flip the microphone preference; returns the new enabled flag
    ///
    /// Enabling opens the device first and leaves everything untouched when
    /// that fails. Disabling always succeeds and only releases a device that
    /// is actually open. The recording flag follows the microphone.
    pub async fn toggle_microphone(&self) -> Result<bool> {
        let mut state = self.state.write().await;
        let enabled = !state.microphone_enabled;

        if enabled {
            if !state.capturing {
                self.device.acquire_microphone().await?;
            }
            self.device.apply_microphone_volume(state.microphone_volume);
        } else if state.capturing {
            self.device.release_microphone().await;
        }

        state.microphone_enabled = enabled;
        state.capturing = enabled;
        state.is_recording = enabled;
        drop(state);

        self.prefs.set_microphone_enabled(enabled).await?;
        info!("Microphone {}", if enabled { "enabled" } else { "disabled" });
        Ok(enabled)
    }

    /// Flip the speaker; returns the new enabled flag
    pub async fn toggle_speaker(&self) -> Result<bool> {
        let mut state = self.state.write().await;
        let enabled = !state.speaker_enabled;
        state.speaker_enabled = enabled;
        self.device.apply_speaker(enabled, state.speaker_volume);
        drop(state);

        self.prefs.set_speaker_enabled(enabled).await?;
        Ok(enabled)
    }

    /// Set a volume, clamped to 0-100; returns the applied value
    pub async fn set_volume(&self, channel: AudioChannel, volume: u8) -> Result<u8> {
        let volume = volume.min(MAX_VOLUME);
        let mut state = self.state.write().await;
        match channel {
            AudioChannel::Microphone => {
                state.microphone_volume = volume;
                if state.capturing {
                    self.device.apply_microphone_volume(volume);
                }
            }
            AudioChannel::Speaker => {
                state.speaker_volume = volume;
                self.device.apply_speaker(state.speaker_enabled, volume);
            }
        }
        drop(state);

        match channel {
            AudioChannel::Microphone => self.prefs.set_microphone_volume(volume).await?,
            AudioChannel::Speaker => self.prefs.set_speaker_volume(volume).await?,
        }
        debug!("{:?} volume set to {}", channel, volume);
        Ok(volume)
    }

    /// Start local recording, opening the microphone when needed
    pub async fn start_recording(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.capturing {
            self.device.acquire_microphone().await?;
            self.device.apply_microphone_volume(state.microphone_volume);
            state.capturing = true;
        }
        state.is_recording = true;
        Ok(())
    }

    pub async fn stop_recording(&self) {
        self.state.write().await.is_recording = false;
    }

    /// Release the microphone, keeping the stored settings
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        if state.capturing {
            self.device.release_microphone().await;
            state.capturing = false;
        }
        if state.is_recording {
            warn!("Audio shut down while recording");
            state.is_recording = false;
        }
    }
}
