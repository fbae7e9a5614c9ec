//! Local media side-channels
//!
//! Audio and fullscreen never touch the session state machine; they only
//! share the preference store.

pub mod audio;
pub mod fullscreen;

pub use audio::{AudioChannel, AudioController, AudioDevice, AudioState, NoAudioDevice};
pub use fullscreen::{FullscreenCapability, FullscreenController, NoDisplay};
