//! ptt-cam - client for a remote single-camera streaming backend
//!
//! This crate provides the session controller that keeps a live stream
//! connected against a flaky HTTP backend, the resilient gateway it talks
//! through, and the local side-channels (preferences, audio, fullscreen)
//! around it.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod prefs;
pub mod session;
pub mod state;
pub mod utils;

pub use error::{AppError, Result};
