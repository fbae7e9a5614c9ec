//! Camera session management
//!
//! The controller and the value types it publishes.

pub mod backoff;
pub mod controller;
pub mod quality;
pub mod state;
pub mod timers;

pub use backoff::ReconnectPolicy;
pub use controller::SessionController;
pub use quality::{classify, ConnectionQuality, LatencySample};
pub use state::{
    AccessCredential, ConnectionState, CredentialKind, QualityTier, SessionState, StreamEndpoint,
};
pub use timers::{TimerSlot, TimerSlots};
