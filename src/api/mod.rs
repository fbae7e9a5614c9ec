//! Backend gateway
//!
//! [`CameraBackend`] is the seam the session controller talks to;
//! [`ApiClient`] is the HTTP implementation with uniform retries.

pub mod backend;
pub mod client;
pub mod retry;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use backend::CameraBackend;
pub use client::ApiClient;
pub use retry::RetryPolicy;
pub use types::{
    endpoints, AuthInfo, CameraDebug, CameraProbe, CommandAck, HealthResponse, LoginRequest,
    LoginResponse, Snapshot, StreamStatus, StreamingToken,
};
