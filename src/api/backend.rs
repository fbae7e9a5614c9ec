//! Backend gateway trait

use async_trait::async_trait;
use tokio::time::Instant;

use super::types::{
    AuthInfo, CommandAck, HealthResponse, LoginResponse, Snapshot, StreamStatus, StreamingToken,
};
use crate::error::Result;
use crate::session::LatencySample;

/// Remote camera backend as seen by the session controller
///
/// Implementations own their retry behavior; callers only see the final
/// outcome of each call.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// `GET /health`
    async fn health(&self) -> Result<HealthResponse>;

    /// `GET /camera/status`
    async fn stream_status(&self) -> Result<StreamStatus>;

    /// `POST /camera/start`
    async fn start_stream(&self) -> Result<CommandAck>;

    /// `POST /camera/stop`
    async fn stop_stream(&self) -> Result<CommandAck>;

    /// `GET /camera/snapshot`
    async fn snapshot(&self) -> Result<Snapshot>;

    /// `POST /camera/streaming-token`
    async fn streaming_token(&self) -> Result<StreamingToken>;

    /// `POST /auth/login`
    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse>;

    /// `GET /auth/info`
    async fn auth_info(&self) -> Result<AuthInfo>;

    /// Primary bearer token, if any is configured
    async fn bearer_token(&self) -> Option<String>;

    /// Unauthenticated feed URL; the controller appends the credential
    fn feed_url(&self) -> String;

    /// Time one health call
    ///
    /// Returns the sample and whether the backend reported itself healthy.
    /// Any failure yields the `-1` sentinel.
    async fn probe_latency(&self) -> (LatencySample, bool) {
        let started = Instant::now();
        match self.health().await {
            Ok(health) => (
                LatencySample::Measured(started.elapsed()),
                health.is_healthy(),
            ),
            Err(e) => {
                tracing::debug!("Health probe failed: {}", e);
                (LatencySample::Failed, false)
            }
        }
    }
}
