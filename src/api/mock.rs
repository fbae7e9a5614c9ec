//! Scripted in-process backend for controller tests

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use super::backend::CameraBackend;
use super::types::{
    AuthInfo, CommandAck, HealthResponse, LoginResponse, Snapshot, StreamStatus, StreamingToken,
};
use crate::error::{AppError, Result};

/// Number of calls per endpoint
#[derive(Default)]
pub struct CallCounts {
    pub health: AtomicUsize,
    pub status: AtomicUsize,
    pub start: AtomicUsize,
    pub stop: AtomicUsize,
    pub snapshot: AtomicUsize,
    pub token: AtomicUsize,
    pub login: AtomicUsize,
    pub auth_info: AtomicUsize,
}

impl CallCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    pub calls: CallCounts,
    status: Mutex<StreamStatus>,
    /// Simulated round trip of `/health`
    latency: Mutex<Duration>,
    /// Simulated round trip of `/camera/status`
    status_delay: Mutex<Duration>,
    healthy: AtomicBool,
    unreachable: AtomicBool,
    start_error: Mutex<Option<u16>>,
    stop_fails: AtomicBool,
    token_fails: AtomicBool,
    bearer: Mutex<Option<String>>,
    valid_login: Mutex<Option<(String, String)>>,
    token_seq: AtomicUsize,
}

impl MockBackend {
    /// Backend with a live stream, healthy, 50ms latency
    pub fn live() -> Self {
        Self {
            calls: CallCounts::default(),
            status: Mutex::new(StreamStatus {
                streaming: true,
                camera_available: true,
                camera_index: Some(0),
                resolution: Some((1280, 720)),
                fps: Some(30.0),
                error: None,
            }),
            latency: Mutex::new(Duration::from_millis(50)),
            status_delay: Mutex::new(Duration::ZERO),
            healthy: AtomicBool::new(true),
            unreachable: AtomicBool::new(false),
            start_error: Mutex::new(None),
            stop_fails: AtomicBool::new(false),
            token_fails: AtomicBool::new(false),
            bearer: Mutex::new(None),
            valid_login: Mutex::new(None),
            token_seq: AtomicUsize::new(0),
        }
    }

    /// Backend that answers but whose camera is not streaming
    pub fn idle() -> Self {
        let mock = Self::live();
        mock.status.lock().streaming = false;
        mock
    }

    pub fn set_streaming(&self, streaming: bool) {
        self.status.lock().streaming = streaming;
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock() = delay;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make `/camera/start` answer with this HTTP status
    pub fn fail_start_with(&self, status: Option<u16>) {
        *self.start_error.lock() = status;
    }

    pub fn set_stop_fails(&self, fails: bool) {
        self.stop_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_token_fails(&self, fails: bool) {
        self.token_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_bearer(&self, token: Option<&str>) {
        *self.bearer.lock() = token.map(str::to_string);
    }

    pub fn accept_login(&self, identifier: &str, password: &str) {
        *self.valid_login.lock() = Some((identifier.to_string(), password.to_string()));
    }

    fn reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(AppError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CameraBackend for MockBackend {
    async fn health(&self) -> Result<HealthResponse> {
        self.calls.health.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        tokio::time::sleep(latency).await;
        self.reachable()?;
        let status = if self.healthy.load(Ordering::SeqCst) {
            "healthy"
        } else {
            "degraded"
        };
        Ok(HealthResponse {
            status: status.to_string(),
        })
    }

    async fn stream_status(&self) -> Result<StreamStatus> {
        self.calls.status.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock();
        tokio::time::sleep(delay).await;
        self.reachable()?;
        Ok(self.status.lock().clone())
    }

    async fn start_stream(&self) -> Result<CommandAck> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        if let Some(status) = *self.start_error.lock() {
            return Err(AppError::from_status(status, "start rejected"));
        }
        Ok(CommandAck {
            message: Some("Camera streaming started".to_string()),
        })
    }

    async fn stop_stream(&self) -> Result<CommandAck> {
        self.calls.stop.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        if self.stop_fails.load(Ordering::SeqCst) {
            return Err(AppError::from_status(500, "stop failed"));
        }
        Ok(CommandAck::default())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        self.calls.snapshot.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        Ok(Snapshot::new("image/jpeg", Bytes::from_static(b"\xff\xd8\xff\xe0")))
    }

    async fn streaming_token(&self) -> Result<StreamingToken> {
        self.calls.token.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        if self.token_fails.load(Ordering::SeqCst) {
            return Err(AppError::from_status(503, "token service down"));
        }
        let n = self.token_seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StreamingToken {
            token: format!("stream-{}", n),
            expires_in: Some(300),
        })
    }

    async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse> {
        self.calls.login.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        let accepted = self
            .valid_login
            .lock()
            .as_ref()
            .map(|(id, pw)| id == identifier && pw == password)
            .unwrap_or(false);
        if !accepted {
            return Err(AppError::Unauthorized);
        }
        let token = format!("bearer-{}", identifier);
        *self.bearer.lock() = Some(token.clone());
        Ok(LoginResponse {
            access_token: token,
            token_type: Some("bearer".to_string()),
            expires_in: Some(3600),
        })
    }

    async fn auth_info(&self) -> Result<AuthInfo> {
        self.calls.auth_info.fetch_add(1, Ordering::SeqCst);
        self.reachable()?;
        let bearer = self.bearer.lock().clone();
        Ok(AuthInfo {
            authenticated: bearer.is_some(),
            user_id: bearer.and_then(|t| t.strip_prefix("bearer-").map(str::to_string)),
        })
    }

    async fn bearer_token(&self) -> Option<String> {
        self.bearer.lock().clone()
    }

    fn feed_url(&self) -> String {
        "http://camera.test/camera/feed".to_string()
    }
}
