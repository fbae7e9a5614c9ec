//! Camera session controller
//!
//! Owns the connection lifecycle against the camera backend:
//! - start command followed by a forced liveness check
//! - streaming credential issue and periodic renewal
//! - reconnect scheduling after failures
//! - best-effort teardown
//!
//! The current [`SessionState`] is published through a watch channel. State
//! edges and other discrete happenings also go out on the [`EventBus`].

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backoff::ReconnectPolicy;
use super::quality::{classify, LatencySample};
use super::state::{
    AccessCredential, ConnectionState, CredentialKind, QualityTier, SessionState, StreamEndpoint,
};
use super::timers::{TimerSlot, TimerSlots};
use crate::api::{CameraBackend, Snapshot};
use crate::config::{AppConfig, QualityThresholds, SessionConfig};
use crate::error::{AppError, Result};
use crate::events::{EventBus, SessionEvent};
use crate::prefs::PreferenceStore;
use crate::utils::LogThrottler;

/// Throttler key for repeated connect failures
const CONNECT_LOG_KEY: &str = "session.connect";

/// Timers that only run while connected
const CONNECTED_TIMERS: [TimerSlot; 3] = [
    TimerSlot::StatusPoll,
    TimerSlot::HealthPoll,
    TimerSlot::TokenRenewal,
];

/// Outcome of one combined status + health check
enum Liveness {
    Live(LatencySample),
    Down {
        reason: String,
        latency: LatencySample,
    },
}

/// Releases the connect slot when the attempt ends, unless a newer
/// session has taken it over
struct ConnectGuard<'a> {
    owner: &'a AtomicU64,
    ticket: u64,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        let _ = self
            .owner
            .compare_exchange(self.ticket, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Session controller for a single camera
///
/// Construct with [`SessionController::new`]; every timer task holds only a
/// weak reference, so dropping the last `Arc` tears everything down.
pub struct SessionController {
    backend: Arc<dyn CameraBackend>,
    prefs: PreferenceStore,
    config: SessionConfig,
    thresholds: QualityThresholds,
    reconnect: ReconnectPolicy,
    events: Arc<EventBus>,
    state: watch::Sender<SessionState>,
    timers: TimerSlots,
    /// Bumped by every disconnect; results carrying an older value are dropped
    generation: AtomicU64,
    /// Generation + 1 of the attempt holding the connect slot, 0 when idle
    connect_owner: AtomicU64,
    consecutive_failures: AtomicU32,
    /// When the last status request was issued
    last_status_check: Mutex<Option<Instant>>,
    credential: Mutex<Option<AccessCredential>>,
    throttler: LogThrottler,
}

impl SessionController {
    /// Create a controller; the quality tier is restored from preferences
    pub async fn new(
        backend: Arc<dyn CameraBackend>,
        prefs: PreferenceStore,
        config: &AppConfig,
        events: Arc<EventBus>,
    ) -> Arc<Self> {
        let quality = prefs.quality().await;
        let (state, _) = watch::channel(SessionState::new(quality));

        Arc::new(Self {
            backend,
            prefs,
            config: config.session.clone(),
            thresholds: config.thresholds,
            reconnect: ReconnectPolicy::from_config(&config.session),
            events,
            state,
            timers: TimerSlots::new(),
            generation: AtomicU64::new(0),
            connect_owner: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
            last_status_check: Mutex::new(None),
            credential: Mutex::new(None),
            throttler: LogThrottler::default(),
        })
    }

    /// Current state snapshot
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every published state
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Number of armed timer slots
    pub fn armed_timers(&self) -> usize {
        self.timers.armed_count()
    }

    pub fn is_timer_armed(&self, slot: TimerSlot) -> bool {
        self.timers.is_armed(slot)
    }

    /// Start the stream and bring the session up
    ///
    /// A no-op while already connected or while another attempt of the same
    /// session is running; an attempt orphaned by `disconnect` does not block.
    /// On failure the session moves to `Reconnecting` (or `Errored` for
    /// non-transient causes) and a retry is armed.
    pub async fn connect(self: &Arc<Self>) -> SessionState {
        if self.is_connected() {
            debug!("Connect requested while already connected");
            return self.state();
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let ticket = generation + 1;
        let mut owner = self.connect_owner.load(Ordering::Acquire);
        loop {
            if owner >= ticket {
                debug!("Connect already in progress");
                return self.state();
            }
            // Idle, or held by an attempt a disconnect has already orphaned
            match self.connect_owner.compare_exchange(
                owner,
                ticket,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => owner = current,
            }
        }
        let _guard = ConnectGuard {
            owner: &self.connect_owner,
            ticket,
        };

        self.timers.cancel(TimerSlot::Reconnect);
        self.apply(Some(generation), |state| {
            state.connection = ConnectionState::Connecting;
            state.is_loading = true;
            true
        });

        let outcome = match self.backend.start_stream().await {
            Ok(_) => self.check_liveness().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(Liveness::Live(latency)) => self.on_connected(generation, latency).await,
            Ok(Liveness::Down { reason, latency }) => {
                self.on_connect_failure(generation, reason, true, latency)
            }
            Err(e) => {
                let transient = e.is_transient();
                self.on_connect_failure(generation, e.to_string(), transient, LatencySample::Failed)
            }
        }

        self.state()
    }

    /// Tear the session down
    ///
    /// Always ends in `Disconnected` with no timer armed. The stop command is
    /// best-effort and sent even from an idle controller, so a stream left
    /// running by another client gets stopped too.
    pub async fn disconnect(&self) -> SessionState {
        let mut previous = ConnectionState::Disconnected;
        self.apply(None, |state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            previous = state.connection;
            state.connection = ConnectionState::Disconnected;
            state.last_error = None;
            state.is_loading = false;
            state.latency = LatencySample::Failed;
            true
        });

        self.timers.cancel_all();
        *self.credential.lock() = None;
        *self.last_status_check.lock() = None;
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.throttler.clear(CONNECT_LOG_KEY);

        if let Err(e) = self.backend.stop_stream().await {
            warn!("Failed to stop camera stream: {}", e);
            self.events.publish(SessionEvent::StopFailed {
                error: e.to_string(),
            });
        }
        if previous.is_active() {
            info!("Camera session disconnected");
        }

        self.state()
    }

    /// Switch the requested quality tier
    ///
    /// The state reflects the new tier right away; when connected a forced
    /// status check follows.
    pub async fn change_quality(self: &Arc<Self>, quality: QualityTier) -> SessionState {
        self.apply(None, |state| {
            state.quality = quality;
            true
        });
        if let Err(e) = self.prefs.set_quality(quality).await {
            warn!("Failed to persist quality {}: {}", quality, e);
        }
        self.events.publish(SessionEvent::QualityChanged { quality });
        info!("Video quality set to {}", quality);

        if self.is_connected() {
            return self.refresh_status(true).await;
        }
        self.state()
    }

    /// Query stream status and backend health
    ///
    /// Without `force`, a check issued within the cache window is reused.
    /// While connected, a live answer refreshes the credential and a dead one
    /// starts the reconnect cycle. Otherwise only the latency sample is kept;
    /// [`connect`](Self::connect) is the only way into `Connected`.
    pub async fn refresh_status(self: &Arc<Self>, force: bool) -> SessionState {
        if !force {
            let last = *self.last_status_check.lock();
            if let Some(last) = last {
                if last.elapsed() < self.config.status_cache() {
                    debug!("Status check served from cache");
                    return self.state();
                }
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let outcome = self.check_liveness().await;

        if !self.is_connected() {
            let latency = match &outcome {
                Ok(Liveness::Live(latency)) | Ok(Liveness::Down { latency, .. }) => *latency,
                Err(_) => LatencySample::Failed,
            };
            self.apply(Some(generation), |state| {
                state.latency = latency;
                true
            });
            return self.state();
        }

        match outcome {
            Ok(Liveness::Live(latency)) => {
                let applied = self.apply(Some(generation), |state| {
                    if !state.is_connected() {
                        return false;
                    }
                    state.latency = latency;
                    state.last_error = None;
                    true
                });
                if applied {
                    self.renew_credential().await;
                }
            }
            Ok(Liveness::Down { reason, latency }) => {
                warn!("Camera stream lost: {}", reason);
                self.on_connect_failure(generation, reason, true, latency);
            }
            Err(e) if e.is_auth() => {
                // Terminal for this check only; the session stays up
                warn!("Status check rejected: {}", e);
                self.apply(Some(generation), |state| {
                    state.last_error = Some(e.to_string());
                    true
                });
            }
            Err(e) => {
                warn!("Status check failed: {}", e);
                let transient = e.is_transient();
                self.on_connect_failure(generation, e.to_string(), transient, LatencySample::Failed);
            }
        }

        self.state()
    }

    /// Grab a still image; requires a connected session
    pub async fn take_snapshot(&self) -> Result<Snapshot> {
        if !self.is_connected() {
            return Err(AppError::NotConnected);
        }

        let snapshot = self.backend.snapshot().await?;
        debug!("Snapshot {} ({} bytes)", snapshot.id, snapshot.len());
        self.events.publish(SessionEvent::SnapshotTaken {
            id: snapshot.id.to_string(),
            bytes: snapshot.len(),
        });
        Ok(snapshot)
    }

    /// Set the local recording flag; requires a connected session
    pub fn start_recording(&self) -> Result<SessionState> {
        let applied = self.apply(None, |state| {
            if !state.is_connected() {
                return false;
            }
            state.is_recording = true;
            true
        });
        if !applied {
            return Err(AppError::NotConnected);
        }
        self.events
            .publish(SessionEvent::RecordingChanged { recording: true });
        Ok(self.state())
    }

    pub fn stop_recording(&self) -> SessionState {
        let was_recording = self.state.borrow().is_recording;
        self.apply(None, |state| {
            state.is_recording = false;
            true
        });
        if was_recording {
            self.events
                .publish(SessionEvent::RecordingChanged { recording: false });
        }
        self.state()
    }

    /// Status and health in parallel; stamps the cache window at issue time
    async fn check_liveness(&self) -> Result<Liveness> {
        *self.last_status_check.lock() = Some(Instant::now());

        let (status, (latency, healthy)) =
            tokio::join!(self.backend.stream_status(), self.backend.probe_latency());
        let status = status?;

        if !status.is_live() {
            return Ok(Liveness::Down {
                reason: status.failure_reason(),
                latency,
            });
        }
        if !healthy {
            return Ok(Liveness::Down {
                reason: "Backend health check failed".to_string(),
                latency,
            });
        }
        Ok(Liveness::Live(latency))
    }

    async fn on_connected(self: &Arc<Self>, generation: u64, latency: LatencySample) {
        let credential = match self.fetch_credential().await {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Streaming token unavailable, using bearer token: {}", e);
                self.bearer_credential().await
            }
        };
        let endpoint = StreamEndpoint::build(&self.backend.feed_url(), credential.as_ref());

        let applied = self.apply(Some(generation), |state| {
            state.connection = ConnectionState::Connected;
            state.stream_endpoint = Some(endpoint);
            state.last_error = None;
            state.is_loading = false;
            state.latency = latency;
            true
        });
        if !applied {
            debug!("Discarding connect result from a finished session");
            return;
        }

        let fallback = credential
            .as_ref()
            .map(|c| c.kind == CredentialKind::Bearer)
            .unwrap_or(false);
        *self.credential.lock() = credential;
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.throttler.clear(CONNECT_LOG_KEY);
        if fallback {
            self.events
                .publish(SessionEvent::TokenRenewed { fallback: true });
        }

        self.arm_connected_timers(generation);
        info!("Camera session connected");
    }

    fn on_connect_failure(
        self: &Arc<Self>,
        generation: u64,
        reason: String,
        transient: bool,
        latency: LatencySample,
    ) {
        let next = if transient {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Errored
        };
        let error = reason.clone();
        let applied = self.apply(Some(generation), |state| {
            state.connection = next;
            state.last_error = Some(error);
            state.is_loading = false;
            state.latency = latency;
            true
        });
        if !applied {
            debug!("Discarding connect failure from a finished session");
            return;
        }

        for slot in CONNECTED_TIMERS {
            self.timers.cancel(slot);
        }
        *self.credential.lock() = None;

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.reconnect.delay_for(failures);
        crate::warn_throttled!(
            self.throttler,
            CONNECT_LOG_KEY,
            "Camera connect failed ({} in a row): {}, retrying in {:?}",
            failures,
            reason,
            delay
        );
        self.schedule_reconnect(generation, failures, delay);
    }

    fn schedule_reconnect(self: &Arc<Self>, generation: u64, attempt: u32, delay: Duration) {
        let this = Arc::downgrade(self);
        self.timers.arm_once(TimerSlot::Reconnect, delay, async move {
            if let Some(this) = this.upgrade() {
                this.connect().await;
            }
        });

        // A disconnect may have slipped in between the state write and arming
        if self.generation.load(Ordering::SeqCst) != generation {
            self.timers.cancel(TimerSlot::Reconnect);
            return;
        }
        self.events.publish(SessionEvent::ReconnectScheduled {
            attempt,
            delay_ms: delay.as_millis() as u64,
        });
    }

    fn arm_connected_timers(self: &Arc<Self>, generation: u64) {
        let this = Arc::downgrade(self);
        self.timers.arm_interval(
            TimerSlot::StatusPoll,
            self.config.status_poll_interval(),
            move || {
                let this = this.clone();
                async move {
                    if let Some(this) = this.upgrade() {
                        this.refresh_status(true).await;
                    }
                }
            },
        );

        let this = Arc::downgrade(self);
        self.timers.arm_interval(
            TimerSlot::HealthPoll,
            self.config.health_poll_interval(),
            move || {
                let this = this.clone();
                async move {
                    if let Some(this) = this.upgrade() {
                        this.poll_health().await;
                    }
                }
            },
        );

        let this = Arc::downgrade(self);
        self.timers.arm_interval(
            TimerSlot::TokenRenewal,
            self.config.token_renewal_interval(),
            move || {
                let this = this.clone();
                async move {
                    if let Some(this) = this.upgrade() {
                        this.renew_credential().await;
                    }
                }
            },
        );

        if self.generation.load(Ordering::SeqCst) != generation {
            for slot in CONNECTED_TIMERS {
                self.timers.cancel(slot);
            }
        }
    }

    /// Latency-only probe
    async fn poll_health(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        let (latency, healthy) = self.backend.probe_latency().await;
        if !healthy {
            debug!("Health probe reported an unhealthy backend");
        }

        let applied = self.apply(Some(generation), |state| {
            if !state.is_connected() {
                return false;
            }
            state.latency = latency;
            true
        });
        if applied {
            self.events.publish(SessionEvent::LatencyMeasured {
                latency_ms: latency.as_millis(),
            });
        }
    }

    /// Swap in a fresh streaming credential; failures keep the current one
    async fn renew_credential(&self) {
        if !self.is_connected() {
            debug!("Skipping token renewal while not connected");
            return;
        }
        let generation = self.generation.load(Ordering::SeqCst);

        match self.fetch_credential().await {
            Ok(credential) => {
                let endpoint =
                    StreamEndpoint::build(&self.backend.feed_url(), Some(&credential));
                let applied = self.apply(Some(generation), |state| {
                    if !state.is_connected() {
                        return false;
                    }
                    state.stream_endpoint = Some(endpoint);
                    true
                });
                if applied {
                    *self.credential.lock() = Some(credential);
                    debug!("Streaming token renewed");
                    self.events
                        .publish(SessionEvent::TokenRenewed { fallback: false });
                }
            }
            Err(e) => {
                warn!("Streaming token renewal failed, keeping current endpoint: {}", e);
                self.events.publish(SessionEvent::TokenRenewalFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    async fn fetch_credential(&self) -> Result<AccessCredential> {
        let issued = self.backend.streaming_token().await?;
        if issued.token.is_empty() {
            return Err(AppError::InvalidResponse(
                "Empty streaming token".to_string(),
            ));
        }

        let validity = issued
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.token_validity());
        Ok(self.credential_for(issued.token, CredentialKind::Streaming, validity))
    }

    async fn bearer_credential(&self) -> Option<AccessCredential> {
        let token = self.backend.bearer_token().await?;
        Some(self.credential_for(
            token,
            CredentialKind::Bearer,
            self.config.token_validity(),
        ))
    }

    fn credential_for(
        &self,
        token: String,
        kind: CredentialKind,
        validity: Duration,
    ) -> AccessCredential {
        let issued_at = Utc::now();
        let validity =
            chrono::Duration::from_std(validity).unwrap_or_else(|_| chrono::Duration::minutes(5));
        AccessCredential {
            token,
            kind,
            issued_at,
            expires_at: issued_at + validity,
        }
    }

    /// Mutate and publish the state
    ///
    /// With `generation` set, the write is skipped once a disconnect has
    /// happened since. `f` returns `false` to skip the write. Returns whether
    /// the write happened. Leaving `Connected` always drops the endpoint and
    /// the recording flag, and the quality classification is recomputed.
    fn apply<F>(&self, generation: Option<u64>, f: F) -> bool
    where
        F: FnOnce(&mut SessionState) -> bool,
    {
        let mut applied = false;
        let mut transition = None;

        self.state.send_if_modified(|state| {
            if let Some(generation) = generation {
                if self.generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
            }

            let before = state.clone();
            if !f(state) {
                return false;
            }
            applied = true;

            if !state.is_connected() {
                state.stream_endpoint = None;
                state.is_recording = false;
            }
            state.connection_quality =
                classify(state.latency, state.is_connected(), &self.thresholds);

            if before.connection != state.connection {
                transition = Some((before.connection, state.connection, state.last_error.clone()));
            }
            *state != before
        });

        if let Some((from, to, error)) = transition {
            debug!("Session state {} -> {}", from, to);
            self.events
                .publish(SessionEvent::StateChanged { from, to, error });
        }
        applied
    }
}
