use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::{ApiClient, CameraBackend};
use crate::auth::{AdminSession, SharedToken, TokenSource};
use crate::config::{AppConfig, ConfigStore};
use crate::error::Result;
use crate::events::EventBus;
use crate::media::{AudioController, NoAudioDevice};
use crate::prefs::{PreferenceStore, SqlitePreferences};
use crate::session::{ConnectionState, SessionController};

const DB_FILE: &str = "ptt-cam.db";

/// Startup options that override stored configuration
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// Backend URL for this run only
    pub api_url: Option<String>,
}

/// Everything the binary needs, wired once at startup
pub struct AppState {
    /// Persisted configuration
    pub config: ConfigStore,
    /// Configuration in effect for this run (stored config plus overrides)
    pub effective: AppConfig,
    pub prefs: PreferenceStore,
    /// Bearer token read by the gateway on every request
    pub token: SharedToken,
    pub api: Arc<ApiClient>,
    pub admin: AdminSession,
    pub session: Arc<SessionController>,
    pub audio: Arc<AudioController>,
    /// Event bus for discrete session events
    pub events: Arc<EventBus>,
    data_dir: PathBuf,
}

impl AppState {
    /// Open the client database under `data_dir` and build every component
    pub async fn init(data_dir: PathBuf, options: StartupOptions) -> Result<Arc<Self>> {
        let config = ConfigStore::new(&data_dir.join(DB_FILE)).await?;

        let mut effective = (*config.get()).clone();
        if let Some(url) = options.api_url {
            debug!("Overriding backend URL for this run: {}", url);
            effective.api.base_url = url;
        }

        let prefs = PreferenceStore::new(Arc::new(SqlitePreferences::new(config.pool().clone())));
        let events = Arc::new(EventBus::new());
        let token = SharedToken::new();

        let tokens: Arc<dyn TokenSource> = Arc::new(token.clone());
        let api = Arc::new(ApiClient::new(&effective.api, Some(tokens))?);
        let backend: Arc<dyn CameraBackend> = api.clone();

        let admin = AdminSession::new(backend.clone(), token.clone(), prefs.clone(), events.clone());
        let session =
            SessionController::new(backend, prefs.clone(), &effective, events.clone()).await;
        let audio = Arc::new(AudioController::new(Arc::new(NoAudioDevice), prefs.clone()).await);

        info!("Using backend {}", api.base_url());

        Ok(Arc::new(Self {
            config,
            effective,
            prefs,
            token,
            api,
            admin,
            session,
            audio,
            events,
            data_dir,
        }))
    }

    /// Get data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Stop the session and release local devices
    pub async fn shutdown(&self) {
        if self.session.state().connection != ConnectionState::Disconnected {
            self.session.disconnect().await;
        }
        self.audio.shutdown().await;
        info!("Shutdown complete");
    }
}
