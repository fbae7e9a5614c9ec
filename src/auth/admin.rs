use std::sync::Arc;
use tracing::{info, warn};

use super::token::SharedToken;
use crate::api::{AuthInfo, CameraBackend, LoginResponse};
use crate::error::{AppError, Result};
use crate::events::{EventBus, SessionEvent};
use crate::prefs::PreferenceStore;

/// Credential login against the backend
///
/// The bearer token lands in the [`SharedToken`] the gateway reads from, and
/// in the preference store so it survives restarts.
pub struct AdminSession {
    backend: Arc<dyn CameraBackend>,
    token: SharedToken,
    prefs: PreferenceStore,
    events: Arc<EventBus>,
}

impl AdminSession {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        token: SharedToken,
        prefs: PreferenceStore,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            backend,
            token,
            prefs,
            events,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_set()
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "Identifier and password are required".to_string(),
            ));
        }

        let response = self.backend.login(identifier, password).await?;
        self.token.set(Some(response.access_token.clone()));
        self.prefs
            .set_admin_token(Some(&response.access_token))
            .await?;

        info!("Logged in as {}", identifier);
        self.events.publish(SessionEvent::AuthChanged {
            authenticated: true,
            user_id: Some(identifier.to_string()),
        });
        Ok(response)
    }

    /// Reinstall a stored token if the backend still accepts it
    ///
    /// Rejected tokens are forgotten. Network failures keep the token and
    /// return the error.
    pub async fn restore(&self) -> Result<Option<AuthInfo>> {
        let stored = match self.prefs.admin_token().await {
            Some(token) => token,
            None => return Ok(None),
        };
        self.token.set(Some(stored));

        match self.backend.auth_info().await {
            Ok(info) if info.authenticated => {
                info!(
                    "Restored admin session for {}",
                    info.user_id.as_deref().unwrap_or("unknown user")
                );
                Ok(Some(info))
            }
            Ok(_) => {
                warn!("Stored admin token no longer valid, discarding");
                self.forget().await?;
                Ok(None)
            }
            Err(e) if e.is_auth() => {
                warn!("Stored admin token rejected: {}", e);
                self.forget().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn logout(&self) -> Result<()> {
        self.forget().await?;
        info!("Logged out");
        Ok(())
    }

    /// Ask the backend who we are
    pub async fn whoami(&self) -> Result<AuthInfo> {
        self.backend.auth_info().await
    }

    async fn forget(&self) -> Result<()> {
        self.token.clear();
        self.prefs.set_admin_token(None).await?;
        self.events.publish(SessionEvent::AuthChanged {
            authenticated: false,
            user_id: None,
        });
        Ok(())
    }
}
