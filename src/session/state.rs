//! Session state published to observers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::quality::{ConnectionQuality, LatencySample};
use crate::error::AppError;

/// Lifecycle of the streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Last attempt failed with a transient cause, retry pending
    Reconnecting,
    /// Last attempt failed with a non-transient cause, retry still pending
    Errored,
}

impl ConnectionState {
    /// Whether a connect/retry cycle is in progress or established
    pub fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Requested resolution tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QualityTier {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    #[default]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::P480, QualityTier::P720, QualityTier::P1080];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::P480 => "480p",
            QualityTier::P720 => "720p",
            QualityTier::P1080 => "1080p",
        }
    }

    /// Target frame size (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            QualityTier::P480 => (854, 480),
            QualityTier::P720 => (1280, 720),
            QualityTier::P1080 => (1920, 1080),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::P480 => "480p (SD)",
            QualityTier::P720 => "720p (HD)",
            QualityTier::P1080 => "1080p (FHD)",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "480p" | "480" | "low" | "sd" => Ok(QualityTier::P480),
            "720p" | "720" | "medium" | "hd" => Ok(QualityTier::P720),
            "1080p" | "1080" | "high" | "fhd" => Ok(QualityTier::P1080),
            other => Err(AppError::BadRequest(format!("Unknown quality tier: {}", other))),
        }
    }
}

/// Where a credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    /// Short-lived token from `/camera/streaming-token`
    Streaming,
    /// Primary bearer token, used only when streaming token issuance fails
    Bearer,
}

/// Short-lived token bound to the current stream endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub token: String,
    pub kind: CredentialKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessCredential {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("token", &"<redacted>")
            .field("kind", &self.kind)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credentialed locator of the live video feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamEndpoint {
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StreamEndpoint {
    /// Feed URL with the credential appended as `token` query parameter
    pub fn build(feed_url: &str, credential: Option<&AccessCredential>) -> Self {
        match credential {
            Some(credential) => {
                let sep = if feed_url.contains('?') { '&' } else { '?' };
                Self {
                    url: format!(
                        "{}{}token={}",
                        feed_url,
                        sep,
                        urlencoding::encode(&credential.token)
                    ),
                    expires_at: Some(credential.expires_at),
                }
            }
            None => Self {
                url: feed_url.to_string(),
                expires_at: None,
            },
        }
    }
}

/// Immutable snapshot of the session, republished on every transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub connection: ConnectionState,
    /// Present iff `connection == Connected`
    pub stream_endpoint: Option<StreamEndpoint>,
    pub quality: QualityTier,
    pub last_error: Option<String>,
    pub is_recording: bool,
    /// A connect sequence is awaiting the backend
    pub is_loading: bool,
    pub latency: LatencySample,
    pub connection_quality: ConnectionQuality,
}

impl SessionState {
    pub fn new(quality: QualityTier) -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            stream_endpoint: None,
            quality,
            last_error: None,
            is_recording: false,
            is_loading: false,
            latency: LatencySample::Failed,
            connection_quality: ConnectionQuality::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_quality_tier_parse_and_serde() {
        assert_eq!("1080p".parse::<QualityTier>().unwrap(), QualityTier::P1080);
        assert_eq!("low".parse::<QualityTier>().unwrap(), QualityTier::P480);
        assert!("4k".parse::<QualityTier>().is_err());

        assert_eq!(serde_json::to_string(&QualityTier::P720).unwrap(), "\"720p\"");
        let tier: QualityTier = serde_json::from_str("\"480p\"").unwrap();
        assert_eq!(tier, QualityTier::P480);
        assert_eq!(QualityTier::P1080.resolution(), (1920, 1080));
    }

    #[test]
    fn test_endpoint_carries_encoded_token() {
        let now = Utc::now();
        let credential = AccessCredential {
            token: "a+b/c".to_string(),
            kind: CredentialKind::Streaming,
            issued_at: now,
            expires_at: now + Duration::minutes(5),
        };

        let endpoint = StreamEndpoint::build("http://cam/camera/feed", Some(&credential));
        assert_eq!(endpoint.url, "http://cam/camera/feed?token=a%2Bb%2Fc");
        assert_eq!(endpoint.expires_at, Some(credential.expires_at));

        let bare = StreamEndpoint::build("http://cam/camera/feed", None);
        assert_eq!(bare.url, "http://cam/camera/feed");
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let now = Utc::now();
        let credential = AccessCredential {
            token: "secret".to_string(),
            kind: CredentialKind::Bearer,
            issued_at: now,
            expires_at: now,
        };
        assert!(!format!("{:?}", credential).contains("secret"));
        assert!(credential.is_expired_at(now));
    }
}
