//! Session event types
//!
//! Discrete happenings published on the [`super::EventBus`]. Continuous state
//! lives in the controller's watch channel; these are the edges.

use serde::{Deserialize, Serialize};

use crate::session::{ConnectionState, QualityTier};

/// Event published by the session controller and its collaborators
///
/// Serialized as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum SessionEvent {
    /// Connection state moved from one value to another
    #[serde(rename = "session.state_changed")]
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A reconnect attempt has been armed
    #[serde(rename = "session.reconnect_scheduled")]
    ReconnectScheduled {
        /// Consecutive failures so far
        attempt: u32,
        delay_ms: u64,
    },

    /// The stream endpoint now carries a fresh credential
    #[serde(rename = "session.token_renewed")]
    TokenRenewed {
        /// `true` when the primary bearer token stands in for a streaming token
        fallback: bool,
    },

    /// Credential renewal failed; the session stays up
    #[serde(rename = "session.token_renewal_failed")]
    TokenRenewalFailed { error: String },

    #[serde(rename = "session.quality_changed")]
    QualityChanged { quality: QualityTier },

    /// Latency probe result while connected
    #[serde(rename = "session.latency")]
    LatencyMeasured { latency_ms: i64 },

    #[serde(rename = "session.snapshot_taken")]
    SnapshotTaken { id: String, bytes: usize },

    /// Best-effort stop command failed during disconnect
    #[serde(rename = "session.stop_failed")]
    StopFailed { error: String },

    #[serde(rename = "session.recording")]
    RecordingChanged { recording: bool },

    #[serde(rename = "auth.changed")]
    AuthChanged {
        authenticated: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
}

impl SessionEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "session.state_changed",
            Self::ReconnectScheduled { .. } => "session.reconnect_scheduled",
            Self::TokenRenewed { .. } => "session.token_renewed",
            Self::TokenRenewalFailed { .. } => "session.token_renewal_failed",
            Self::QualityChanged { .. } => "session.quality_changed",
            Self::LatencyMeasured { .. } => "session.latency",
            Self::SnapshotTaken { .. } => "session.snapshot_taken",
            Self::StopFailed { .. } => "session.stop_failed",
            Self::RecordingChanged { .. } => "session.recording",
            Self::AuthChanged { .. } => "auth.changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let event = SessionEvent::StateChanged {
            from: ConnectionState::Connecting,
            to: ConnectionState::Connected,
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "session.state_changed");
        assert_eq!(json["data"]["to"], "connected");
        assert!(json["data"].get("error").is_none());
        assert_eq!(event.event_name(), "session.state_changed");

        let event = SessionEvent::QualityChanged {
            quality: QualityTier::P1080,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"session.quality_changed","data":{"quality":"1080p"}}"#
        );
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
