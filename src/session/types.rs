// Session types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted session triple. An absent access token means logged out;
/// the other two fields are then ignored regardless of what storage holds.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Token data produced by a refresh round trip.
#[derive(Debug, Clone)]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// User profile cached by the login/registration flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProfile {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Broadcast to the rest of the application when the session dies
/// unrecoverably, so UI-level state can be cleared and the user redirected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub status: u16,
    pub message: String,
}

impl AuthEvent {
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self {
            status: 401,
            message: message.into(),
        }
    }
}
