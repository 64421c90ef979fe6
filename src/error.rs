// Error handling module
// Defines the error taxonomy for the session core and the simulated services

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path the UI is advised to redirect to when a session dies.
pub const LOGIN_REDIRECT: &str = "/login";

/// Rejection shape shared by every simulated collaborator
/// (auth, OTP, music catalog, billing, ad submission).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("API error {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(status: u16, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Whether this rejection should trigger the refresh-and-retry path.
    /// Status 401 is the sole signal; a "401" substring in the message is
    /// accepted for collaborators that only surface stringly-typed errors.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401 || self.message.contains("401")
    }
}

/// Failures of the token refresh round trip.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// Refresh attempted with no stored refresh token
    #[error("No refresh token stored")]
    NoRefreshToken,

    /// The refresh endpoint rejected the stored refresh token
    #[error("Refresh rejected: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// Underlying key-value store failed
    #[error("Session storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Errors surfaced by `RetryClient::execute`.
#[derive(Error, Debug)]
pub enum RequestError {
    /// Terminal session death. The session has been cleared; the redirect
    /// hint is advisory for the UI layer.
    #[error("Session expired ({status}), redirect to {redirect_to}")]
    SessionExpired { status: u16, redirect_to: &'static str },

    /// Any non-401 collaborator rejection, passed through verbatim
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl RequestError {
    pub fn session_expired() -> Self {
        Self::SessionExpired {
            status: 401,
            redirect_to: LOGIN_REDIRECT,
        }
    }
}
