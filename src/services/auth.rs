// Simulated auth/OTP backend
// Registration, login, and phone verification. Successful flows mint a token
// pair and write it through the session manager, the same way the real
// backend's responses would be stored by the client.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ApiError;
use crate::session::{SessionManager, StoredProfile};

/// OTP challenge issued by `send_otp`. The code is surfaced in the payload
/// because there is no SMS gateway behind the simulation.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Clone)]
struct UserRecord {
    profile: StoredProfile,
    password: String,
    phone_verified: bool,
}

pub struct AuthService {
    sessions: Arc<SessionManager>,
    users: DashMap<String, UserRecord>,
    pending_otps: DashMap<String, String>,
    latency: Duration,
    token_ttl_secs: u64,
}

impl AuthService {
    pub fn new(sessions: Arc<SessionManager>, latency_ms: u64, token_ttl_secs: u64) -> Self {
        Self {
            sessions,
            users: DashMap::new(),
            pending_otps: DashMap::new(),
            latency: Duration::from_millis(latency_ms),
            token_ttl_secs,
        }
    }

    /// Register a new account and start a session for it.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<StoredProfile, ApiError> {
        tokio::time::sleep(self.latency).await;

        if self.users.contains_key(email) {
            return Err(ApiError::with_code(
                409,
                "An account with this email already exists",
                "EMAIL_TAKEN",
            ));
        }

        let profile = StoredProfile {
            user_id: format!("user-{}", Uuid::new_v4()),
            email: email.to_string(),
            display_name: display_name.to_string(),
            phone: None,
        };

        self.users.insert(
            email.to_string(),
            UserRecord {
                profile: profile.clone(),
                password: password.to_string(),
                phone_verified: false,
            },
        );

        self.start_session(&profile).await?;
        tracing::info!(email, "Registered new account");
        Ok(profile)
    }

    /// Authenticate with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<StoredProfile, ApiError> {
        tokio::time::sleep(self.latency).await;

        let record = self
            .users
            .get(email)
            .filter(|record| record.password == password)
            .map(|record| record.value().clone())
            .ok_or_else(|| {
                ApiError::with_code(401, "Invalid email or password", "BAD_CREDENTIALS")
            })?;

        self.start_session(&record.profile).await?;
        tracing::info!(email, "Logged in");
        Ok(record.profile)
    }

    /// Issue an OTP challenge for the given phone number.
    pub async fn send_otp(&self, phone: &str) -> Result<OtpChallenge, ApiError> {
        tokio::time::sleep(self.latency).await;

        // Deterministic-looking 6 digit code from a fresh uuid
        let code = format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000);
        self.pending_otps.insert(phone.to_string(), code.clone());

        tracing::info!(phone, "OTP issued");
        Ok(OtpChallenge {
            phone: phone.to_string(),
            code,
        })
    }

    /// Verify an OTP and attach the phone to the logged-in account.
    pub async fn verify_otp(&self, email: &str, phone: &str, code: &str) -> Result<(), ApiError> {
        tokio::time::sleep(self.latency).await;

        let expected = self
            .pending_otps
            .get(phone)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ApiError::with_code(400, "No OTP pending for this phone", "OTP_MISSING"))?;

        if expected != code {
            return Err(ApiError::with_code(400, "Invalid verification code", "OTP_MISMATCH"));
        }

        self.pending_otps.remove(phone);

        let mut record = self
            .users
            .get_mut(email)
            .ok_or_else(|| ApiError::with_code(404, "Unknown account", "NO_SUCH_USER"))?;
        record.phone_verified = true;
        record.profile.phone = Some(phone.to_string());

        // Keep the cached profile in sync
        let profile = record.profile.clone();
        drop(record);
        self.sessions
            .set_profile(&profile)
            .await
            .map_err(|e| ApiError::new(500, format!("Profile cache write failed: {e}")))?;

        tracing::info!(phone, "Phone verified");
        Ok(())
    }

    /// End the current session.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.sessions
            .clear_tokens()
            .await
            .map_err(|e| ApiError::new(500, format!("Session clear failed: {e}")))
    }

    async fn start_session(&self, profile: &StoredProfile) -> Result<(), ApiError> {
        let access = format!("access-{}", Uuid::new_v4());
        let refresh = format!("refresh-{}", Uuid::new_v4());

        self.sessions
            .set_tokens(access, Some(refresh), self.token_ttl_secs)
            .await
            .map_err(|e| ApiError::new(500, format!("Token store failed: {e}")))?;
        self.sessions
            .set_profile(profile)
            .await
            .map_err(|e| ApiError::new(500, format!("Profile cache write failed: {e}")))?;
        Ok(())
    }
}
