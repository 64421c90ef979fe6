use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::error::RefreshError;
use crate::store::{keys, KvStore};

use super::refresh::TokenRefresher;
use super::types::{AuthEvent, Session, StoredProfile};

/// Default access token lifetime when the caller does not specify one.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

const AUTH_EVENT_CAPACITY: usize = 16;

/// Session manager
/// Single source of truth for the access/refresh token pair and its expiry.
/// Owns the persistence keys under `auth:` exclusively and collapses
/// concurrent refreshes into a single round trip.
pub struct SessionManager {
    /// Durable key-value storage (stand-in for localStorage)
    store: Arc<dyn KvStore>,

    /// Refresh endpoint seam
    refresher: Arc<dyn TokenRefresher>,

    /// Current session triple
    session: Arc<RwLock<Session>>,

    /// Serializes refresh round trips
    refresh_lock: Mutex<()>,

    /// Bumped after every completed refresh; waiters that queued behind an
    /// in-flight refresh use this to detect they can reuse its result
    refresh_epoch: AtomicU64,

    /// Auth-error fanout to the rest of the application
    events: broadcast::Sender<AuthEvent>,
}

impl SessionManager {
    /// Create a manager over the given store, hydrating any persisted session.
    pub fn new(store: Arc<dyn KvStore>, refresher: Arc<dyn TokenRefresher>) -> Result<Self> {
        let session = load_session(store.as_ref())?;
        if session.is_logged_in() {
            tracing::info!("Restored persisted session from storage");
        }

        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Ok(Self {
            store,
            refresher,
            session: Arc::new(RwLock::new(session)),
            refresh_lock: Mutex::new(()),
            refresh_epoch: AtomicU64::new(0),
            events,
        })
    }

    /// Store a new token pair, deriving expiry as `now + expires_in_secs`.
    /// A `None` refresh token leaves any previously stored one in place.
    pub async fn set_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: u64,
    ) -> Result<()> {
        let expires_at = Utc::now() + Duration::seconds(expires_in_secs as i64);
        self.persist_tokens(access_token, refresh_token, expires_at)
            .await
    }

    /// `set_tokens` with the default one-hour lifetime.
    pub async fn set_tokens_default(
        &self,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<()> {
        self.set_tokens(access_token, refresh_token, DEFAULT_TOKEN_TTL_SECS)
            .await
    }

    /// Current access token, if any. Deliberately does not check expiry;
    /// callers that care use `is_token_expired`.
    pub async fn access_token(&self) -> Option<String> {
        self.session.read().await.access_token.clone()
    }

    /// True when no expiry is recorded or the recorded expiry has passed.
    /// An absent session reads as expired (fail closed).
    pub async fn is_token_expired(&self) -> bool {
        let session = self.session.read().await;
        match session.expires_at {
            None => true,
            Some(exp) => Utc::now() > exp,
        }
    }

    /// Drop the whole session: both tokens, the expiry, and the cached
    /// profile. Partial clears are not a valid state.
    pub async fn clear_tokens(&self) -> Result<()> {
        {
            let mut session = self.session.write().await;
            *session = Session::default();
        }

        self.store.remove(keys::ACCESS_TOKEN)?;
        self.store.remove(keys::EXPIRES_AT)?;
        self.store.remove(keys::REFRESH_TOKEN)?;
        self.store.remove(keys::USER_PROFILE)?;

        tracing::info!("Session cleared");
        Ok(())
    }

    /// Obtain a fresh access token from the refresh endpoint.
    ///
    /// Concurrent callers collapse into one round trip: whoever holds the
    /// refresh lock performs it, and waiters that queued behind an in-flight
    /// refresh return its result instead of racing their own.
    pub async fn refresh_access_token(&self) -> Result<String, RefreshError> {
        let epoch_before = self.refresh_epoch.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.refresh_epoch.load(Ordering::Acquire) != epoch_before {
            if let Some(token) = self.access_token().await {
                tracing::debug!("Reusing token from refresh completed while waiting");
                return Ok(token);
            }
        }

        let refresh_token = {
            let session = self.session.read().await;
            session.refresh_token.clone()
        }
        .ok_or(RefreshError::NoRefreshToken)?;

        let token_data = self.refresher.refresh(&refresh_token).await?;
        let access_token = token_data.access_token.clone();

        self.persist_tokens(
            token_data.access_token,
            Some(token_data.refresh_token),
            token_data.expires_at,
        )
        .await?;

        self.refresh_epoch.fetch_add(1, Ordering::AcqRel);
        Ok(access_token)
    }

    /// Cache the user profile written by the login/registration flows.
    pub async fn set_profile(&self, profile: &StoredProfile) -> Result<()> {
        let json = serde_json::to_string(profile).context("Failed to encode user profile")?;
        self.store.set(keys::USER_PROFILE, &json)?;
        Ok(())
    }

    /// Cached user profile, if any.
    pub async fn profile(&self) -> Result<Option<StoredProfile>> {
        match self.store.get(keys::USER_PROFILE)? {
            Some(json) => {
                let profile =
                    serde_json::from_str(&json).context("Failed to decode user profile")?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Subscribe to auth-error notifications (unrecoverable session expiry).
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Publish an auth event to all subscribers. Lagging or absent
    /// subscribers are not an error.
    pub fn emit_auth_event(&self, event: AuthEvent) {
        let receivers = self.events.receiver_count();
        if self.events.send(event).is_err() {
            tracing::debug!(receivers, "Auth event dropped, no subscribers");
        }
    }

    /// Force the recorded expiry, bypassing the `now + ttl` derivation.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn force_expiry(&self, expires_at: DateTime<Utc>) {
        let mut session = self.session.write().await;
        session.expires_at = Some(expires_at);
    }

    async fn persist_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.store.set(keys::ACCESS_TOKEN, &access_token)?;
        self.store
            .set(keys::EXPIRES_AT, &expires_at.timestamp_millis().to_string())?;
        if let Some(ref refresh) = refresh_token {
            self.store.set(keys::REFRESH_TOKEN, refresh)?;
        }

        let mut session = self.session.write().await;
        session.access_token = Some(access_token);
        session.expires_at = Some(expires_at);
        if refresh_token.is_some() {
            session.refresh_token = refresh_token;
        }

        Ok(())
    }
}

/// Hydrate the session triple from storage. An absent access token means
/// logged out; the other fields are then ignored even if present.
fn load_session(store: &dyn KvStore) -> Result<Session> {
    let access_token = store.get(keys::ACCESS_TOKEN)?;
    if access_token.is_none() {
        return Ok(Session::default());
    }

    let refresh_token = store.get(keys::REFRESH_TOKEN)?;
    let expires_at = store
        .get(keys::EXPIRES_AT)?
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single());

    Ok(Session {
        access_token,
        refresh_token,
        expires_at,
    })
}
