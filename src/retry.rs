// Retry-once-on-401 request wrapper
// Gives callers an at-most-one-retry policy around any async unit of work
// that can fail because the access token expired or was invalidated.

use std::future::Future;
use std::sync::Arc;

use crate::error::{ApiError, RequestError};
use crate::session::{AuthEvent, SessionManager};

/// Wraps arbitrary async operations with the session refresh policy:
/// refresh up front when the token is already expired, and exactly one
/// refresh-and-retry when the operation itself comes back with a 401.
/// There is no backoff; the single retry is always immediate.
pub struct RetryClient {
    sessions: Arc<SessionManager>,
}

impl RetryClient {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Run `operation`, refreshing the session as needed.
    ///
    /// Guarantees per call: at most one refresh attempt and at most one
    /// retry of `operation`, strictly in sequence. A failed refresh clears
    /// the session, notifies subscribers, and surfaces `SessionExpired`;
    /// non-401 operation errors pass through untouched.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if self.sessions.is_token_expired().await {
            tracing::debug!("Token expired before request, refreshing...");
            if let Err(e) = self.sessions.refresh_access_token().await {
                tracing::warn!("Pre-request refresh failed: {e}");
                return Err(self.fail_session().await);
            }
        }

        match operation().await {
            Ok(value) => Ok(value),
            Err(err) if err.is_unauthorized() => {
                tracing::warn!(status = err.status, "Request unauthorized, refreshing and retrying once...");
                if let Err(e) = self.sessions.refresh_access_token().await {
                    tracing::warn!("Refresh after 401 failed: {e}");
                    return Err(self.fail_session().await);
                }

                // Second outcome is final, even another 401
                operation().await.map_err(RequestError::Api)
            }
            Err(err) => Err(RequestError::Api(err)),
        }
    }

    /// Terminal session death: clear everything, tell the application, and
    /// hand the caller the redirect hint.
    async fn fail_session(&self) -> RequestError {
        if let Err(e) = self.sessions.clear_tokens().await {
            tracing::error!("Failed to clear session after refresh failure: {e}");
        }
        self.sessions
            .emit_auth_event(AuthEvent::session_expired("Session expired"));
        RequestError::session_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SimulatedRefresher;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client_with_session() -> (RetryClient, Arc<SessionManager>) {
        let sessions = Arc::new(
            SessionManager::new(
                Arc::new(MemoryStore::new()),
                Arc::new(SimulatedRefresher::new(0, 3600)),
            )
            .unwrap(),
        );
        (RetryClient::new(sessions.clone()), sessions)
    }

    #[tokio::test]
    async fn test_valid_token_success_invokes_once() {
        let (client, sessions) = client_with_session();
        sessions
            .set_tokens_default("tok".to_string(), Some("refresh".to_string()))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = client
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // No refresh happened: token unchanged
        assert_eq!(sessions.access_token().await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_before_invoking() {
        let (client, sessions) = client_with_session();
        sessions
            .set_tokens_default("stale".to_string(), Some("refresh".to_string()))
            .await
            .unwrap();
        sessions.force_expiry(Utc::now() - Duration::seconds(1)).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = client
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>("payload")
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "payload");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_ne!(sessions.access_token().await.as_deref(), Some("stale"));
        assert!(!sessions.is_token_expired().await);
    }

    #[tokio::test]
    async fn test_401_triggers_single_refresh_and_retry() {
        let (client, sessions) = client_with_session();
        sessions
            .set_tokens_default("tok".to_string(), Some("refresh".to_string()))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = client
            .execute(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ApiError::new(401, "Unauthorized"))
                    } else {
                        Ok("second try")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "second try");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_401_is_final() {
        let (client, sessions) = client_with_session();
        sessions
            .set_tokens_default("tok".to_string(), Some("refresh".to_string()))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let err = client
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::new(401, "Unauthorized"))
                }
            })
            .await
            .unwrap_err();

        // Exactly two invocations, then the second 401 passes through
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match err {
            RequestError::Api(api) => assert_eq!(api.status, 401),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session_without_invoking_op() {
        // No refresh token stored, token never set: expired and unrefreshable
        let (client, sessions) = client_with_session();
        let mut events = sessions.subscribe();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let err = client
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(())
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            err,
            RequestError::SessionExpired {
                status: 401,
                redirect_to: "/login"
            }
        ));
        assert_eq!(sessions.access_token().await, None);
        assert!(sessions.is_token_expired().await);

        let event = events.recv().await.unwrap();
        assert_eq!(event.status, 401);
    }

    #[tokio::test]
    async fn test_non_401_passes_through_without_refresh() {
        let (client, sessions) = client_with_session();
        sessions
            .set_tokens_default("tok".to_string(), Some("refresh".to_string()))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let err = client
            .execute(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::new(500, "Server error"))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            RequestError::Api(api) => {
                assert_eq!(api.status, 500);
                assert_eq!(api.message, "Server error");
            }
            other => panic!("unexpected error: {other}"),
        }
        // Token untouched
        assert_eq!(sessions.access_token().await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_message_containing_401_triggers_retry() {
        let (client, sessions) = client_with_session();
        sessions
            .set_tokens_default("tok".to_string(), Some("refresh".to_string()))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = client
            .execute(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ApiError::new(500, "upstream returned 401"))
                    } else {
                        Ok(1)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
