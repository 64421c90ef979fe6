// Token refresh round trip
// The simulated refresher stands in for the real refresh endpoint: a fixed
// delay, then an unconditionally fresh token pair. Real backends reject stale
// refresh tokens; that path is modeled by `RefreshError::Rejected` and is
// exercised with a rejecting refresher in tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::error::RefreshError;

use super::types::TokenData;

/// The refresh endpoint seam. The session manager calls this with the stored
/// refresh token and persists whatever pair comes back.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenData, RefreshError>;
}

/// Simulated refresh endpoint.
pub struct SimulatedRefresher {
    latency: StdDuration,
    token_ttl_secs: i64,
}

impl SimulatedRefresher {
    pub fn new(latency_ms: u64, token_ttl_secs: u64) -> Self {
        Self {
            latency: StdDuration::from_millis(latency_ms),
            token_ttl_secs: token_ttl_secs as i64,
        }
    }
}

#[async_trait]
impl TokenRefresher for SimulatedRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenData, RefreshError> {
        tracing::debug!("Refreshing access token via simulated endpoint...");
        tokio::time::sleep(self.latency).await;

        let token_data = TokenData {
            access_token: format!("access-{}", Uuid::new_v4()),
            refresh_token: format!("refresh-{}", Uuid::new_v4()),
            expires_at: Utc::now() + Duration::seconds(self.token_ttl_secs),
        };

        tracing::info!(
            "Token refreshed, expires: {}",
            token_data.expires_at.to_rfc3339()
        );

        Ok(token_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_refresh_produces_fresh_pair() {
        let refresher = SimulatedRefresher::new(0, 3600);

        let first = refresher.refresh("refresh-old").await.unwrap();
        let second = refresher.refresh(&first.refresh_token).await.unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert_ne!(first.refresh_token, second.refresh_token);
        assert!(first.expires_at > Utc::now());
    }
}
