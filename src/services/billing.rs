// Simulated billing backend
// Account balance lives in the key-value store so it survives restarts the
// way the real app's wallet survived page reloads.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;
use crate::store::KvStore;

const BALANCE_KEY: &str = "billing:balance_cents";

pub struct BillingService {
    store: Arc<dyn KvStore>,
    latency: Duration,
}

impl BillingService {
    pub fn new(store: Arc<dyn KvStore>, latency_ms: u64) -> Self {
        Self {
            store,
            latency: Duration::from_millis(latency_ms),
        }
    }

    /// Current balance in cents.
    pub async fn balance(&self) -> Result<i64, ApiError> {
        tokio::time::sleep(self.latency).await;
        self.read_balance()
    }

    /// Add funds. Amounts must be positive.
    pub async fn top_up(&self, amount_cents: i64) -> Result<i64, ApiError> {
        tokio::time::sleep(self.latency).await;

        if amount_cents <= 0 {
            return Err(ApiError::with_code(
                400,
                "Top-up amount must be positive",
                "BAD_AMOUNT",
            ));
        }

        let balance = self.read_balance()? + amount_cents;
        self.write_balance(balance)?;
        tracing::info!(amount_cents, balance, "Balance topped up");
        Ok(balance)
    }

    /// Deduct a charge, rejecting with 402 when funds are short.
    pub async fn debit(&self, amount_cents: i64) -> Result<i64, ApiError> {
        tokio::time::sleep(self.latency).await;

        let balance = self.read_balance()?;
        if balance < amount_cents {
            return Err(ApiError::with_code(
                402,
                format!("Insufficient funds: balance {balance}, charge {amount_cents}"),
                "INSUFFICIENT_FUNDS",
            ));
        }

        let balance = balance - amount_cents;
        self.write_balance(balance)?;
        tracing::info!(amount_cents, balance, "Balance debited");
        Ok(balance)
    }

    fn read_balance(&self) -> Result<i64, ApiError> {
        let raw = self
            .store
            .get(BALANCE_KEY)
            .map_err(|e| ApiError::new(500, format!("Balance read failed: {e}")))?;
        Ok(raw.and_then(|value| value.parse().ok()).unwrap_or(0))
    }

    fn write_balance(&self, balance: i64) -> Result<(), ApiError> {
        self.store
            .set(BALANCE_KEY, &balance.to_string())
            .map_err(|e| ApiError::new(500, format!("Balance write failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> BillingService {
        BillingService::new(Arc::new(MemoryStore::new()), 0)
    }

    #[tokio::test]
    async fn test_balance_starts_at_zero() {
        assert_eq!(service().balance().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_top_up_and_debit() {
        let billing = service();
        assert_eq!(billing.top_up(10_000).await.unwrap(), 10_000);
        assert_eq!(billing.debit(2_500).await.unwrap(), 7_500);
        assert_eq!(billing.balance().await.unwrap(), 7_500);
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let billing = service();
        billing.top_up(100).await.unwrap();

        let err = billing.debit(500).await.unwrap_err();
        assert_eq!(err.status, 402);
        assert_eq!(err.code.as_deref(), Some("INSUFFICIENT_FUNDS"));
        // Balance untouched on rejection
        assert_eq!(billing.balance().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_negative_top_up_rejected() {
        let err = service().top_up(-50).await.unwrap_err();
        assert_eq!(err.status, 400);
    }
}
