// Simulated ad-submission backend
// Campaigns are persisted as a JSON array in the key-value store. Submission
// debits the billing balance. A one-shot unauthorized hook lets callers
// simulate upstream token invalidation to exercise the retry wrapper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::KvStore;

use super::billing::BillingService;

const CAMPAIGNS_KEY: &str = "ads:campaigns";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    UnderReview,
    Active,
    Rejected,
}

/// What the UI submits.
#[derive(Debug, Clone)]
pub struct CampaignDraft {
    pub name: String,
    pub budget_cents: i64,
    pub track_id: Option<String>,
    pub cta_url: String,
}

/// What the backend stores and returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub campaign_id: String,
    pub name: String,
    pub budget_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    pub cta_url: String,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

pub struct AdService {
    store: Arc<dyn KvStore>,
    billing: Arc<BillingService>,
    latency: Duration,
    fail_next_unauthorized: AtomicBool,
}

impl AdService {
    pub fn new(store: Arc<dyn KvStore>, billing: Arc<BillingService>, latency_ms: u64) -> Self {
        Self {
            store,
            billing,
            latency: Duration::from_millis(latency_ms),
            fail_next_unauthorized: AtomicBool::new(false),
        }
    }

    /// Make the next call fail with 401, as if the upstream invalidated the
    /// access token out from under us.
    pub fn fail_next_unauthorized(&self) {
        self.fail_next_unauthorized.store(true, Ordering::SeqCst);
    }

    /// Submit a campaign: validate, charge the budget, persist.
    pub async fn submit(&self, draft: CampaignDraft) -> Result<Campaign, ApiError> {
        tokio::time::sleep(self.latency).await;
        self.check_forced_401()?;

        if draft.name.trim().is_empty() {
            return Err(ApiError::with_code(400, "Campaign name is empty", "BAD_NAME"));
        }
        if draft.budget_cents <= 0 {
            return Err(ApiError::with_code(
                400,
                "Campaign budget must be positive",
                "BAD_BUDGET",
            ));
        }

        self.billing.debit(draft.budget_cents).await?;

        let campaign = Campaign {
            campaign_id: format!("cmp-{}", Uuid::new_v4()),
            name: draft.name,
            budget_cents: draft.budget_cents,
            track_id: draft.track_id,
            cta_url: draft.cta_url,
            status: CampaignStatus::UnderReview,
            created_at: Utc::now(),
        };

        let mut campaigns = self.load_campaigns()?;
        campaigns.push(campaign.clone());
        self.save_campaigns(&campaigns)?;

        tracing::info!(campaign_id = %campaign.campaign_id, "Campaign submitted");
        Ok(campaign)
    }

    /// All stored campaigns, newest last.
    pub async fn list(&self) -> Result<Vec<Campaign>, ApiError> {
        tokio::time::sleep(self.latency).await;
        self.check_forced_401()?;
        self.load_campaigns()
    }

    /// Flip a campaign out of review. The simulation approves everything.
    pub async fn approve(&self, campaign_id: &str) -> Result<Campaign, ApiError> {
        tokio::time::sleep(self.latency).await;

        let mut campaigns = self.load_campaigns()?;
        let campaign = campaigns
            .iter_mut()
            .find(|campaign| campaign.campaign_id == campaign_id)
            .ok_or_else(|| ApiError::with_code(404, "Unknown campaign", "NO_SUCH_CAMPAIGN"))?;

        campaign.status = CampaignStatus::Active;
        let approved = campaign.clone();
        self.save_campaigns(&campaigns)?;
        Ok(approved)
    }

    fn check_forced_401(&self) -> Result<(), ApiError> {
        if self.fail_next_unauthorized.swap(false, Ordering::SeqCst) {
            return Err(ApiError::with_code(401, "Access token invalid", "TOKEN_INVALID"));
        }
        Ok(())
    }

    fn load_campaigns(&self) -> Result<Vec<Campaign>, ApiError> {
        let raw = self
            .store
            .get(CAMPAIGNS_KEY)
            .map_err(|e| ApiError::new(500, format!("Campaign read failed: {e}")))?;

        match raw {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| ApiError::new(500, format!("Campaign decode failed: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    fn save_campaigns(&self, campaigns: &[Campaign]) -> Result<(), ApiError> {
        let json = serde_json::to_string(campaigns)
            .map_err(|e| ApiError::new(500, format!("Campaign encode failed: {e}")))?;
        self.store
            .set(CAMPAIGNS_KEY, &json)
            .map_err(|e| ApiError::new(500, format!("Campaign write failed: {e}")))
    }
}
