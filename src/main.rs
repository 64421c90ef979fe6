use anyhow::Result;
use std::sync::Arc;

mod config;
mod error;
mod retry;
mod services;
mod session;
mod store;

use retry::RetryClient;
use services::{AdService, AuthService, BillingService, CampaignDraft, MusicService};
use session::{SessionManager, SimulatedRefresher};
use store::{KvStore, MemoryStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::load()?;
    config.validate()?;

    // Initialize logging with the configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    print_startup_banner(&config);

    // Wire up storage, the session core, and the simulated collaborators
    let store: Arc<dyn KvStore> = match config.db_file {
        Some(ref path) => {
            tracing::info!("Using SQLite session store: {}", path.display());
            Arc::new(SqliteStore::open(path)?)
        }
        None => {
            tracing::info!("Using in-memory session store (ephemeral)");
            Arc::new(MemoryStore::new())
        }
    };

    let refresher = Arc::new(SimulatedRefresher::new(
        config.latency_ms,
        config.token_ttl_secs,
    ));
    let sessions = Arc::new(SessionManager::new(store.clone(), refresher)?);
    let retry = RetryClient::new(sessions.clone());

    let auth = AuthService::new(sessions.clone(), config.latency_ms, config.token_ttl_secs);
    let music = MusicService::new(config.latency_ms);
    let billing = Arc::new(BillingService::new(store.clone(), config.latency_ms));
    let ads = AdService::new(store, billing.clone(), config.latency_ms);

    // Log session deaths the way the UI's auth-error listener would
    let mut auth_events = sessions.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = auth_events.recv().await {
            tracing::warn!(
                status = event.status,
                "Auth event: {} - user would be redirected to /login",
                event.message
            );
        }
    });

    // --- scripted demo flow ---

    tracing::info!("Signing up demo advertiser...");
    let profile = match auth
        .register("demo@adsim.dev", "correct-horse", "Demo Advertiser")
        .await
    {
        Ok(profile) => profile,
        Err(err) if err.code.as_deref() == Some("EMAIL_TAKEN") => {
            tracing::info!("Account exists, logging in instead");
            auth.login("demo@adsim.dev", "correct-horse").await?
        }
        Err(err) => return Err(err.into()),
    };
    tracing::info!("Signed in as {} ({})", profile.display_name, profile.email);

    let challenge = auth.send_otp("+15550001111").await?;
    auth.verify_otp(&profile.email, &challenge.phone, &challenge.code)
        .await?;
    tracing::info!("Phone verified via OTP");

    if billing.balance().await? < config.starting_balance_cents {
        billing.top_up(config.starting_balance_cents).await?;
    }
    tracing::info!("Wallet balance: {} cents", billing.balance().await?);

    let hits = retry.execute(|| music.search("neon", true)).await?;
    let track = hits.first().map(|hit| hit.track.clone());
    match track {
        Some(ref track) => {
            tracing::info!("Picked track: {} - {}", track.artist, track.title)
        }
        None => tracing::info!("No licensed track matched, submitting without music"),
    }

    // Invalidate the token mid-flight so the submission exercises the
    // refresh-and-retry path
    ads.fail_next_unauthorized();

    let draft = CampaignDraft {
        name: "Neon Nights Launch".to_string(),
        budget_cents: 25_000,
        track_id: track.map(|t| t.track_id),
        cta_url: "https://example.com/shop".to_string(),
    };
    let campaign = retry.execute(|| ads.submit(draft.clone())).await?;
    tracing::info!(
        "Campaign {} submitted, status {:?}",
        campaign.campaign_id,
        campaign.status
    );

    let approved = ads.approve(&campaign.campaign_id).await?;
    tracing::info!("Campaign approved, status {:?}", approved.status);

    let campaigns = retry.execute(|| ads.list()).await?;
    tracing::info!("{} campaign(s) on record", campaigns.len());
    tracing::info!("Wallet balance after spend: {} cents", billing.balance().await?);

    auth.logout().await?;
    tracing::info!("Logged out, session cleared");

    Ok(())
}

/// Print startup banner
fn print_startup_banner(config: &config::Config) {
    println!();
    println!("  adsim - simulated ad-campaign backend");
    println!("  Version:   {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Storage:   {}",
        config
            .db_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "in-memory".to_string())
    );
    println!("  Token TTL: {}s", config.token_ttl_secs);
    println!("  Latency:   {}ms", config.latency_ms);
    println!();
}
