// Simulated collaborator services
// Stand-ins for the auth/OTP, music catalog, billing, and ad-submission
// backends. Each one sleeps for a configurable latency and returns either a
// payload or the shared `ApiError` rejection shape.

mod ads;
mod auth;
mod billing;
mod music;

pub use ads::{AdService, Campaign, CampaignDraft, CampaignStatus};
pub use auth::{AuthService, OtpChallenge};
pub use billing::BillingService;
pub use music::{MusicService, Track, TrackMatch};
