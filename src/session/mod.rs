// Session module
// Token lifecycle, refresh round trip, and session types

mod manager;
mod refresh;
mod types;

pub use manager::{SessionManager, DEFAULT_TOKEN_TTL_SECS};
pub use refresh::{SimulatedRefresher, TokenRefresher};
pub use types::{AuthEvent, Session, StoredProfile, TokenData};
