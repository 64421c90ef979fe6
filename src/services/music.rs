// Simulated music catalog
// Fixed track list with fuzzy search, standing in for the licensed-music
// lookup backend.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub duration_secs: u32,
    pub licensed_for_ads: bool,
}

/// A catalog hit with its fuzzy match score (higher is better).
#[derive(Debug, Clone)]
pub struct TrackMatch {
    pub track: Track,
    pub score: i64,
}

static CATALOG: Lazy<Vec<Track>> = Lazy::new(|| {
    let seed = [
        ("trk-001", "Neon Nights", "Velvet Arcade", 214, true),
        ("trk-002", "Golden Hour Drive", "Mara Lin", 187, true),
        ("trk-003", "Static Bloom", "The Wavelengths", 243, false),
        ("trk-004", "Sugar Rush Anthem", "Pop Circuit", 172, true),
        ("trk-005", "Midnight Market", "DJ Hanoi", 198, true),
        ("trk-006", "Paper Planes Home", "Aiko & Friends", 225, false),
        ("trk-007", "Bassline Summer", "Low Theory", 204, true),
        ("trk-008", "Citrus Sky", "Mara Lin", 179, true),
    ];

    seed.into_iter()
        .map(|(id, title, artist, duration, licensed)| Track {
            track_id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            duration_secs: duration,
            licensed_for_ads: licensed,
        })
        .collect()
});

pub struct MusicService {
    matcher: SkimMatcherV2,
    latency: Duration,
}

impl MusicService {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            matcher: SkimMatcherV2::default(),
            latency: Duration::from_millis(latency_ms),
        }
    }

    /// Fuzzy-search the catalog by title and artist, best matches first.
    pub async fn search(
        &self,
        query: &str,
        licensed_only: bool,
    ) -> Result<Vec<TrackMatch>, ApiError> {
        tokio::time::sleep(self.latency).await;

        if query.trim().is_empty() {
            return Err(ApiError::with_code(400, "Search query is empty", "EMPTY_QUERY"));
        }

        let mut matches: Vec<TrackMatch> = CATALOG
            .iter()
            .filter(|track| !licensed_only || track.licensed_for_ads)
            .filter_map(|track| {
                let haystack = format!("{} {}", track.title, track.artist);
                self.matcher
                    .fuzzy_match(&haystack, query)
                    .map(|score| TrackMatch {
                        track: track.clone(),
                        score,
                    })
            })
            .collect();

        matches.sort_by(|a, b| b.score.cmp(&a.score));
        tracing::debug!(query, hits = matches.len(), "Catalog search");
        Ok(matches)
    }

    /// Look up a single track by id.
    pub async fn get(&self, track_id: &str) -> Result<Track, ApiError> {
        tokio::time::sleep(self.latency).await;

        CATALOG
            .iter()
            .find(|track| track.track_id == track_id)
            .cloned()
            .ok_or_else(|| ApiError::with_code(404, "Unknown track", "NO_SUCH_TRACK"))
    }
}
