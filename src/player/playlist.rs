// ==========================================
// PLAYLISTS
// ==========================================
// Named track lists saved in the library. A playlist never plays by itself:
// loading one replaces the queue with a copy of its tracks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlayerError;
use crate::player::track::Track;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tracks: Vec<Track>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    // Duplicate identities in `tracks` are kept once, first occurrence wins
    pub fn new(
        id: String,
        name: &str,
        description: &str,
        tracks: Vec<Track>,
        now: DateTime<Utc>,
    ) -> Result<Self, PlayerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlayerError::InvalidRequest("playlist name is empty".to_string()));
        }

        let mut playlist = Playlist {
            id,
            name: name.to_string(),
            description: description.trim().to_string(),
            tracks: Vec::with_capacity(tracks.len()),
            created_at: now,
            updated_at: now,
        };
        for track in tracks {
            playlist.add(track, now);
        }
        playlist.updated_at = now;
        Ok(playlist)
    }

    // Returns false when the track was already in the playlist
    pub fn add(&mut self, track: Track, now: DateTime<Utc>) -> bool {
        if self.tracks.iter().any(|t| t.same_as(&track)) {
            return false;
        }
        self.tracks.push(track);
        self.updated_at = now;
        true
    }
}
