// ==========================================
// PERSISTED LIBRARY
// ==========================================
// Everything that survives a restart: the queue, shuffle/repeat/volume,
// liked tracks, playlists, play history, recent searches and the total
// listening time.
//
// Each part lives under its own storage key so one damaged entry only resets
// that part. A part that fails to deserialize or validate is treated as
// StorageCorrupt: logged, then replaced with its empty default.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PlayerError;
use crate::player::playlist::Playlist;
use crate::player::queue::{Queue, RepeatMode};
use crate::player::track::{Track, TrackKey};
use crate::storage::KeyValueStore;

const QUEUE_KEY: &str = "queue";
const SETTINGS_KEY: &str = "settings";
const LIKED_KEY: &str = "liked";
const HISTORY_KEY: &str = "history";
const RECENT_SEARCHES_KEY: &str = "recent_searches";
const PLAYLISTS_KEY: &str = "playlists";
const LISTENING_TIME_KEY: &str = "listening_time";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub volume: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            shuffle: false,
            repeat: RepeatMode::Off,
            volume: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub track: Track,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub history: usize,
    pub recent_searches: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            history: 100,
            recent_searches: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    pub queue: Queue,
    pub settings: Settings,
    pub liked: Vec<Track>,
    pub history: Vec<HistoryEntry>,
    pub recent_searches: Vec<String>,
    pub playlists: Vec<Playlist>,
    // Seconds of audio actually played, across all sessions
    pub listening_secs: u64,
}

impl Library {
    // Rehydrates every part, substituting defaults for missing or corrupt ones
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        let queue = load_part::<Queue, _>(store, QUEUE_KEY).and_then(|queue| {
            queue
                .map(Queue::validated)
                .transpose()
                .map_err(|reason| PlayerError::StorageCorrupt {
                    key: QUEUE_KEY.to_string(),
                    reason,
                })
        });

        Library {
            queue: or_default(queue),
            settings: or_default(load_part(store, SETTINGS_KEY)),
            liked: or_default(load_part(store, LIKED_KEY)),
            history: or_default(load_part(store, HISTORY_KEY)),
            recent_searches: or_default(load_part(store, RECENT_SEARCHES_KEY)),
            playlists: or_default(load_part(store, PLAYLISTS_KEY)),
            listening_secs: or_default(load_part(store, LISTENING_TIME_KEY)),
        }
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), PlayerError> {
        store.set(QUEUE_KEY, serde_json::to_value(&self.queue)?)?;
        store.set(SETTINGS_KEY, serde_json::to_value(self.settings)?)?;
        store.set(LIKED_KEY, serde_json::to_value(&self.liked)?)?;
        store.set(HISTORY_KEY, serde_json::to_value(&self.history)?)?;
        store.set(RECENT_SEARCHES_KEY, serde_json::to_value(&self.recent_searches)?)?;
        store.set(PLAYLISTS_KEY, serde_json::to_value(&self.playlists)?)?;
        store.set(LISTENING_TIME_KEY, serde_json::to_value(self.listening_secs)?)?;
        Ok(())
    }

    pub fn is_liked(&self, key: &TrackKey) -> bool {
        self.liked.iter().any(|t| t.key() == *key)
    }

    // Returns true when the track ended up liked
    pub fn toggle_liked(&mut self, track: &Track) -> bool {
        if let Some(pos) = self.liked.iter().position(|t| t.same_as(track)) {
            self.liked.remove(pos);
            false
        } else {
            self.liked.push(track.clone());
            true
        }
    }

    // Newest first, oldest dropped past the limit
    pub fn record_play(&mut self, track: &Track, played_at: DateTime<Utc>, limit: usize) {
        self.history.insert(
            0,
            HistoryEntry {
                track: track.clone(),
                played_at,
            },
        );
        self.history.truncate(limit);
    }

    // Moves a repeated query to the front instead of listing it twice
    pub fn record_search(&mut self, query: &str, limit: usize) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.recent_searches.retain(|q| q != query);
        self.recent_searches.insert(0, query.to_string());
        self.recent_searches.truncate(limit);
    }

    // ==========================================
    // PLAYLISTS
    // ==========================================
    // Returns the id of the new playlist
    pub fn create_playlist(
        &mut self,
        name: &str,
        description: &str,
        tracks: Vec<Track>,
        now: DateTime<Utc>,
    ) -> Result<String, PlayerError> {
        let id = self.unused_playlist_id(now);
        let playlist = Playlist::new(id.clone(), name, description, tracks, now)?;
        self.playlists.push(playlist);
        Ok(id)
    }

    pub fn playlist(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    pub fn delete_playlist(&mut self, id: &str) -> Result<Playlist, PlayerError> {
        let pos = self
            .playlists
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PlayerError::PlaylistNotFound(id.to_string()))?;
        Ok(self.playlists.remove(pos))
    }

    // Returns false when the track was already in the playlist
    pub fn add_to_playlist(&mut self, id: &str, track: Track, now: DateTime<Utc>) -> Result<bool, PlayerError> {
        let playlist = self
            .playlists
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PlayerError::PlaylistNotFound(id.to_string()))?;
        Ok(playlist.add(track, now))
    }

    // Creation time in milliseconds, suffixed when two land in the same one
    fn unused_playlist_id(&self, now: DateTime<Utc>) -> String {
        let base = format!("pl{}", now.timestamp_millis());
        let mut id = base.clone();
        let mut n = 1;
        while self.playlist(&id).is_some() {
            id = format!("{}-{}", base, n);
            n += 1;
        }
        id
    }
}

fn load_part<T: DeserializeOwned, S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Result<Option<T>, PlayerError> {
    match store.get(key) {
        None => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| PlayerError::StorageCorrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

fn or_default<T: Default>(part: Result<Option<T>, PlayerError>) -> T {
    match part {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding stored state");
            T::default()
        }
    }
}
