// Error taxonomy for the player core.
//
// Every variant except StorageCorrupt ends up on the status line.
// StorageCorrupt is logged and replaced with defaults when the library is
// loaded.

use thiserror::Error;

use crate::player::track::Provider;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlayerError {
    #[error("{provider} search for \"{query}\" failed: {reason}")]
    SearchFailed {
        provider: Provider,
        query: String,
        reason: String,
    },

    #[error("\"{title}\" is not playable: {reason}")]
    NotPlayable { title: String, reason: String },

    #[error("playback error: {0}")]
    PlaybackError(String),

    #[error("queue index {index} out of range (queue has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no playlist with id {0}")]
    PlaylistNotFound(String),

    // Rejected before touching anything: blank names, saving an empty queue
    #[error("{0}")]
    InvalidRequest(String),

    #[error("stored \"{key}\" entry is corrupt: {reason}")]
    StorageCorrupt { key: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl PlayerError {
    pub fn not_playable(title: &str, reason: impl ToString) -> Self {
        PlayerError::NotPlayable {
            title: title.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for PlayerError {
    fn from(err: std::io::Error) -> Self {
        PlayerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::Storage(err.to_string())
    }
}
