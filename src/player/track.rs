// ==========================================
// TRACK MODEL
// ==========================================
// A Track is one search result or queue entry from any of the supported
// catalogs.
//
// Track ids are only unique inside their own catalog (Deezer and iTunes both
// hand out plain numbers), so queue identity is always the (provider, id)
// pair, see TrackKey.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ==========================================
// PROVIDER ENUM
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Youtube,
    Spotify,
    Soundcloud,
    Itunes,
    Deezer,
    Audius,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::Youtube,
        Provider::Spotify,
        Provider::Soundcloud,
        Provider::Itunes,
        Provider::Deezer,
        Provider::Audius,
    ];

    // Which playback backend family renders this provider's tracks.
    //
    // Spotify only hands out embeddable pages, everything else ends up as a
    // decodable stream or file (YouTube and SoundCloud after yt-dlp extraction).
    pub fn backend_kind(self) -> BackendKind {
        match self {
            Provider::Spotify => BackendKind::External,
            Provider::Youtube
            | Provider::Soundcloud
            | Provider::Itunes
            | Provider::Deezer
            | Provider::Audius => BackendKind::NativeAudio,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Provider::Youtube => "YouTube",
            Provider::Spotify => "Spotify",
            Provider::Soundcloud => "SoundCloud",
            Provider::Itunes => "iTunes",
            Provider::Deezer => "Deezer",
            Provider::Audius => "Audius",
        }
    }

    // Cycle used by the UI provider switcher
    pub fn next(self) -> Provider {
        let pos = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(pos + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Youtube => "youtube",
            Provider::Spotify => "spotify",
            Provider::Soundcloud => "soundcloud",
            Provider::Itunes => "itunes",
            Provider::Deezer => "deezer",
            Provider::Audius => "audius",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    NativeAudio, // rodio sink fed from a stream or a local file
    External,    // handed to the system browser / desktop app
}

// ==========================================
// PLAYABLE REFERENCE
// ==========================================
// The provider specific locator needed to actually start playback.
// Some catalogs return it with the search result (iTunes and Deezer
// previews), others need a second call when the track is played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlayableRef {
    Stream { url: String },
    File { path: PathBuf },
    Embed { url: String },
}

// ==========================================
// TRACK KEY
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    pub provider: Provider,
    pub id: String,
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}

// ==========================================
// TRACK STRUCT
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub provider: Provider,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    // None means deferred: resolved lazily when the track is played
    #[serde(default)]
    pub playable: Option<PlayableRef>,
}

impl Track {
    pub fn new(provider: Provider, id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Track {
            id: id.into(),
            provider,
            title: title.into(),
            artist: artist.into(),
            artwork_url: None,
            duration_seconds: None,
            playable: None,
        }
    }

    pub fn key(&self) -> TrackKey {
        TrackKey {
            provider: self.provider,
            id: self.id.clone(),
        }
    }

    pub fn same_as(&self, other: &Track) -> bool {
        self.provider == other.provider && self.id == other.id
    }

    pub fn display_name(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

// Builders for test fixtures
#[cfg(test)]
impl Track {
    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_playable(mut self, playable: PlayableRef) -> Self {
        self.playable = Some(playable);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_includes_provider() {
        let deezer = Track::new(Provider::Deezer, "3135556", "Harder", "Daft Punk");
        let itunes = Track::new(Provider::Itunes, "3135556", "Harder", "Daft Punk");
        assert!(!deezer.same_as(&itunes));
        assert_ne!(deezer.key(), itunes.key());
        assert!(deezer.same_as(&deezer.clone().with_duration(224)));
    }

    #[test]
    fn spotify_is_the_only_external_provider() {
        for provider in Provider::ALL {
            let expected = if provider == Provider::Spotify {
                BackendKind::External
            } else {
                BackendKind::NativeAudio
            };
            assert_eq!(provider.backend_kind(), expected, "{}", provider);
        }
    }

    #[test]
    fn provider_cycle_visits_every_catalog() {
        let mut provider = Provider::Youtube;
        for _ in 0..Provider::ALL.len() {
            provider = provider.next();
        }
        assert_eq!(provider, Provider::Youtube);
    }

    #[test]
    fn deferred_tracks_deserialize_without_playable() {
        let json = r#"{"id":"abc","provider":"audius","title":"T","artist":"A"}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.playable, None);
        assert_eq!(track.provider, Provider::Audius);
    }
}
