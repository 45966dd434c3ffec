// Application configuration
//
// Read from <config dir>/catalog-player/config.json. A missing file means
// defaults; a malformed one is logged and also falls back to defaults so a
// typo never keeps the player from starting.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::player::library::Limits;

pub const APP_DIR_NAME: &str = "catalog-player";
const PROXY_ENV_VAR: &str = "CATALOG_PLAYER_PROXY_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // Results requested per search
    pub search_limit: usize,
    // Base URL of the REST proxy that fronts catalogs needing credentials
    // (Spotify), e.g. "http://localhost:3000"
    pub proxy_base_url: Option<String>,
    pub audius_host: String,
    pub audius_app_name: String,
    pub ytdlp_path: String,
    pub history_limit: usize,
    pub recent_search_limit: usize,
    pub resolve_cache_ttl_secs: u64,
    // Overrides the platform data directory (queue, logs, extracted audio)
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            search_limit: 25,
            proxy_base_url: None,
            audius_host: "https://api.audius.co".to_string(),
            audius_app_name: APP_DIR_NAME.to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            history_limit: 100,
            recent_search_limit: 10,
            resolve_cache_ttl_secs: 3600,
            data_dir: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        let mut config = match config_file_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::warn!("Could not find config directory, using defaults");
                AppConfig::default()
            }
        };

        if let Ok(url) = std::env::var(PROXY_ENV_VAR) {
            if !url.trim().is_empty() {
                config.proxy_base_url = Some(url.trim().to_string());
            }
        }

        config
    }

    pub fn load_from(path: &Path) -> Self {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AppConfig::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config");
                return AppConfig::default();
            }
        };

        serde_json::from_str(&data).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
            AppConfig::default()
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
    }

    pub fn library_dir(&self) -> PathBuf {
        self.data_dir().join("library")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn audio_cache_dir(&self) -> PathBuf {
        self.data_dir().join("audio")
    }

    pub fn limits(&self) -> Limits {
        Limits {
            history: self.history_limit,
            recent_searches: self.recent_search_limit,
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
}
