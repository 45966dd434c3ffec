// Catalog access: searching the six providers and resolving the playable
// reference of a track when search didn't return one.
//
// Both operations hand back 'static futures so callers can run them on a
// background task without holding on to the controller.

pub mod api;
pub mod extractor;

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::error::PlayerError;
use crate::player::track::{PlayableRef, Provider, Track, TrackKey};
use extractor::YtDlpExtractor;

pub trait TrackSource: Send + Sync {
    fn search(&self, provider: Provider, query: String) -> BoxFuture<'static, Result<Vec<Track>, PlayerError>>;

    // Secondary fetch for tracks whose search result had no playable ref
    fn resolve(&self, track: Track) -> BoxFuture<'static, Result<PlayableRef, PlayerError>>;

    // A ref resolved earlier and still fresh, if any
    fn cached(&self, _key: &TrackKey) -> Option<PlayableRef> {
        None
    }
}

// ==========================================
// RESOLVE CACHE
// ==========================================
// Resolved refs expire: stream URLs handed out by the catalogs are signed
// and extracted files can be cleaned up underneath us.
#[derive(Debug)]
pub struct ResolveCache {
    ttl: Duration,
    entries: HashMap<TrackKey, (PlayableRef, DateTime<Utc>)>,
}

impl ResolveCache {
    pub fn new(ttl: Duration) -> Self {
        ResolveCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: TrackKey, playable: PlayableRef, now: DateTime<Utc>) {
        self.entries.insert(key, (playable, now + self.ttl));
    }

    pub fn get(&mut self, key: &TrackKey, now: DateTime<Utc>) -> Option<PlayableRef> {
        let fresh = match self.entries.get(key) {
            Some((PlayableRef::File { path }, _)) if !path.exists() => false,
            Some((_, expires)) => now < *expires,
            None => return None,
        };

        if fresh {
            self.entries.get(key).map(|(playable, _)| playable.clone())
        } else {
            self.entries.remove(key);
            None
        }
    }
}

// ==========================================
// CATALOG CLIENT
// ==========================================
struct CatalogInner {
    http: reqwest::Client,
    extractor: YtDlpExtractor,
    search_limit: usize,
    proxy_base_url: Option<String>,
    audius_host: String,
    audius_app_name: String,
    audio_dir: PathBuf,
    cache: Mutex<ResolveCache>,
}

#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogInner>,
}

impl CatalogClient {
    pub fn new(config: &AppConfig, http: reqwest::Client) -> Self {
        let ttl = Duration::seconds(config.resolve_cache_ttl_secs as i64);

        CatalogClient {
            inner: Arc::new(CatalogInner {
                http,
                extractor: YtDlpExtractor::new(config.ytdlp_path.clone()),
                search_limit: config.search_limit,
                proxy_base_url: config.proxy_base_url.clone(),
                audius_host: config.audius_host.clone(),
                audius_app_name: config.audius_app_name.clone(),
                audio_dir: config.audio_cache_dir(),
                cache: Mutex::new(ResolveCache::new(ttl)),
            }),
        }
    }
}

impl CatalogInner {
    async fn search(&self, provider: Provider, query: &str) -> Result<Vec<Track>, String> {
        let limit = self.search_limit;
        match provider {
            Provider::Itunes => api::search_itunes(&self.http, query, limit).await,
            Provider::Deezer => api::search_deezer(&self.http, query, limit).await,
            Provider::Audius => {
                api::search_audius(&self.http, &self.audius_host, &self.audius_app_name, query, limit).await
            }
            Provider::Youtube | Provider::Soundcloud => self.extractor.search(provider, query, limit).await,
            Provider::Spotify => match &self.proxy_base_url {
                Some(base) => api::search_proxy(&self.http, base, provider, query).await,
                None => Err("Spotify search needs a proxy_base_url in the config".to_string()),
            },
        }
    }

    async fn resolve(&self, track: &Track) -> Result<PlayableRef, String> {
        match track.provider {
            Provider::Audius => Ok(PlayableRef::Stream {
                url: api::audius_stream_url(&self.audius_host, &self.audius_app_name, &track.id),
            }),
            Provider::Spotify => Ok(PlayableRef::Embed {
                url: format!("https://open.spotify.com/track/{}", track.id),
            }),
            Provider::Youtube | Provider::Soundcloud => {
                let page_url = YtDlpExtractor::page_url(track.provider, &track.id)
                    .ok_or_else(|| "no page URL".to_string())?;
                let file_stem = format!("{}-{}", track.provider, sanitize(&track.id));
                let path = self
                    .extractor
                    .extract_audio(&page_url, &self.audio_dir, &file_stem)
                    .await?;
                Ok(PlayableRef::File { path })
            }
            Provider::Itunes | Provider::Deezer => Err("no preview available for this track".to_string()),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, ResolveCache> {
        // A poisoned cache only ever holds plain data, keep using it
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TrackSource for CatalogClient {
    fn search(&self, provider: Provider, query: String) -> BoxFuture<'static, Result<Vec<Track>, PlayerError>> {
        let inner = Arc::clone(&self.inner);

        async move {
            tracing::info!(%provider, %query, "Searching catalog");
            inner.search(provider, &query).await.map_err(|reason| {
                tracing::warn!(%provider, %query, %reason, "Search failed");
                PlayerError::SearchFailed {
                    provider,
                    query: query.clone(),
                    reason,
                }
            })
        }
        .boxed()
    }

    fn resolve(&self, track: Track) -> BoxFuture<'static, Result<PlayableRef, PlayerError>> {
        let inner = Arc::clone(&self.inner);

        async move {
            if let Some(playable) = track.playable.clone() {
                return Ok(playable);
            }
            let key = track.key();
            let cached = inner.cache().get(&key, Utc::now());
            if let Some(playable) = cached {
                return Ok(playable);
            }

            tracing::debug!(track = %key, "Resolving playable reference");
            let playable = inner
                .resolve(&track)
                .await
                .map_err(|reason| PlayerError::not_playable(&track.title, reason))?;

            inner.cache().insert(key, playable.clone(), Utc::now());
            Ok(playable)
        }
        .boxed()
    }

    fn cached(&self, key: &TrackKey) -> Option<PlayableRef> {
        self.inner.cache().get(key, Utc::now())
    }
}

// Track ids end up in file names
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
