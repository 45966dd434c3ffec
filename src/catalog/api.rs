// JSON catalog APIs: iTunes, Deezer and Audius need no credentials.
// Anything that does (Spotify) goes through the REST proxy configured in
// AppConfig::proxy_base_url, which answers with {"tracks": [...]}.

use serde::Deserialize;
use serde_json::Value;

use crate::player::track::{PlayableRef, Provider, Track};

const ITUNES_SEARCH_URL: &str = "https://itunes.apple.com/search";
const DEEZER_SEARCH_URL: &str = "https://api.deezer.com/search";

// ==========================================
// ITUNES
// ==========================================
#[derive(Debug, Deserialize)]
struct ItunesResponse {
    #[serde(default)]
    results: Vec<ItunesTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItunesTrack {
    track_id: Option<u64>,
    track_name: Option<String>,
    artist_name: Option<String>,
    artwork_url100: Option<String>,
    preview_url: Option<String>,
    track_time_millis: Option<u64>,
}

pub async fn search_itunes(http: &reqwest::Client, query: &str, limit: usize) -> Result<Vec<Track>, String> {
    let limit = limit.to_string();
    let response: ItunesResponse = http
        .get(ITUNES_SEARCH_URL)
        .query(&[
            ("term", query),
            ("media", "music"),
            ("entity", "song"),
            ("limit", limit.as_str()),
        ])
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?
        .json()
        .await
        .map_err(|e| e.to_string())?;

    Ok(response.results.into_iter().filter_map(itunes_track).collect())
}

fn itunes_track(item: ItunesTrack) -> Option<Track> {
    let mut track = Track::new(
        Provider::Itunes,
        item.track_id?.to_string(),
        item.track_name?,
        item.artist_name.unwrap_or_default(),
    );
    // 100x100 is tiny, the CDN serves any size from the same path
    track.artwork_url = item.artwork_url100.map(|url| url.replace("100x100", "500x500"));
    track.duration_seconds = item.track_time_millis.map(|ms| ms / 1000);
    track.playable = item.preview_url.map(|url| PlayableRef::Stream { url });
    Some(track)
}

// ==========================================
// DEEZER
// ==========================================
#[derive(Debug, Deserialize)]
struct DeezerResponse {
    data: Option<Vec<DeezerTrack>>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DeezerTrack {
    id: u64,
    title: String,
    #[serde(default)]
    duration: Option<u64>,
    #[serde(default)]
    preview: Option<String>,
    artist: Option<Named>,
    album: Option<DeezerAlbum>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeezerAlbum {
    cover_xl: Option<String>,
    cover_big: Option<String>,
}

pub async fn search_deezer(http: &reqwest::Client, query: &str, limit: usize) -> Result<Vec<Track>, String> {
    let limit = limit.to_string();
    let response: DeezerResponse = http
        .get(DEEZER_SEARCH_URL)
        .query(&[("q", query), ("limit", limit.as_str())])
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?
        .json()
        .await
        .map_err(|e| e.to_string())?;

    deezer_tracks(response)
}

// Deezer reports quota and query errors with a 200 and an "error" object
fn deezer_tracks(response: DeezerResponse) -> Result<Vec<Track>, String> {
    if let Some(error) = response.error {
        let message = error["message"].as_str().unwrap_or("unknown Deezer error");
        return Err(message.to_string());
    }

    Ok(response
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|item| {
            let mut track = Track::new(
                Provider::Deezer,
                item.id.to_string(),
                item.title,
                item.artist.map(|a| a.name).unwrap_or_default(),
            );
            track.artwork_url = item.album.and_then(|a| a.cover_xl.or(a.cover_big));
            track.duration_seconds = item.duration;
            track.playable = item
                .preview
                .filter(|url| !url.is_empty())
                .map(|url| PlayableRef::Stream { url });
            track
        })
        .collect())
}

// ==========================================
// AUDIUS
// ==========================================
#[derive(Debug, Deserialize)]
struct AudiusResponse {
    #[serde(default)]
    data: Vec<AudiusTrack>,
}

#[derive(Debug, Deserialize)]
struct AudiusTrack {
    id: String,
    title: String,
    #[serde(default)]
    duration: Option<u64>,
    user: Option<Named>,
    artwork: Option<AudiusArtwork>,
}

#[derive(Debug, Deserialize)]
struct AudiusArtwork {
    #[serde(rename = "480x480")]
    medium: Option<String>,
    #[serde(rename = "150x150")]
    small: Option<String>,
}

pub async fn search_audius(
    http: &reqwest::Client,
    host: &str,
    app_name: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Track>, String> {
    let url = format!("{}/v1/tracks/search", host.trim_end_matches('/'));
    let limit = limit.to_string();
    let response: AudiusResponse = http
        .get(&url)
        .query(&[("query", query), ("app_name", app_name), ("limit", limit.as_str())])
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?
        .json()
        .await
        .map_err(|e| e.to_string())?;

    Ok(response
        .data
        .into_iter()
        .map(|item| {
            let mut track = Track::new(
                Provider::Audius,
                item.id,
                item.title,
                item.user.map(|u| u.name).unwrap_or_default(),
            );
            track.artwork_url = item.artwork.and_then(|a| a.medium.or(a.small));
            track.duration_seconds = item.duration;
            track
        })
        .collect())
}

pub fn audius_stream_url(host: &str, app_name: &str, id: &str) -> String {
    format!(
        "{}/v1/tracks/{}/stream?app_name={}",
        host.trim_end_matches('/'),
        id,
        app_name
    )
}

// ==========================================
// REST PROXY
// ==========================================
pub async fn search_proxy(
    http: &reqwest::Client,
    base_url: &str,
    provider: Provider,
    query: &str,
) -> Result<Vec<Track>, String> {
    let url = format!("{}/api/{}/search", base_url.trim_end_matches('/'), provider);
    let body: Value = http
        .get(&url)
        .query(&[("q", query)])
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?
        .json()
        .await
        .map_err(|e| e.to_string())?;

    proxy_tracks(provider, &body)
}

// The proxy reshapes every catalog into one loose format: ids may be numbers,
// the playable link may be called preview, preview_url or stream_url.
fn proxy_tracks(provider: Provider, body: &Value) -> Result<Vec<Track>, String> {
    if body["success"] == Value::Bool(false) {
        let message = body["error"].as_str().unwrap_or("proxy reported a failure");
        return Err(message.to_string());
    }

    let items = body["tracks"]
        .as_array()
        .ok_or_else(|| "proxy response has no tracks".to_string())?;

    Ok(items
        .iter()
        .filter_map(|item| {
            let id = match &item["id"] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let mut track = Track::new(
                provider,
                id,
                item["title"].as_str().unwrap_or("Unknown"),
                item["artist"].as_str().unwrap_or_default(),
            );
            track.artwork_url = item["thumbnail"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            track.duration_seconds = item["duration"].as_u64();

            // Spotify previews are plain mp3 but the backend for Spotify is the
            // external player, so only the page is kept for it
            if provider != Provider::Spotify {
                track.playable = ["preview", "preview_url", "stream_url"]
                    .iter()
                    .find_map(|field| item[*field].as_str())
                    .filter(|url| !url.is_empty())
                    .map(|url| PlayableRef::Stream { url: url.to_string() });
            }
            Some(track)
        })
        .collect())
}
