// yt-dlp based search and audio extraction for YouTube and SoundCloud.
// Uses the yt-dlp subprocess: neither site has a public keyless search API.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::player::track::{Provider, Track};

#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        YtDlpExtractor {
            binary: binary.into(),
        }
    }

    // yt-dlp's search pseudo-URL for a provider
    fn search_prefix(provider: Provider) -> Option<&'static str> {
        match provider {
            Provider::Youtube => Some("ytsearch"),
            Provider::Soundcloud => Some("scsearch"),
            _ => None,
        }
    }

    pub fn page_url(provider: Provider, id: &str) -> Option<String> {
        match provider {
            Provider::Youtube => Some(format!("https://www.youtube.com/watch?v={}", id)),
            Provider::Soundcloud => Some(format!("https://api.soundcloud.com/tracks/{}", id)),
            _ => None,
        }
    }

    pub async fn search(&self, provider: Provider, query: &str, max_results: usize) -> Result<Vec<Track>, String> {
        let prefix = Self::search_prefix(provider)
            .ok_or_else(|| format!("yt-dlp can't search {}", provider))?;

        // Run yt-dlp in a blocking task to avoid blocking the async runtime
        let binary = self.binary.clone();
        let target = format!("{}{}:{}", prefix, max_results, query);

        tokio::task::spawn_blocking(move || {
            let output = Command::new(&binary)
                .arg("--dump-json")
                .arg("--skip-download")
                .arg("--no-playlist")
                .arg(&target)
                .output()
                .map_err(|e| format!("Failed to run {}: {}. Is yt-dlp installed?", binary, e))?;

            if !output.status.success() {
                let error = String::from_utf8_lossy(&output.stderr);
                return Err(format!("yt-dlp search failed: {}", error.trim()));
            }

            let stdout = String::from_utf8(output.stdout).map_err(|e| format!("Invalid UTF-8: {}", e))?;
            parse_search_output(provider, &stdout)
        })
        .await
        .map_err(|e| format!("Task join error: {}", e))?
    }

    // Downloads the best audio stream of `page_url` into `dir` and returns
    // the final file path. Files are named after the track so a second
    // play of the same track can reuse the download.
    pub async fn extract_audio(&self, page_url: &str, dir: &Path, file_stem: &str) -> Result<PathBuf, String> {
        std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;

        let binary = self.binary.clone();
        let page_url = page_url.to_string();
        let template = dir.join(format!("{}.%(ext)s", file_stem));

        tokio::task::spawn_blocking(move || {
            tracing::debug!(%page_url, "Extracting audio with yt-dlp");

            let output = Command::new(&binary)
                .arg("-f")
                .arg("bestaudio[ext=m4a]/bestaudio/best")
                .arg("--no-playlist")
                .arg("--no-progress")
                .arg("-o")
                .arg(&template)
                .arg("--print")
                .arg("after_move:filepath")
                .arg(&page_url)
                .output()
                .map_err(|e| format!("Failed to run {}: {}. Is yt-dlp installed?", binary, e))?;

            if !output.status.success() {
                let error = String::from_utf8_lossy(&output.stderr);
                return Err(format!("yt-dlp failed: {}", error.trim()));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .last()
                .map(PathBuf::from)
                .ok_or_else(|| "yt-dlp did not report an output file".to_string())
        })
        .await
        .map_err(|e| format!("Task join error: {}", e))?
    }
}

// One JSON document per line, as printed by --dump-json
fn parse_search_output(provider: Provider, stdout: &str) -> Result<Vec<Track>, String> {
    let mut results = Vec::new();

    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let json: Value = serde_json::from_str(line).map_err(|e| format!("JSON parse error: {}", e))?;

        let id = match &json["id"] {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };

        // Don't fetch the audio here, it's slow and stream URLs expire.
        // It is extracted on demand when the track is actually played.
        let mut track = Track::new(
            provider,
            id,
            json["title"].as_str().unwrap_or("Unknown"),
            json["uploader"].as_str().unwrap_or("Unknown"),
        );
        track.artwork_url = json["thumbnail"].as_str().map(|s| s.to_string());
        track.duration_seconds = json["duration"].as_f64().map(|d| d.round() as u64);
        results.push(track);
    }

    Ok(results)
}
