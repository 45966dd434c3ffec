// Main entry point for the catalog player
// This is where the application starts: config, logging, storage, backends,
// then the TUI event loop.

mod catalog;
mod config;
mod error;
mod logging;
mod player;
mod storage;
mod ui;

use anyhow::Context;
use std::sync::Arc;

use catalog::CatalogClient;
use config::AppConfig;
use player::audio::NativeAudioBackend;
use player::backend::{event_channel, BackendSet};
use player::controller::PlaybackController;
use player::external::ExternalBackend;
use player::track::BackendKind;
use storage::{JsonFileStore, KeyValueStore, MemoryStore};
use ui::app::MusicPlayerApp;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Suppress ALSA error messages that pollute TUI
    // These are non-critical audio buffer warnings from the audio system
    std::env::set_var("ALSA_PCM_NO_MMAP", "1");

    let config = AppConfig::load();
    let _log_guard = logging::init_logging(&config.log_dir()).context("Failed to initialize logging")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting catalog-player");

    // Keep going without persistence rather than refusing to start
    let store: Box<dyn KeyValueStore> = match JsonFileStore::open(config.library_dir()) {
        Ok(store) => {
            tracing::info!(dir = %store.dir().display(), "Library storage opened");
            Box::new(store)
        }
        Err(e) => {
            tracing::error!(error = %e, "Library storage unavailable, changes won't be saved");
            Box::new(MemoryStore::new())
        }
    };

    let http = reqwest::Client::builder()
        .user_agent(concat!("catalog-player/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let (events_tx, events_rx) = event_channel();
    let backends = BackendSet::new()
        .with(
            BackendKind::NativeAudio,
            Box::new(NativeAudioBackend::new(http.clone(), events_tx.clone())),
        )
        .with(BackendKind::External, Box::new(ExternalBackend::new(events_tx.clone())));

    let source = Arc::new(CatalogClient::new(&config, http));
    let controller = PlaybackController::new(store, backends, source, events_tx, config.limits());

    // Run the TUI event loop
    let mut app = MusicPlayerApp::new(controller, events_rx);
    app.run().await?;

    Ok(())
}
