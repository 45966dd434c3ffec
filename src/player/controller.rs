// ==========================================
// PLAYBACK CONTROLLER
// ==========================================
// The one object that owns playback. The UI holds it and calls its
// operations; nothing else touches the queue or the backends.
//
// It handles:
// - Queue edits (enqueue, remove, move, clear) and the navigation policy
// - Playlists, which are saved copies of a queue
// - Choosing the backend for a track's provider and driving it
// - Lazily resolving PlayableRefs in the background
// - Persisting the library after every change
//
// Everything runs on the UI task. Slow work (resolution, downloads) is spawned
// and comes back as PlayerEvents which the UI loop feeds to handle_event().
// Every load gets a fresh ticket, so when the user skips quickly only the last
// requested track ever starts.

use chrono::Utc;
use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::catalog::TrackSource;
use crate::error::PlayerError;
use crate::player::backend::{BackendEvent, BackendSet, EventSender, PlaybackBackend, PlayerEvent};
use crate::player::library::{HistoryEntry, Library, Limits, Settings};
use crate::player::playlist::Playlist;
use crate::player::queue::{EnqueueOutcome, EnqueuePosition, Queue, RepeatMode, Step};
use crate::player::track::{BackendKind, PlayableRef, Provider, Track, TrackKey};
use crate::storage::KeyValueStore;

// previous() restarts the current track instead once this far in
const RESTART_THRESHOLD_SECS: f64 = 3.0;

// Listening time is counted every second but only written once a minute
const LISTENING_FLUSH_SECS: u64 = 60;

// ==========================================
// PLAYBACK STATE
// ==========================================
// Idle -> Loading -> Ready -> Playing <-> Paused -> Ended
// Loading / Playing / Paused -> Error -> (next track)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error,
}

// Transient, rebuilt on every launch
#[derive(Debug, Clone, Default)]
pub struct PlaybackSession {
    pub loaded: Option<TrackKey>,
    pub backend: Option<BackendKind>,
    pub state: TrackState,
    pub position: f64,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
}

// Short message for the status line
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

// ==========================================
// CONTROLLER STRUCT
// ==========================================
pub struct PlaybackController<S: KeyValueStore> {
    library: Library,
    store: S,
    backends: BackendSet,
    source: Arc<dyn TrackSource>,
    events: EventSender,
    rng: StdRng,
    session: PlaybackSession,
    notices: VecDeque<Notice>,
    limits: Limits,
    // Tracks that failed since the user last picked a track or anything
    // actually played
    failed: HashSet<TrackKey>,
}

impl<S: KeyValueStore> PlaybackController<S> {
    pub fn new(
        store: S,
        mut backends: BackendSet,
        source: Arc<dyn TrackSource>,
        events: EventSender,
        limits: Limits,
    ) -> Self {
        let library = Library::load(&store);
        tracing::info!(
            queued = library.queue.len(),
            liked = library.liked.len(),
            "Library restored"
        );

        let volume = library.settings.volume;
        backends.for_each(|backend| backend.set_volume(volume));

        PlaybackController {
            library,
            store,
            backends,
            source,
            events,
            rng: StdRng::from_entropy(),
            session: PlaybackSession::default(),
            notices: VecDeque::new(),
            limits,
            failed: HashSet::new(),
        }
    }

    // ==========================================
    // PERSISTENCE HOOK
    // ==========================================
    // Every change to the library goes through here and is saved right away.
    fn mutate<T>(&mut self, change: impl FnOnce(&mut Library) -> T) -> T {
        let result = change(&mut self.library);
        if let Err(e) = self.library.save(&mut self.store) {
            tracing::error!(error = %e, "Failed to persist library");
            self.notify(NoticeKind::Warning, format!("Could not save library: {}", e));
        }
        result
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push_back(Notice {
            kind,
            message: message.into(),
        });
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    // ==========================================
    // SEARCH
    // ==========================================
    // The returned future owns everything it needs, so the caller can await
    // it on another task. The queue is never touched by a search.
    pub fn search(&mut self, provider: Provider, query: &str) -> BoxFuture<'static, Result<Vec<Track>, PlayerError>> {
        let limit = self.limits.recent_searches;
        self.mutate(|library| library.record_search(query, limit));
        self.source.search(provider, query.to_string())
    }

    // ==========================================
    // QUEUE EDITS
    // ==========================================
    // Never starts playback, even when the track becomes current
    pub fn enqueue(&mut self, track: Track, position: EnqueuePosition) -> EnqueueOutcome {
        tracing::debug!(track = %track.key(), ?position, "Enqueue");
        self.mutate(|library| library.queue.enqueue(track, position))
    }

    // Removing the loaded track stops it; the entry that becomes current is
    // left for the user to start.
    pub fn remove_at(&mut self, index: usize) -> Result<Track, PlayerError> {
        let removed = self.mutate(|library| library.queue.remove_at(index))?;

        if self.session.loaded.as_ref() == Some(&removed.key()) {
            tracing::info!(track = %removed.key(), "Removed the loaded track, stopping");
            self.stop_playback(TrackState::Idle);
        }
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.mutate(|library| library.queue.clear());
        self.stop_playback(TrackState::Idle);
    }

    // Reordering never touches playback, the loaded track is found by key
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<(), PlayerError> {
        self.mutate(|library| library.queue.move_entry(from, to))
    }

    // ==========================================
    // PLAYLISTS
    // ==========================================
    pub fn create_playlist(&mut self, name: &str, description: &str) -> Result<String, PlayerError> {
        let id = self.mutate(|library| library.create_playlist(name, description, Vec::new(), Utc::now()))?;
        tracing::info!(playlist = %id, name, "Created playlist");
        Ok(id)
    }

    pub fn save_queue_as_playlist(&mut self, name: &str) -> Result<String, PlayerError> {
        if self.library.queue.is_empty() {
            return Err(PlayerError::InvalidRequest("queue is empty".to_string()));
        }

        let tracks = self.library.queue.tracks().to_vec();
        let now = Utc::now();
        let description = format!("Created from queue on {}", now.format("%Y-%m-%d"));
        let id = self.mutate(|library| library.create_playlist(name, &description, tracks, now))?;
        tracing::info!(playlist = %id, name, "Saved queue as playlist");
        Ok(id)
    }

    // Replaces the queue with the playlist's tracks and starts the first one
    pub fn load_playlist(&mut self, id: &str) -> Result<(), PlayerError> {
        let tracks = self
            .library
            .playlist(id)
            .map(|playlist| playlist.tracks.clone())
            .ok_or_else(|| PlayerError::PlaylistNotFound(id.to_string()))?;

        tracing::info!(playlist = %id, tracks = tracks.len(), "Loading playlist into the queue");
        self.stop_playback(TrackState::Idle);
        self.mutate(|library| library.queue = Queue::from_tracks(tracks));

        if self.library.queue.is_empty() {
            return Ok(());
        }
        self.play_track_at(0)
    }

    pub fn delete_playlist(&mut self, id: &str) -> Result<(), PlayerError> {
        let removed = self.mutate(|library| library.delete_playlist(id))?;
        tracing::info!(playlist = %removed.id, name = %removed.name, "Deleted playlist");
        Ok(())
    }

    // Adds the queue entry at `index`. Returns false if it was already there.
    pub fn add_to_playlist(&mut self, id: &str, index: usize) -> Result<bool, PlayerError> {
        let track = self
            .library
            .queue
            .get(index)
            .cloned()
            .ok_or(PlayerError::IndexOutOfRange {
                index,
                len: self.library.queue.len(),
            })?;
        self.mutate(|library| library.add_to_playlist(id, track, Utc::now()))
    }

    // ==========================================
    // STARTING A TRACK: play_track_at()
    // ==========================================
    // A track the user asks for gets a fresh chance even if it failed
    // earlier.
    pub fn play_track_at(&mut self, index: usize) -> Result<(), PlayerError> {
        self.failed.clear();
        self.load_at(index)
    }

    // The only way a different track gets loaded. Stops whatever was active,
    // then either starts the backend right away (ref known or cached) or
    // resolves the ref in the background and starts it from handle_event().
    fn load_at(&mut self, index: usize) -> Result<(), PlayerError> {
        self.mutate(|library| library.queue.set_current(index))?;

        let track = match self.library.queue.get(index) {
            Some(track) => track.clone(),
            None => return Ok(()),
        };

        self.stop_active();
        self.session.generation += 1;
        let ticket = self.session.generation;
        self.session.loaded = Some(track.key());
        self.session.position = 0.0;
        self.session.state = TrackState::Loading;

        tracing::info!(track = %track.key(), index, ticket, "Loading track");

        let known = track.playable.clone().or_else(|| self.source.cached(&track.key()));
        match known {
            Some(playable) => self.start_backend(&track, &playable, ticket),
            None => {
                let events = self.events.clone();
                let resolving = self.source.resolve(track);
                tokio::spawn(async move {
                    let result = resolving.await;
                    let _ = events.send(PlayerEvent::Resolved { ticket, result });
                });
            }
        }
        Ok(())
    }

    fn start_backend(&mut self, track: &Track, playable: &PlayableRef, ticket: u64) {
        let kind = track.provider.backend_kind();
        let known_duration = track.duration_seconds.map(|s| s as f64);
        self.session.backend = Some(kind);

        let loaded = match self.backends.get_mut(kind) {
            Some(backend) => backend.load(playable, ticket, known_duration),
            None => Err(PlayerError::PlaybackError(format!(
                "no playback backend for {} tracks",
                track.provider.label()
            ))),
        };
        if let Err(e) = loaded {
            self.fail_current(e);
            return;
        }
        self.session.state = TrackState::Ready;

        let started = self.with_active(|backend| backend.play()).unwrap_or(Ok(()));
        if let Err(e) = started {
            self.fail_current(e);
            return;
        }
        self.session.state = TrackState::Playing;

        let limit = self.limits.history;
        self.mutate(|library| library.record_play(track, Utc::now(), limit));
    }

    // ==========================================
    // TRANSPORT
    // ==========================================
    pub fn toggle_play_pause(&mut self) {
        let current = match self.library.queue.current_index() {
            Some(index) => index,
            None => return,
        };

        match self.session.state {
            TrackState::Playing => {
                self.with_active(|backend| backend.pause());
                self.session.state = TrackState::Paused;
            }
            TrackState::Paused | TrackState::Ready => match self.with_active(|backend| backend.play()) {
                Some(Ok(())) => self.session.state = TrackState::Playing,
                Some(Err(e)) => self.fail_current(e),
                None => {}
            },
            // Still resolving, it starts on its own once resolved
            TrackState::Loading => {}
            // Nothing loaded yet (fresh start, after the end or an error)
            TrackState::Idle | TrackState::Ended | TrackState::Error => {
                if let Err(e) = self.play_track_at(current) {
                    tracing::warn!(error = %e, "Could not start current track");
                }
            }
        }
    }

    pub fn seek(&mut self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        self.with_active(|backend| {
            if backend.duration().is_some() {
                backend.seek(fraction);
            }
        });
    }

    pub fn set_volume(&mut self, volume: u32) {
        let volume = volume.min(100);
        self.mutate(|library| library.settings.volume = volume);
        self.backends.for_each(|backend| backend.set_volume(volume));
    }

    // ==========================================
    // NAVIGATION: next() / previous()
    // ==========================================
    // A manual skip always moves on, repeat-one only matters at a natural end.
    // Running off the end without repeat-all stops and keeps the index.
    pub fn next(&mut self) {
        let Settings { shuffle, repeat, .. } = self.library.settings;

        match self.library.queue.next_step(shuffle, repeat, &mut self.rng) {
            Step::Play(index) => self.play_or_log(index),
            Step::Stop => {
                if !self.library.queue.is_empty() {
                    tracing::info!("Reached the end of the queue");
                    self.stop_playback(TrackState::Ended);
                    self.notify(NoticeKind::Info, "End of queue");
                }
            }
        }
    }

    pub fn previous(&mut self) {
        if self.session.loaded.is_some() && self.current_time() > RESTART_THRESHOLD_SECS {
            self.restart_loaded();
            return;
        }

        let shuffle = self.library.settings.shuffle;
        if let Step::Play(index) = self.library.queue.previous_step(shuffle, &mut self.rng) {
            self.play_or_log(index);
        }
    }

    fn play_or_log(&mut self, index: usize) {
        if let Err(e) = self.play_track_at(index) {
            tracing::error!(error = %e, index, "Navigation picked an invalid index");
        }
    }

    // Back to 0:00 on the loaded track. Backends that can't seek (unknown
    // duration, or already unloaded) get the track loaded again.
    fn restart_loaded(&mut self) {
        let seekable = self
            .with_active(|backend| backend.duration().is_some())
            .unwrap_or(false);

        if seekable && self.session.state != TrackState::Ended {
            self.with_active(|backend| backend.seek(0.0));
            self.session.position = 0.0;
            return;
        }

        let index = self
            .session
            .loaded
            .as_ref()
            .and_then(|key| self.library.queue.position_of(key));
        if let Some(index) = index {
            self.play_or_log(index);
        }
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.mutate(|library| library.settings.shuffle = shuffle);
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.mutate(|library| library.settings.repeat = repeat);
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        let repeat = self.library.settings.repeat.cycle();
        self.set_repeat(repeat);
        repeat
    }

    // Returns whether the track is now liked
    pub fn toggle_like(&mut self, index: usize) -> Result<bool, PlayerError> {
        let track = self
            .library
            .queue
            .get(index)
            .cloned()
            .ok_or(PlayerError::IndexOutOfRange {
                index,
                len: self.library.queue.len(),
            })?;
        Ok(self.mutate(|library| library.toggle_liked(&track)))
    }

    // ==========================================
    // EVENTS
    // ==========================================
    // Applies one resolution result or backend notification. Anything
    // carrying an old ticket belongs to a track that was replaced and is
    // dropped.
    pub fn handle_event(&mut self, event: PlayerEvent) {
        let ticket = match &event {
            PlayerEvent::Resolved { ticket, .. } | PlayerEvent::Backend { ticket, .. } => *ticket,
        };
        if ticket != self.session.generation {
            tracing::debug!(ticket, current = self.session.generation, "Ignoring stale event");
            return;
        }

        match event {
            PlayerEvent::Resolved { result, .. } => self.on_resolved(ticket, result),
            PlayerEvent::Backend { event, .. } => match event {
                BackendEvent::TimeUpdate { position } => {
                    self.session.position = position;
                    self.failed.clear();
                    self.count_listening_second();
                }
                BackendEvent::Ended => {
                    self.failed.clear();
                    self.on_track_ended();
                }
                BackendEvent::Error(reason) => self.fail_current(PlayerError::PlaybackError(reason)),
            },
        }
    }

    fn on_resolved(&mut self, ticket: u64, result: Result<PlayableRef, PlayerError>) {
        let track = self
            .session
            .loaded
            .as_ref()
            .and_then(|key| self.library.queue.position_of(key))
            .and_then(|index| self.library.queue.get(index))
            .cloned();

        let track = match track {
            Some(track) => track,
            None => return,
        };

        match result {
            Ok(playable) => self.start_backend(&track, &playable, ticket),
            Err(e) => self.fail_current(e),
        }
    }

    // Backends report time once per second of playback
    fn count_listening_second(&mut self) {
        if (self.library.listening_secs + 1) % LISTENING_FLUSH_SECS == 0 {
            self.mutate(|library| library.listening_secs += 1);
        } else {
            self.library.listening_secs += 1;
        }
    }

    fn on_track_ended(&mut self) {
        tracing::debug!(track = ?self.session.loaded, "Track ended");
        self.session.state = TrackState::Ended;

        if self.library.settings.repeat == RepeatMode::One {
            self.restart_loaded();
        } else {
            self.next();
        }
    }

    // ==========================================
    // FAILURES
    // ==========================================
    // Exactly one notice per failure. Moves on to the next entry without
    // retrying; stops in Error at the end of the queue or once every entry
    // has failed in this run.
    fn fail_current(&mut self, error: PlayerError) {
        tracing::warn!(track = ?self.session.loaded, error = %error, "Playback failed");
        self.stop_active();
        self.session.state = TrackState::Error;
        if let Some(key) = self.session.loaded.clone() {
            self.failed.insert(key);
        }

        let every_entry_failed = self
            .library
            .queue
            .tracks()
            .iter()
            .all(|track| self.failed.contains(&track.key()));
        let Settings { shuffle, repeat, .. } = self.library.settings;
        let step = if every_entry_failed {
            Step::Stop
        } else {
            self.library.queue.next_step(shuffle, repeat, &mut self.rng)
        };

        match step {
            Step::Play(index) => {
                self.notify(NoticeKind::Warning, format!("{}, skipping", error));
                if let Err(e) = self.load_at(index) {
                    tracing::error!(error = %e, index, "Navigation picked an invalid index");
                }
            }
            Step::Stop => {
                let why = if every_entry_failed {
                    "no playable tracks left"
                } else {
                    "end of queue"
                };
                self.stop_playback(TrackState::Error);
                self.failed.clear();
                self.notify(NoticeKind::Warning, format!("{} ({}, stopped)", error, why));
            }
        }
    }

    // ==========================================
    // BACKEND PLUMBING
    // ==========================================
    fn with_active<T>(&mut self, f: impl FnOnce(&mut dyn PlaybackBackend) -> T) -> Option<T> {
        let kind = self.session.backend?;
        let backend = self.backends.get_mut(kind)?;
        Some(f(backend))
    }

    fn stop_active(&mut self) {
        if let Some(kind) = self.session.backend.take() {
            if let Some(backend) = self.backends.get_mut(kind) {
                backend.stop();
            }
        }
    }

    // Stops and unloads; anything still resolving for the old track is
    // invalidated by the ticket bump.
    fn stop_playback(&mut self, state: TrackState) {
        self.stop_active();
        self.session.generation += 1;
        self.session.loaded = None;
        self.session.position = 0.0;
        self.session.state = state;
    }

    // Lets backends poll their outputs, called once per UI frame
    pub fn tick(&mut self) {
        self.backends.for_each(|backend| backend.tick());
    }

    // ==========================================
    // READ ACCESS
    // ==========================================
    pub fn queue(&self) -> &Queue {
        &self.library.queue
    }

    pub fn settings(&self) -> Settings {
        self.library.settings
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn liked(&self) -> &[Track] {
        &self.library.liked
    }

    pub fn is_liked(&self, key: &TrackKey) -> bool {
        self.library.is_liked(key)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.library.history
    }

    pub fn recent_searches(&self) -> &[String] {
        &self.library.recent_searches
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.library.playlists
    }

    pub fn listening_secs(&self) -> u64 {
        self.library.listening_secs
    }

    pub fn loaded_track(&self) -> Option<&Track> {
        let key = self.session.loaded.as_ref()?;
        let index = self.library.queue.position_of(key)?;
        self.library.queue.get(index)
    }

    pub fn current_time(&self) -> f64 {
        self.session
            .backend
            .and_then(|kind| self.backends.get(kind))
            .map(|backend| backend.current_time())
            .unwrap_or(self.session.position)
    }

    pub fn duration(&self) -> Option<f64> {
        self.session
            .backend
            .and_then(|kind| self.backends.get(kind))
            .and_then(|backend| backend.duration())
    }

    #[cfg(test)]
    fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::backend::{event_channel, EventReceiver};
    use crate::storage::{JsonFileStore, MemoryStore};
    use futures::future::FutureExt;
    use std::collections::HashSet;
    use std::sync::Mutex;

    // ==========================================
    // TEST DOUBLES
    // ==========================================
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        time: f64,
        duration: Option<f64>,
        reject: HashSet<String>,
    }

    impl Recorder {
        fn loads(&self) -> Vec<String> {
            self.calls
                .iter()
                .filter_map(|c| c.strip_prefix("load ").map(str::to_string))
                .collect()
        }
    }

    struct RecordingBackend(Arc<Mutex<Recorder>>);

    fn url_of(playable: &PlayableRef) -> String {
        match playable {
            PlayableRef::Stream { url } | PlayableRef::Embed { url } => url.clone(),
            PlayableRef::File { path } => path.display().to_string(),
        }
    }

    impl PlaybackBackend for RecordingBackend {
        fn load(&mut self, source: &PlayableRef, _ticket: u64, known_duration: Option<f64>) -> Result<(), PlayerError> {
            let mut rec = self.0.lock().unwrap();
            let url = url_of(source);
            rec.calls.push(format!("load {}", url));
            rec.time = 0.0;
            rec.duration = known_duration;
            if rec.reject.contains(&url) {
                return Err(PlayerError::PlaybackError(format!("cannot decode {}", url)));
            }
            Ok(())
        }

        fn play(&mut self) -> Result<(), PlayerError> {
            self.0.lock().unwrap().calls.push("play".to_string());
            Ok(())
        }

        fn pause(&mut self) {
            self.0.lock().unwrap().calls.push("pause".to_string());
        }

        fn stop(&mut self) {
            self.0.lock().unwrap().calls.push("stop".to_string());
        }

        fn seek(&mut self, fraction: f64) {
            let mut rec = self.0.lock().unwrap();
            rec.calls.push(format!("seek {}", fraction));
            if let Some(duration) = rec.duration {
                rec.time = duration * fraction;
            }
        }

        fn current_time(&self) -> f64 {
            self.0.lock().unwrap().time
        }

        fn duration(&self) -> Option<f64> {
            self.0.lock().unwrap().duration
        }

        fn set_volume(&mut self, volume: u32) {
            self.0.lock().unwrap().calls.push(format!("volume {}", volume));
        }
    }

    // Resolves every deferred track to "resolved://<id>" unless told to fail it
    #[derive(Default)]
    struct ScriptedSource {
        unresolvable: HashSet<String>,
        results: Vec<Track>,
    }

    impl TrackSource for ScriptedSource {
        fn search(&self, provider: Provider, query: String) -> BoxFuture<'static, Result<Vec<Track>, PlayerError>> {
            let results = self.results.clone();
            async move {
                if query == "fail" {
                    Err(PlayerError::SearchFailed {
                        provider,
                        query,
                        reason: "HTTP 503".to_string(),
                    })
                } else {
                    Ok(results)
                }
            }
            .boxed()
        }

        fn resolve(&self, track: Track) -> BoxFuture<'static, Result<PlayableRef, PlayerError>> {
            let fails = self.unresolvable.contains(&track.id);
            async move {
                if fails {
                    Err(PlayerError::not_playable(&track.title, "removed by uploader"))
                } else {
                    Ok(PlayableRef::Stream {
                        url: format!("resolved://{}", track.id),
                    })
                }
            }
            .boxed()
        }
    }

    struct Harness<S: KeyValueStore> {
        controller: PlaybackController<S>,
        native: Arc<Mutex<Recorder>>,
        external: Arc<Mutex<Recorder>>,
        rx: EventReceiver,
    }

    fn harness_with<S: KeyValueStore>(store: S, source: ScriptedSource) -> Harness<S> {
        let native = Arc::new(Mutex::new(Recorder::default()));
        let external = Arc::new(Mutex::new(Recorder::default()));
        let backends = BackendSet::new()
            .with(BackendKind::NativeAudio, Box::new(RecordingBackend(Arc::clone(&native))))
            .with(BackendKind::External, Box::new(RecordingBackend(Arc::clone(&external))));
        let (tx, rx) = event_channel();

        let controller = PlaybackController::new(store, backends, Arc::new(source), tx, Limits::default())
            .with_rng(StdRng::seed_from_u64(11));

        Harness {
            controller,
            native,
            external,
            rx,
        }
    }

    fn harness() -> Harness<MemoryStore> {
        harness_with(MemoryStore::new(), ScriptedSource::default())
    }

    impl<S: KeyValueStore> Harness<S> {
        // Waits for the next resolution and applies it
        async fn settle(&mut self) {
            let event = self.rx.recv().await.unwrap();
            self.controller.handle_event(event);
        }

        fn backend_event(&mut self, event: BackendEvent) {
            let ticket = self.controller.session().generation;
            self.controller.handle_event(PlayerEvent::Backend { ticket, event });
        }

        fn native_loads(&self) -> Vec<String> {
            self.native.lock().unwrap().loads()
        }
    }

    // Preview tracks start synchronously, no resolution round trip
    fn preview(provider: Provider, id: &str) -> Track {
        Track::new(provider, id, format!("Song {}", id), "Artist")
            .with_duration(30)
            .with_playable(PlayableRef::Stream {
                url: format!("https://cdn/{}.mp3", id),
            })
    }

    fn deferred(provider: Provider, id: &str) -> Track {
        Track::new(provider, id, format!("Song {}", id), "Artist").with_duration(200)
    }

    fn fill<S: KeyValueStore>(h: &mut Harness<S>, ids: &[&str]) {
        for id in ids {
            h.controller.enqueue(preview(Provider::Deezer, id), EnqueuePosition::End);
        }
    }

    // ==========================================
    // QUEUE EDITS
    // ==========================================
    #[tokio::test]
    async fn enqueue_twice_keeps_length_one() {
        let mut h = harness();
        let a = preview(Provider::Youtube, "a");
        h.controller.enqueue(a.clone(), EnqueuePosition::End);
        h.controller.enqueue(a, EnqueuePosition::End);
        assert_eq!(h.controller.queue().len(), 1);
    }

    #[tokio::test]
    async fn enqueue_into_empty_queue_selects_without_playing() {
        let mut h = harness();
        h.controller.enqueue(preview(Provider::Itunes, "a"), EnqueuePosition::End);
        assert_eq!(h.controller.queue().current_index(), Some(0));
        assert_eq!(h.controller.session().state, TrackState::Idle);
        assert!(h.native_loads().is_empty());
    }

    #[tokio::test]
    async fn play_track_at_out_of_range() {
        let mut h = harness();
        fill(&mut h, &["a"]);
        assert_eq!(
            h.controller.play_track_at(3),
            Err(PlayerError::IndexOutOfRange { index: 3, len: 1 })
        );
        assert!(h.native_loads().is_empty());
    }

    #[tokio::test]
    async fn removing_playing_track_stops_without_autoplay() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.controller.play_track_at(1).unwrap();

        let removed = h.controller.remove_at(1).unwrap();
        assert_eq!(removed.id, "b");
        assert_eq!(h.controller.queue().current().unwrap().id, "c");
        assert_eq!(h.controller.session().state, TrackState::Idle);
        assert_eq!(h.controller.session().loaded, None);
        assert_eq!(h.native.lock().unwrap().calls.last().unwrap(), "stop");
        assert_eq!(h.native_loads(), vec!["https://cdn/b.mp3"]);
    }

    #[tokio::test]
    async fn removing_another_track_keeps_playing() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.controller.play_track_at(2).unwrap();
        h.controller.remove_at(0).unwrap();

        assert_eq!(h.controller.queue().current_index(), Some(1));
        assert_eq!(h.controller.session().state, TrackState::Playing);
        assert_eq!(h.controller.loaded_track().unwrap().id, "c");
    }

    #[tokio::test]
    async fn clear_empties_and_stops() {
        let mut h = harness();
        fill(&mut h, &["a", "b"]);
        h.controller.play_track_at(0).unwrap();
        h.controller.clear();

        assert!(h.controller.queue().is_empty());
        assert_eq!(h.controller.queue().current_index(), None);
        assert_eq!(h.controller.session().state, TrackState::Idle);
    }

    // ==========================================
    // NAVIGATION
    // ==========================================
    #[tokio::test]
    async fn next_cycles_back_with_repeat_all() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c", "d"]);
        h.controller.set_repeat(RepeatMode::All);
        h.controller.play_track_at(1).unwrap();

        for _ in 0..h.controller.queue().len() {
            h.controller.next();
        }
        assert_eq!(h.controller.queue().current_index(), Some(1));
    }

    #[tokio::test]
    async fn next_on_last_without_repeat_stops_in_place() {
        let mut h = harness();
        fill(&mut h, &["a", "b"]);
        h.controller.play_track_at(1).unwrap();
        h.controller.next();

        assert_eq!(h.controller.queue().current_index(), Some(1));
        assert_eq!(h.controller.session().state, TrackState::Ended);
        assert_eq!(h.native_loads().len(), 1);

        let notices = h.controller.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Info);
    }

    #[tokio::test]
    async fn manual_next_advances_with_repeat_one() {
        let mut h = harness();
        fill(&mut h, &["a", "b"]);
        h.controller.set_repeat(RepeatMode::One);
        h.controller.play_track_at(0).unwrap();
        h.controller.next();
        assert_eq!(h.controller.queue().current_index(), Some(1));
    }

    #[tokio::test]
    async fn without_current_next_starts_first_and_previous_starts_last() {
        let mut library = Library::default();
        library.queue = Queue::restore(
            vec![preview(Provider::Deezer, "a"), preview(Provider::Deezer, "b")],
            None,
        )
        .unwrap();
        let mut store = MemoryStore::new();
        library.save(&mut store).unwrap();

        let mut h = harness_with(store.clone(), ScriptedSource::default());
        h.controller.next();
        assert_eq!(h.controller.queue().current_index(), Some(0));

        let mut h = harness_with(store, ScriptedSource::default());
        h.controller.previous();
        assert_eq!(h.controller.queue().current_index(), Some(1));
    }

    #[tokio::test]
    async fn previous_after_three_seconds_restarts() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.controller.play_track_at(1).unwrap();
        h.native.lock().unwrap().time = 5.0;

        h.controller.previous();

        assert_eq!(h.controller.queue().current_index(), Some(1));
        assert_eq!(h.controller.current_time(), 0.0);
        assert_eq!(h.native.lock().unwrap().calls.last().unwrap(), "seek 0");
        assert_eq!(h.native_loads().len(), 1);
    }

    #[tokio::test]
    async fn previous_early_goes_back_and_wraps() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.controller.play_track_at(0).unwrap();
        h.native.lock().unwrap().time = 1.5;

        h.controller.previous();
        assert_eq!(h.controller.queue().current_index(), Some(2));
    }

    #[tokio::test]
    async fn shuffle_next_never_repeats_current() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c", "d", "e"]);
        h.controller.set_shuffle(true);
        h.controller.play_track_at(0).unwrap();

        for _ in 0..200 {
            let before = h.controller.queue().current_index();
            h.controller.next();
            assert_ne!(h.controller.queue().current_index(), before);
        }
    }

    #[tokio::test]
    async fn natural_end_with_repeat_one_restarts_same_track() {
        let mut h = harness();
        h.controller.enqueue(deferred(Provider::Youtube, "A"), EnqueuePosition::End);
        h.controller.enqueue(deferred(Provider::Soundcloud, "B"), EnqueuePosition::End);
        h.controller.set_repeat(RepeatMode::One);
        h.controller.play_track_at(0).unwrap();
        h.settle().await;

        h.native.lock().unwrap().time = 199.0;
        h.backend_event(BackendEvent::Ended);

        assert_eq!(h.controller.queue().current_index(), Some(0));
        assert_eq!(h.controller.current_time(), 0.0);
        // Ended tracks are loaded again from the top
        h.settle().await;
        assert_eq!(h.native_loads(), vec!["resolved://A", "resolved://A"]);
        assert_eq!(h.controller.session().state, TrackState::Playing);
    }

    #[tokio::test]
    async fn natural_end_advances_without_repeat_one() {
        let mut h = harness();
        fill(&mut h, &["a", "b"]);
        h.controller.play_track_at(0).unwrap();
        h.backend_event(BackendEvent::Ended);
        assert_eq!(h.controller.queue().current_index(), Some(1));
    }

    // ==========================================
    // PROVIDERS AND RESOLUTION
    // ==========================================
    #[tokio::test]
    async fn spotify_tracks_go_to_the_external_backend() {
        let mut h = harness();
        h.controller.enqueue(deferred(Provider::Spotify, "sp1"), EnqueuePosition::End);
        h.controller.enqueue(preview(Provider::Itunes, "it1"), EnqueuePosition::End);

        h.controller.play_track_at(0).unwrap();
        h.settle().await;
        assert_eq!(h.external.lock().unwrap().loads(), vec!["resolved://sp1"]);
        assert_eq!(h.controller.session().backend, Some(BackendKind::External));

        h.controller.next();
        assert_eq!(h.native_loads(), vec!["https://cdn/it1.mp3"]);
        // Switching families stops the previous backend
        assert_eq!(h.external.lock().unwrap().calls.last().unwrap(), "stop");
    }

    #[tokio::test]
    async fn last_requested_track_wins() {
        let mut h = harness();
        h.controller.enqueue(deferred(Provider::Audius, "slow"), EnqueuePosition::End);
        h.controller.enqueue(deferred(Provider::Audius, "fast"), EnqueuePosition::End);

        h.controller.play_track_at(0).unwrap();
        h.controller.play_track_at(1).unwrap();
        h.settle().await;
        h.settle().await;

        assert_eq!(h.native_loads(), vec!["resolved://fast"]);
        assert_eq!(h.controller.loaded_track().unwrap().id, "fast");
    }

    #[tokio::test]
    async fn stale_backend_events_are_ignored() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.controller.play_track_at(0).unwrap();
        let old = h.controller.session().generation;
        h.controller.play_track_at(2).unwrap();

        h.controller.handle_event(PlayerEvent::Backend {
            ticket: old,
            event: BackendEvent::Ended,
        });
        assert_eq!(h.controller.queue().current_index(), Some(2));
        assert_eq!(h.controller.session().state, TrackState::Playing);
    }

    // ==========================================
    // FAILURES
    // ==========================================
    #[tokio::test]
    async fn backend_error_skips_once_with_one_notice() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.controller.play_track_at(1).unwrap();
        h.controller.drain_notices();

        h.backend_event(BackendEvent::Error("decoder gave up".to_string()));

        assert_eq!(h.controller.queue().current_index(), Some(2));
        assert_eq!(h.controller.drain_notices().len(), 1);
        let loads = h.native_loads();
        assert_eq!(loads.iter().filter(|u| u.ends_with("/b.mp3")).count(), 1);
    }

    #[tokio::test]
    async fn rejected_load_skips_to_next() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.native.lock().unwrap().reject.insert("https://cdn/b.mp3".to_string());
        h.controller.play_track_at(0).unwrap();

        h.controller.next();

        assert_eq!(h.controller.queue().current_index(), Some(2));
        assert_eq!(
            h.native_loads(),
            vec!["https://cdn/a.mp3", "https://cdn/b.mp3", "https://cdn/c.mp3"]
        );
        let notices = h.controller.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Warning);
    }

    #[tokio::test]
    async fn unresolvable_track_is_skipped() {
        let source = ScriptedSource {
            unresolvable: HashSet::from(["gone".to_string()]),
            ..ScriptedSource::default()
        };
        let mut h = harness_with(MemoryStore::new(), source);
        h.controller.enqueue(deferred(Provider::Youtube, "gone"), EnqueuePosition::End);
        h.controller.enqueue(preview(Provider::Deezer, "ok"), EnqueuePosition::End);

        h.controller.play_track_at(0).unwrap();
        h.settle().await;

        assert_eq!(h.controller.queue().current_index(), Some(1));
        assert_eq!(h.native_loads(), vec!["https://cdn/ok.mp3"]);
        let notices = h.controller.drain_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("removed by uploader"));
    }

    #[tokio::test]
    async fn all_tracks_failing_stops_instead_of_looping() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.controller.set_repeat(RepeatMode::All);
        {
            let mut rec = h.native.lock().unwrap();
            for id in ["a", "b", "c"] {
                rec.reject.insert(format!("https://cdn/{}.mp3", id));
            }
        }

        h.controller.play_track_at(0).unwrap();

        assert_eq!(h.native_loads().len(), 3);
        assert_eq!(h.controller.session().state, TrackState::Error);
        assert_eq!(h.controller.drain_notices().len(), 3);
    }

    #[tokio::test]
    async fn error_on_last_entry_stops_with_one_notice() {
        let mut h = harness();
        fill(&mut h, &["a", "b"]);
        h.controller.play_track_at(1).unwrap();
        h.controller.drain_notices();

        h.backend_event(BackendEvent::Error("geo blocked".to_string()));

        let notices = h.controller.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Warning);
        assert!(notices[0].message.contains("geo blocked"));
        assert_eq!(h.controller.session().state, TrackState::Error);
        assert_eq!(h.controller.queue().current_index(), Some(1));
        assert_eq!(h.native_loads().len(), 1);
    }

    #[tokio::test]
    async fn picking_a_track_gives_earlier_failures_another_chance() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.controller.set_repeat(RepeatMode::All);
        h.native.lock().unwrap().reject.insert("https://cdn/a.mp3".to_string());

        // a fails, b takes over
        h.controller.play_track_at(0).unwrap();
        assert_eq!(h.controller.queue().current_index(), Some(1));

        h.controller.play_track_at(2).unwrap();
        h.backend_event(BackendEvent::Error("decoder gave up".to_string()));

        // c and a fail in this run, b is still worth trying
        assert_eq!(
            h.native_loads(),
            vec![
                "https://cdn/a.mp3",
                "https://cdn/b.mp3",
                "https://cdn/c.mp3",
                "https://cdn/a.mp3",
                "https://cdn/b.mp3",
            ]
        );
        assert_eq!(h.controller.queue().current_index(), Some(1));
        assert_eq!(h.controller.session().state, TrackState::Playing);
    }

    #[tokio::test]
    async fn playing_again_clears_the_failure_run() {
        let mut h = harness();
        fill(&mut h, &["a", "b"]);
        h.controller.set_repeat(RepeatMode::All);
        h.controller.play_track_at(0).unwrap();
        h.backend_event(BackendEvent::Error("stalled".to_string()));
        assert_eq!(h.controller.queue().current_index(), Some(1));

        // b plays for a while, so a failing again is not the whole queue failing
        h.backend_event(BackendEvent::TimeUpdate { position: 1.0 });
        h.backend_event(BackendEvent::Ended);
        h.backend_event(BackendEvent::Error("stalled".to_string()));

        assert_eq!(h.controller.queue().current_index(), Some(1));
        assert_eq!(h.controller.session().state, TrackState::Playing);
    }

    // ==========================================
    // TRANSPORT
    // ==========================================
    #[tokio::test]
    async fn toggle_pauses_resumes_and_starts_idle_current() {
        let mut h = harness();
        h.controller.toggle_play_pause();
        assert!(h.native_loads().is_empty());

        fill(&mut h, &["a"]);
        h.controller.toggle_play_pause();
        assert_eq!(h.controller.session().state, TrackState::Playing);

        h.controller.toggle_play_pause();
        assert_eq!(h.controller.session().state, TrackState::Paused);
        h.controller.toggle_play_pause();
        assert_eq!(h.controller.session().state, TrackState::Playing);

        let calls = h.native.lock().unwrap().calls.clone();
        assert!(calls.ends_with(&["play".to_string(), "pause".to_string(), "play".to_string()]));
    }

    #[tokio::test]
    async fn seek_clamps_and_needs_a_duration() {
        let mut h = harness();
        let unknown_length = Track::new(Provider::Deezer, "x", "X", "Y").with_playable(PlayableRef::Stream {
            url: "https://cdn/x.mp3".to_string(),
        });
        h.controller.enqueue(unknown_length, EnqueuePosition::End);
        h.controller.play_track_at(0).unwrap();
        h.controller.seek(0.5);
        assert!(!h.native.lock().unwrap().calls.iter().any(|c| c.starts_with("seek")));

        h.native.lock().unwrap().duration = Some(100.0);
        h.controller.seek(7.0);
        assert_eq!(h.native.lock().unwrap().calls.last().unwrap(), "seek 1");
        h.controller.seek(-1.0);
        assert_eq!(h.native.lock().unwrap().calls.last().unwrap(), "seek 0");
    }

    #[tokio::test]
    async fn volume_is_clamped_and_applied_everywhere() {
        let mut h = harness();
        h.controller.set_volume(250);
        assert_eq!(h.controller.settings().volume, 100);
        assert_eq!(h.external.lock().unwrap().calls.last().unwrap(), "volume 100");
    }

    // ==========================================
    // PERSISTENCE AND LIBRARY
    // ==========================================
    #[tokio::test]
    async fn state_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            let mut h = harness_with(store, ScriptedSource::default());
            fill(&mut h, &["a", "b", "c"]);
            h.controller.enqueue(deferred(Provider::Spotify, "sp"), EnqueuePosition::Next);
            h.controller.play_track_at(2).unwrap();
            h.controller.set_shuffle(true);
            h.controller.cycle_repeat();
            h.controller.set_volume(35);
            h.controller.toggle_like(0).unwrap();
        }

        let store = JsonFileStore::open(dir.path()).unwrap();
        let h = harness_with(store, ScriptedSource::default());
        let ids: Vec<_> = h.controller.queue().tracks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "sp", "b", "c"]);
        assert_eq!(h.controller.queue().current_index(), Some(2));
        assert!(h.controller.settings().shuffle);
        assert_eq!(h.controller.settings().repeat, RepeatMode::All);
        assert_eq!(h.controller.settings().volume, 35);
        assert_eq!(h.controller.liked().len(), 1);
        assert_eq!(h.controller.history()[0].track.id, "b");
        // Nothing is loaded until the user asks for it
        assert_eq!(h.controller.session().state, TrackState::Idle);
        assert_eq!(h.native.lock().unwrap().calls, vec!["volume 35"]);
    }

    #[tokio::test]
    async fn listening_time_is_written_once_a_minute() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        let mut h = harness_with(store, ScriptedSource::default());
        fill(&mut h, &["a"]);
        h.controller.play_track_at(0).unwrap();

        for second in 1..=61 {
            h.backend_event(BackendEvent::TimeUpdate {
                position: second as f64,
            });
        }

        assert_eq!(h.controller.listening_secs(), 61);
        let on_disk = Library::load(&JsonFileStore::open(dir.path()).unwrap());
        assert_eq!(on_disk.listening_secs, 60);
    }

    // ==========================================
    // REORDERING AND PLAYLISTS
    // ==========================================
    #[tokio::test]
    async fn moving_entries_keeps_the_loaded_track_playing() {
        let mut h = harness();
        fill(&mut h, &["a", "b", "c"]);
        h.controller.play_track_at(1).unwrap();

        h.controller.move_entry(1, 0).unwrap();
        h.controller.move_entry(2, 1).unwrap();

        let ids: Vec<_> = h.controller.queue().tracks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(h.controller.queue().current_index(), Some(0));
        assert_eq!(h.controller.loaded_track().unwrap().id, "b");
        assert_eq!(h.controller.session().state, TrackState::Playing);
        assert_eq!(h.native_loads().len(), 1);

        assert!(h.controller.move_entry(0, 9).is_err());
    }

    #[tokio::test]
    async fn loading_a_playlist_replaces_the_queue_and_plays_it() {
        let mut h = harness();
        fill(&mut h, &["a", "b"]);
        let id = h.controller.save_queue_as_playlist("Morning").unwrap();

        h.controller.clear();
        fill(&mut h, &["x"]);
        h.controller.play_track_at(0).unwrap();

        h.controller.load_playlist(&id).unwrap();

        let ids: Vec<_> = h.controller.queue().tracks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(h.controller.queue().current_index(), Some(0));
        assert_eq!(h.controller.loaded_track().unwrap().id, "a");
        assert_eq!(h.native_loads().last().unwrap(), "https://cdn/a.mp3");
        assert!(h.controller.playlists()[0].description.starts_with("Created from queue"));
    }

    #[tokio::test]
    async fn empty_playlist_loads_as_an_empty_queue() {
        let mut h = harness();
        fill(&mut h, &["a"]);
        let id = h.controller.create_playlist("Later", "for the weekend").unwrap();

        h.controller.load_playlist(&id).unwrap();

        assert!(h.controller.queue().is_empty());
        assert_eq!(h.controller.session().state, TrackState::Idle);
    }

    #[tokio::test]
    async fn playlist_requests_are_validated() {
        let mut h = harness();
        assert!(matches!(
            h.controller.save_queue_as_playlist("Nothing"),
            Err(PlayerError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.controller.create_playlist("  ", ""),
            Err(PlayerError::InvalidRequest(_))
        ));
        assert_eq!(
            h.controller.load_playlist("pl1"),
            Err(PlayerError::PlaylistNotFound("pl1".to_string()))
        );
        assert!(h.controller.playlists().is_empty());
    }

    #[tokio::test]
    async fn adding_to_and_deleting_playlists() {
        let mut h = harness();
        fill(&mut h, &["a", "b"]);
        let id = h.controller.create_playlist("Gym", "").unwrap();

        assert!(h.controller.add_to_playlist(&id, 1).unwrap());
        assert!(!h.controller.add_to_playlist(&id, 1).unwrap());
        assert!(h.controller.add_to_playlist(&id, 5).is_err());
        assert_eq!(h.controller.playlists()[0].tracks[0].id, "b");

        h.controller.delete_playlist(&id).unwrap();
        assert!(h.controller.playlists().is_empty());
        assert!(h.controller.delete_playlist(&id).is_err());
    }

    #[tokio::test]
    async fn search_records_query_and_leaves_queue_alone() {
        let source = ScriptedSource {
            results: vec![preview(Provider::Deezer, "r1")],
            ..ScriptedSource::default()
        };
        let mut h = harness_with(MemoryStore::new(), source);
        fill(&mut h, &["a"]);

        let found = h.controller.search(Provider::Deezer, "daft punk").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(h.controller.queue().len(), 1);

        let err = h.controller.search(Provider::Deezer, "fail").await.unwrap_err();
        assert!(matches!(err, PlayerError::SearchFailed { .. }));
        assert_eq!(h.controller.recent_searches().to_vec(), vec!["fail", "daft punk"]);
    }

    #[tokio::test]
    async fn like_toggle_on_missing_index() {
        let mut h = harness();
        assert!(h.controller.toggle_like(0).is_err());
        fill(&mut h, &["a"]);
        assert!(h.controller.toggle_like(0).unwrap());
        assert!(h.controller.is_liked(&preview(Provider::Deezer, "a").key()));
        assert!(!h.controller.toggle_like(0).unwrap());
    }
}
