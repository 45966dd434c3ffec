// ==========================================
// NATIVE AUDIO BACKEND
// ==========================================
// Plays decodable audio through the rodio library.
// It handles:
// - Connecting to the default audio output device
// - Downloading stream URLs and reading extracted files in the background
// - Playing, pausing, stopping, seeking and volume
// - Noticing when a track has run out and reporting it
//
// Key Concept: rodio's Sink is a queue of decoded sources that plays on its
// own thread. It doesn't expose a playback position, so we keep our own
// clock (PlaybackClock) next to it.

use rodio::{Decoder, OutputStream, Sink, Source};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::error::PlayerError;
use crate::player::backend::{BackendEvent, EventSender, PlaybackBackend, PlayerEvent};
use crate::player::track::PlayableRef;

// A sink is briefly empty while a new source is appended. Only call the
// track finished once it has actually played for a moment.
const ENDED_GUARD_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerState {
    Stopped, // Nothing loaded
    Loading, // Waiting for the download / decode
    Playing,
    Paused,
}

// ==========================================
// PLAYBACK CLOCK
// ==========================================
// Tracks elapsed playback time from wall-clock instants, excluding time
// spent paused. `offset` is where playback (re)started, e.g. after a seek.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    offset: Duration,
    start_time: Option<Instant>,
    pause_time: Option<Instant>,
    total_paused_duration: Duration,
}

impl PlaybackClock {
    pub fn start_at(&mut self, offset: Duration, now: Instant) {
        self.offset = offset;
        self.start_time = Some(now);
        self.pause_time = None;
        self.total_paused_duration = Duration::ZERO;
    }

    pub fn pause(&mut self, now: Instant) {
        if self.start_time.is_some() && self.pause_time.is_none() {
            self.pause_time = Some(now);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if let Some(pause_time) = self.pause_time.take() {
            self.total_paused_duration += now.duration_since(pause_time);
        }
    }

    pub fn reset(&mut self) {
        *self = PlaybackClock::default();
    }

    pub fn position(&self, now: Instant) -> f64 {
        let Some(start) = self.start_time else {
            return 0.0;
        };

        // While paused, time stopped at the pause
        let until = self.pause_time.unwrap_or(now);
        let elapsed = until
            .saturating_duration_since(start)
            .saturating_sub(self.total_paused_duration);

        (self.offset + elapsed).as_secs_f64()
    }
}

// What a playing sink means for the controller on this tick
#[derive(Debug, Clone, Copy, PartialEq)]
enum Progress {
    Ended,
    Second(u64),
    Unchanged,
}

fn progress(position: f64, sink_empty: bool, last_reported_second: u64) -> Progress {
    if sink_empty && position >= ENDED_GUARD_SECS {
        return Progress::Ended;
    }

    let second = position as u64;
    if second != last_reported_second {
        Progress::Second(second)
    } else {
        Progress::Unchanged
    }
}

type FetchResult = (u64, Result<Arc<[u8]>, String>);

// ==========================================
// NATIVE AUDIO BACKEND STRUCT
// ==========================================
// Fields worth explaining:
//
// _stream: keeps the OS audio device open. Dropping it silences the sink.
//
// active_ticket: ticket of the load currently owned by this backend. Cleared
//   on stop() so late downloads for an abandoned track are thrown away.
//
// buffered: the whole encoded track. Seeking re-decodes from it, rodio 0.17
//   can't seek an appended source in place.
pub struct NativeAudioBackend {
    _stream: Option<OutputStream>,
    sink: Option<Sink>,
    http: reqwest::Client,
    events: EventSender,
    fetch_tx: mpsc::UnboundedSender<FetchResult>,
    fetch_rx: mpsc::UnboundedReceiver<FetchResult>,
    state: PlayerState,
    active_ticket: Option<u64>,
    want_playing: bool,
    buffered: Option<Arc<[u8]>>,
    duration: Option<f64>,
    clock: PlaybackClock,
    volume: u32,
    last_reported_second: u64,
}

impl Drop for NativeAudioBackend {
    fn drop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
    }
}

impl NativeAudioBackend {
    // Opens the default output device. On a machine without one we keep
    // going: every load() then fails and the controller skips along.
    pub fn new(http: reqwest::Client, events: EventSender) -> Self {
        let (stream, sink) = match OutputStream::try_default() {
            Ok((stream, handle)) => match Sink::try_new(&handle) {
                Ok(sink) => (Some(stream), Some(sink)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create audio sink");
                    (Some(stream), None)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "No audio output device available");
                (None, None)
            }
        };

        Self::with_output(stream, sink, http, events)
    }

    fn with_output(stream: Option<OutputStream>, sink: Option<Sink>, http: reqwest::Client, events: EventSender) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();

        NativeAudioBackend {
            _stream: stream,
            sink,
            http,
            events,
            fetch_tx,
            fetch_rx,
            state: PlayerState::Stopped,
            active_ticket: None,
            want_playing: false,
            buffered: None,
            duration: None,
            clock: PlaybackClock::default(),
            volume: 100,
            last_reported_second: 0,
        }
    }

    fn emit(&self, event: BackendEvent) {
        if let Some(ticket) = self.active_ticket {
            let _ = self.events.send(PlayerEvent::Backend { ticket, event });
        }
    }

    fn spawn_download(&self, url: String, ticket: u64) {
        let http = self.http.clone();
        let tx = self.fetch_tx.clone();

        tokio::spawn(async move {
            tracing::debug!(%url, ticket, "Downloading audio stream");
            let result = async {
                let response = http.get(&url).send().await?.error_for_status()?;
                response.bytes().await
            }
            .await
            .map(|bytes| Arc::<[u8]>::from(bytes.as_ref()))
            .map_err(|e| format!("download failed: {}", e));

            let _ = tx.send((ticket, result));
        });
    }

    // Extracted files can be long, keep the read off the UI task
    fn spawn_read(&self, path: PathBuf, ticket: u64) {
        let tx = self.fetch_tx.clone();

        tokio::spawn(async move {
            tracing::debug!(path = %path.display(), ticket, "Reading extracted audio");
            let result = tokio::fs::read(&path)
                .await
                .map(Arc::<[u8]>::from)
                .map_err(|e| format!("Failed to open {}: {}", path.display(), e));

            let _ = tx.send((ticket, result));
        });
    }

    // Decodes the buffered track from `offset` and hands it to the sink
    fn attach(&mut self, offset: Duration) -> Result<(), String> {
        let (Some(sink), Some(bytes)) = (&self.sink, &self.buffered) else {
            return Err("no audio loaded".to_string());
        };

        let decoder = Decoder::new(Cursor::new(Arc::clone(bytes)))
            .map_err(|e| format!("audio decode failed: {}", e))?;

        if self.duration.is_none() {
            self.duration = decoder.total_duration().map(|d| d.as_secs_f64());
        }

        sink.stop();
        sink.append(decoder.skip_duration(offset));
        sink.set_volume(self.volume as f32 / 100.0);

        let now = Instant::now();
        self.clock.start_at(offset, now);
        if self.want_playing {
            sink.play();
            self.state = PlayerState::Playing;
        } else {
            sink.pause();
            self.clock.pause(now);
            self.state = PlayerState::Paused;
        }
        self.last_reported_second = offset.as_secs();
        Ok(())
    }

    fn on_fetched(&mut self, ticket: u64, result: Result<Arc<[u8]>, String>) {
        if self.active_ticket != Some(ticket) {
            tracing::debug!(ticket, "Dropping download for a track that is no longer loaded");
            return;
        }

        let attached = result.and_then(|bytes| {
            self.buffered = Some(bytes);
            self.attach(Duration::ZERO)
        });

        if let Err(reason) = attached {
            tracing::warn!(ticket, %reason, "Native playback failed");
            self.emit(BackendEvent::Error(reason));
            self.reset();
        }
    }

    fn reset(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
        self.state = PlayerState::Stopped;
        self.active_ticket = None;
        self.want_playing = false;
        self.buffered = None;
        self.clock.reset();
    }
}

impl PlaybackBackend for NativeAudioBackend {
    fn load(&mut self, source: &PlayableRef, ticket: u64, known_duration: Option<f64>) -> Result<(), PlayerError> {
        self.reset();

        match source {
            PlayableRef::Embed { url } => {
                return Err(PlayerError::PlaybackError(format!("{} can only be played in a browser", url)));
            }
            _ if self.sink.is_none() => {
                return Err(PlayerError::PlaybackError("no audio output device".to_string()));
            }
            _ => {}
        }

        self.active_ticket = Some(ticket);
        self.duration = known_duration.filter(|d| *d > 0.0);
        self.state = PlayerState::Loading;

        // Either way the bytes come back through fetch_rx and attach in tick()
        match source {
            PlayableRef::Stream { url } => self.spawn_download(url.clone(), ticket),
            PlayableRef::File { path } => self.spawn_read(path.clone(), ticket),
            PlayableRef::Embed { .. } => {}
        }
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        self.want_playing = true;
        if self.state == PlayerState::Paused {
            if let Some(sink) = &self.sink {
                sink.play();
            }
            self.clock.resume(Instant::now());
            self.state = PlayerState::Playing;
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.want_playing = false;
        if self.state == PlayerState::Playing {
            if let Some(sink) = &self.sink {
                sink.pause();
            }
            self.clock.pause(Instant::now());
            self.state = PlayerState::Paused;
        }
    }

    fn stop(&mut self) {
        self.reset();
    }

    fn seek(&mut self, fraction: f64) {
        let Some(duration) = self.duration else {
            return;
        };
        if self.buffered.is_none() {
            return;
        }

        let target = Duration::from_secs_f64(duration * fraction);
        if let Err(reason) = self.attach(target) {
            tracing::warn!(%reason, "Seek failed");
        }
    }

    fn current_time(&self) -> f64 {
        self.clock.position(Instant::now())
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn set_volume(&mut self, volume: u32) {
        self.volume = volume.min(100);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume as f32 / 100.0);
        }
    }

    fn tick(&mut self) {
        while let Ok((ticket, result)) = self.fetch_rx.try_recv() {
            self.on_fetched(ticket, result);
        }

        if self.state != PlayerState::Playing {
            return;
        }

        let position = self.current_time();
        let finished = self.sink.as_ref().map(Sink::empty).unwrap_or(false);

        match progress(position, finished, self.last_reported_second) {
            Progress::Ended => {
                self.emit(BackendEvent::Ended);
                self.state = PlayerState::Stopped;
                self.clock.reset();
            }
            Progress::Second(second) => {
                self.last_reported_second = second;
                self.emit(BackendEvent::TimeUpdate { position });
            }
            Progress::Unchanged => {}
        }
    }
}
