// ==========================================
// PLAYBACK BACKENDS
// ==========================================
// The controller never talks to rodio or the browser directly. It only
// knows this capability set, with one implementation per provider family:
//
// - NativeAudioBackend (audio.rs): decodes streams and files with rodio
// - ExternalBackend (external.rs): hands embed-only tracks to the system
//
// Backends report back asynchronously (track ended, failed, time moved)
// through the same channel the controller uses for resolution results. Every
// notification carries the ticket the track was loaded with, so anything from
// a previous load can be recognised and dropped.

use std::collections::HashMap;
use tokio::sync::mpsc;

use crate::error::PlayerError;
use crate::player::track::{BackendKind, PlayableRef};

#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Ended,
    Error(String),
    TimeUpdate { position: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    // A deferred PlayableRef finished resolving
    Resolved {
        ticket: u64,
        result: Result<PlayableRef, PlayerError>,
    },
    Backend {
        ticket: u64,
        event: BackendEvent,
    },
}

pub type EventSender = mpsc::UnboundedSender<PlayerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

pub trait PlaybackBackend {
    // Prepares `source` for playback. A backend may finish loading in the
    // background; failures found later are reported as BackendEvent::Error.
    fn load(&mut self, source: &PlayableRef, ticket: u64, known_duration: Option<f64>) -> Result<(), PlayerError>;

    fn play(&mut self) -> Result<(), PlayerError>;

    fn pause(&mut self);

    // Unloads whatever is playing. Must leave the backend silent.
    fn stop(&mut self);

    // fraction of the duration, already clamped to 0.0..=1.0 by the caller
    fn seek(&mut self, fraction: f64);

    fn current_time(&self) -> f64;

    fn duration(&self) -> Option<f64>;

    fn set_volume(&mut self, _volume: u32) {}

    // Called from the UI loop so backends can poll their outputs
    fn tick(&mut self) {}
}

// One backend per family, looked up by the track's provider
#[derive(Default)]
pub struct BackendSet {
    backends: HashMap<BackendKind, Box<dyn PlaybackBackend>>,
}

impl BackendSet {
    pub fn new() -> Self {
        BackendSet::default()
    }

    pub fn with(mut self, kind: BackendKind, backend: Box<dyn PlaybackBackend>) -> Self {
        self.backends.insert(kind, backend);
        self
    }

    pub fn get(&self, kind: BackendKind) -> Option<&dyn PlaybackBackend> {
        self.backends.get(&kind).map(|b| b.as_ref())
    }

    pub fn get_mut(&mut self, kind: BackendKind) -> Option<&mut (dyn PlaybackBackend + 'static)> {
        self.backends.get_mut(&kind).map(|b| b.as_mut())
    }

    pub fn for_each(&mut self, mut f: impl FnMut(&mut dyn PlaybackBackend)) {
        for backend in self.backends.values_mut() {
            f(backend.as_mut());
        }
    }
}
