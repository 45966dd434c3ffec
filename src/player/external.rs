// External player backend for tracks that only come as an embeddable page
// (Spotify). The page is opened in the system browser or desktop app; from
// then on we can't control the audio, so playback time is followed with a
// wall clock against the known duration and "ended" is reported when it runs
// out. Pause/resume only affect that clock.

use std::time::{Duration, Instant};

use crate::error::PlayerError;
use crate::player::audio::PlaybackClock;
use crate::player::backend::{BackendEvent, EventSender, PlaybackBackend, PlayerEvent};
use crate::player::track::PlayableRef;

pub type Launcher = fn(&str) -> std::io::Result<()>;

fn open_in_browser(url: &str) -> std::io::Result<()> {
    open::that(url)
}

pub struct ExternalBackend {
    launcher: Launcher,
    events: EventSender,
    url: Option<String>,
    ticket: Option<u64>,
    launched: bool,
    duration: Option<f64>,
    clock: PlaybackClock,
    paused: bool,
    last_reported_second: u64,
}

impl ExternalBackend {
    pub fn new(events: EventSender) -> Self {
        Self::with_launcher(events, open_in_browser)
    }

    pub fn with_launcher(events: EventSender, launcher: Launcher) -> Self {
        ExternalBackend {
            launcher,
            events,
            url: None,
            ticket: None,
            launched: false,
            duration: None,
            clock: PlaybackClock::default(),
            paused: false,
            last_reported_second: 0,
        }
    }
}

impl PlaybackBackend for ExternalBackend {
    fn load(&mut self, source: &PlayableRef, ticket: u64, known_duration: Option<f64>) -> Result<(), PlayerError> {
        self.stop();

        let url = match source {
            PlayableRef::Embed { url } | PlayableRef::Stream { url } => url.clone(),
            PlayableRef::File { path } => {
                return Err(PlayerError::PlaybackError(format!(
                    "{} is a local file, not an external page",
                    path.display()
                )))
            }
        };

        self.url = Some(url);
        self.ticket = Some(ticket);
        self.duration = known_duration.filter(|d| *d > 0.0);
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        let Some(url) = self.url.clone() else {
            return Ok(());
        };

        let now = Instant::now();
        if !self.launched {
            (self.launcher)(&url)
                .map_err(|e| PlayerError::PlaybackError(format!("Failed to open {}: {}", url, e)))?;
            tracing::info!(%url, "Opened track in external player");
            self.launched = true;
            self.clock.start_at(Duration::ZERO, now);
        } else if self.paused {
            self.clock.resume(now);
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        if self.launched && !self.paused {
            tracing::debug!("External playback can't be paused remotely, pausing the clock only");
            self.clock.pause(Instant::now());
            self.paused = true;
        }
    }

    fn stop(&mut self) {
        self.url = None;
        self.ticket = None;
        self.launched = false;
        self.paused = false;
        self.duration = None;
        self.clock.reset();
        self.last_reported_second = 0;
    }

    fn seek(&mut self, fraction: f64) {
        if let Some(duration) = self.duration {
            let now = Instant::now();
            self.clock.start_at(Duration::from_secs_f64(duration * fraction), now);
            if self.paused {
                self.clock.pause(now);
            }
        }
    }

    fn current_time(&self) -> f64 {
        self.clock.position(Instant::now())
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn tick(&mut self) {
        let (Some(ticket), Some(duration)) = (self.ticket, self.duration) else {
            return;
        };
        if !self.launched || self.paused {
            return;
        }

        let position = self.current_time();
        if position >= duration {
            let _ = self.events.send(PlayerEvent::Backend {
                ticket,
                event: BackendEvent::Ended,
            });
            self.stop();
            return;
        }

        let second = position as u64;
        if second != self.last_reported_second {
            self.last_reported_second = second;
            let _ = self.events.send(PlayerEvent::Backend {
                ticket,
                event: BackendEvent::TimeUpdate { position },
            });
        }
    }
}
