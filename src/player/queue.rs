// ==========================================
// QUEUE MANAGEMENT MODULE
// ==========================================
// This module manages the playback queue for the music player.
// It handles:
// - Adding tracks to the queue without duplicates
// - Tracking which entry is current
// - Picking the next/previous entry for the shuffle and repeat settings
//
// Unlike a "pop as you play" queue, tracks stay in place after being
// played. The queue is one ordered list plus a pointer into it, which is what
// makes repeat-all and going backwards possible.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::PlayerError;
use crate::player::track::{Track, TrackKey};

// ==========================================
// REPEAT MODE
// ==========================================
// Three states, not a boolean: "one" restarts the current track when it
// ends on its own, "all" wraps from the last entry back to the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    // off -> all -> one -> off, the order most players use for one button
    pub fn cycle(self) -> RepeatMode {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuePosition {
    End,  // after everything else
    Next, // right after the current entry
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Added(usize),
    AlreadyQueued(usize),
}

impl EnqueueOutcome {
    pub fn index(self) -> usize {
        match self {
            EnqueueOutcome::Added(i) | EnqueueOutcome::AlreadyQueued(i) => i,
        }
    }
}

// Result of asking the queue where to go next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Play(usize),
    Stop,
}

// ==========================================
// QUEUE STRUCT
// ==========================================
// Fields:
//
// tracks: Vec<Track>
//   - Every queued track in play order, never two with the same TrackKey
//
// current_index: Option<usize>
//   - None when the queue is empty or nothing was selected yet
//   - Otherwise always a valid index into `tracks`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    tracks: Vec<Track>,
    current_index: Option<usize>,
}

impl Queue {
    // ==========================================
    // RESTORE
    // ==========================================
    // Rebuilds a queue from persisted parts, rejecting anything that breaks
    // the invariants (duplicate identities, dangling current index).
    pub fn restore(tracks: Vec<Track>, current_index: Option<usize>) -> Result<Self, String> {
        let mut seen = HashSet::new();
        for track in &tracks {
            if !seen.insert(track.key()) {
                return Err(format!("duplicate queue entry {}", track.key()));
            }
        }

        if let Some(index) = current_index {
            if index >= tracks.len() {
                return Err(format!(
                    "current index {} outside queue of {} tracks",
                    index,
                    tracks.len()
                ));
            }
        }

        Ok(Queue {
            tracks,
            current_index,
        })
    }

    // Builds a fresh queue from a saved list, e.g. a playlist. Repeated
    // identities are kept once and the first entry becomes current.
    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let mut queue = Queue::default();
        for track in tracks {
            queue.enqueue(track, EnqueuePosition::End);
        }
        queue.current_index = if queue.is_empty() { None } else { Some(0) };
        queue
    }

    // Re-checks a queue that came straight out of serde
    pub fn validated(self) -> Result<Self, String> {
        Queue::restore(self.tracks, self.current_index)
    }

    // ==========================================
    // ADDING TRACKS: enqueue()
    // ==========================================
    // Adds a track at the end or right after the current entry.
    //
    // If the track is already queued it is not added again; instead the
    // current pointer moves to the existing entry. If the queue was empty the
    // new track becomes current.
    pub fn enqueue(&mut self, track: Track, position: EnqueuePosition) -> EnqueueOutcome {
        if let Some(existing) = self.position_of(&track.key()) {
            self.current_index = Some(existing);
            return EnqueueOutcome::AlreadyQueued(existing);
        }

        let index = match (position, self.current_index) {
            (EnqueuePosition::Next, Some(current)) => current + 1,
            _ => self.tracks.len(),
        };
        self.tracks.insert(index, track);

        if self.current_index.is_none() && self.tracks.len() == 1 {
            self.current_index = Some(0);
        }

        EnqueueOutcome::Added(index)
    }

    // ==========================================
    // QUEUE MANAGEMENT: remove_at()
    // ==========================================
    // Removes the entry at `index` and keeps the current pointer on the same
    // track when possible.
    //
    // Removing the current entry clamps the pointer: the entry that slid into
    // its place becomes current, or the new last entry if it was the last one.
    pub fn remove_at(&mut self, index: usize) -> Result<Track, PlayerError> {
        if index >= self.tracks.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }

        let removed = self.tracks.remove(index);

        self.current_index = match self.current_index {
            _ if self.tracks.is_empty() => None,
            Some(current) if index < current => Some(current - 1),
            Some(current) if index == current => Some(current.min(self.tracks.len() - 1)),
            other => other,
        };

        Ok(removed)
    }

    // ==========================================
    // QUEUE MANAGEMENT: move_entry()
    // ==========================================
    // Moves one entry to a new position. The current pointer follows the
    // track it pointed at, whether that is the moved entry or one that
    // shifted to make room.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<(), PlayerError> {
        let len = self.tracks.len();
        for index in [from, to] {
            if index >= len {
                return Err(PlayerError::IndexOutOfRange { index, len });
            }
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        self.current_index = self.current_index.map(|current| {
            if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            }
        });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current_index = None;
    }

    pub fn set_current(&mut self, index: usize) -> Result<(), PlayerError> {
        if index >= self.tracks.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }
        self.current_index = Some(index);
        Ok(())
    }

    // ==========================================
    // QUEUE INSPECTION
    // ==========================================
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.tracks.get(i))
    }

    pub fn position_of(&self, key: &TrackKey) -> Option<usize> {
        self.tracks
            .iter()
            .position(|t| t.provider == key.provider && t.id == key.id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    // ==========================================
    // NAVIGATION: next_step()
    // ==========================================
    // Decides which entry a forward skip lands on.
    //
    // - shuffle: uniformly random entry, never the current one when there is
    //   a choice
    // - otherwise: the following entry; past the end only repeat-all wraps,
    //   anything else stops
    //
    // repeat-one is not handled here: a manual skip always advances, and the
    // natural end-of-track restart is the controller's job.
    pub fn next_step<R: Rng + ?Sized>(&self, shuffle: bool, repeat: RepeatMode, rng: &mut R) -> Step {
        if self.tracks.is_empty() {
            return Step::Stop;
        }

        if shuffle {
            return Step::Play(self.random_index(rng));
        }

        match self.current_index {
            None => Step::Play(0),
            Some(current) if current + 1 < self.tracks.len() => Step::Play(current + 1),
            Some(_) if repeat == RepeatMode::All => Step::Play(0),
            Some(_) => Step::Stop,
        }
    }

    // ==========================================
    // NAVIGATION: previous_step()
    // ==========================================
    // Backwards always wraps around, whatever the repeat mode.
    pub fn previous_step<R: Rng + ?Sized>(&self, shuffle: bool, rng: &mut R) -> Step {
        if self.tracks.is_empty() {
            return Step::Stop;
        }

        if shuffle {
            return Step::Play(self.random_index(rng));
        }

        let len = self.tracks.len();
        match self.current_index {
            None => Step::Play(len - 1),
            Some(current) => Step::Play((current + len - 1) % len),
        }
    }

    // Uniform over every entry except the current one
    fn random_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let len = self.tracks.len();
        match self.current_index {
            Some(current) if len > 1 => {
                let pick = rng.gen_range(0..len - 1);
                if pick >= current {
                    pick + 1
                } else {
                    pick
                }
            }
            Some(current) => current,
            None => rng.gen_range(0..len),
        }
    }
}
