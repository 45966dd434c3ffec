// Main TUI application using ratatui
// Handles the terminal interface and user input, and forwards everything that
// touches playback to the PlaybackController it is given.

use anyhow::Context;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::PlayerError;
use crate::player::backend::EventReceiver;
use crate::player::controller::{NoticeKind, PlaybackController, TrackState};
use crate::player::queue::{EnqueueOutcome, EnqueuePosition};
use crate::player::track::{Provider, Track};
use crate::storage::KeyValueStore;

const VOLUME_STEP: u32 = 5;
const SEEK_STEP: f64 = 0.1;

type SearchResult = Result<Vec<Track>, PlayerError>;

#[derive(Clone, Copy)]
enum AppMode {
    Normal,
    Searching,
    // Typing a playlist name; from_queue saves the queue under it
    NamingPlaylist { from_queue: bool },
}

pub struct MusicPlayerApp<S: KeyValueStore> {
    controller: PlaybackController<S>,
    player_events: EventReceiver,
    provider: Provider,
    search_results: Vec<Track>,
    selected_result: usize,
    selected_queue_item: usize,
    selected_playlist: usize,
    search_query: String,
    playlist_name: String,
    mode: AppMode,
    should_quit: bool,
    is_searching: bool,
    search_rx: mpsc::UnboundedReceiver<SearchResult>,
    search_tx: mpsc::UnboundedSender<SearchResult>,
    status_message: String,
    status_is_warning: bool,
}

impl<S: KeyValueStore> MusicPlayerApp<S> {
    pub fn new(controller: PlaybackController<S>, player_events: EventReceiver) -> Self {
        let (search_tx, search_rx) = mpsc::unbounded_channel();
        let selected_queue_item = controller.queue().current_index().unwrap_or(0);

        MusicPlayerApp {
            controller,
            player_events,
            provider: Provider::Youtube,
            search_results: Vec::new(),
            selected_result: 0,
            selected_queue_item,
            selected_playlist: 0,
            search_query: String::new(),
            playlist_name: String::new(),
            mode: AppMode::Normal,
            should_quit: false,
            is_searching: false,
            search_rx,
            search_tx,
            status_message: String::new(),
            status_is_warning: false,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Always give the terminal back, even when the loop failed
        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> anyhow::Result<()> {
        loop {
            terminal.draw(|f| self.draw_ui(f))?;

            // Search results from the background task
            while let Ok(result) = self.search_rx.try_recv() {
                self.on_search_result(result);
            }

            // Resolutions and backend notifications, applied one at a time
            while let Ok(event) = self.player_events.try_recv() {
                self.controller.handle_event(event);
            }
            self.controller.tick();

            for notice in self.controller.drain_notices() {
                self.set_status(notice.message, notice.kind == NoticeKind::Warning);
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                    }
                }
            }

            if self.should_quit {
                tracing::info!("Quitting");
                return Ok(());
            }
        }
    }

    fn set_status(&mut self, message: impl Into<String>, warning: bool) {
        self.status_message = message.into();
        self.status_is_warning = warning;
    }

    fn draw_ui(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(6),
            ])
            .split(frame.size());

        // Header
        let title = match self.mode {
            AppMode::Searching => format!("Search {}: {}_", self.provider.label(), self.search_query),
            AppMode::NamingPlaylist { from_queue: true } => format!("Save queue as playlist: {}_", self.playlist_name),
            AppMode::NamingPlaylist { from_queue: false } => format!("New playlist name: {}_", self.playlist_name),
            AppMode::Normal if self.is_searching => "Searching... please wait".to_string(),
            AppMode::Normal if !self.status_message.is_empty() => self.status_message.clone(),
            AppMode::Normal => {
                "[/]Search [Tab]Provider [Enter]Add [N]Play next [o]Play [Space]Pause [n/p]Next/Prev [s]Shuffle [r]Repeat [d]Remove [+/-]Move [c]Clear [l]Like [S]Save queue [P]New list [a]Add to list [L]Load list [X]Delete list [q]Quit".to_string()
            }
        };
        let header_style = if self.status_is_warning && matches!(self.mode, AppMode::Normal) {
            Style::default().fg(Color::Red)
        } else {
            Style::default()
        };
        let header = Paragraph::new(title)
            .style(header_style)
            .block(Block::default().borders(Borders::ALL).title("Catalog Player"));
        frame.render_widget(header, chunks[0]);

        // Main area - split between search results and queue
        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        let results: Vec<ListItem> = self
            .search_results
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let style = if i == self.selected_result {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(Self::track_line(track)).style(style)
            })
            .collect();

        let left_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(7)])
            .split(main_chunks[0]);

        let results_title = format!("Search Results ({}) [j/k]", self.provider.label());
        let results_list = List::new(results).block(Block::default().borders(Borders::ALL).title(results_title));
        frame.render_widget(results_list, left_chunks[0]);

        let playlists: Vec<ListItem> = self
            .controller
            .playlists()
            .iter()
            .enumerate()
            .map(|(i, playlist)| {
                let style = if i == self.selected_playlist {
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(format!("{} ({} tracks)", playlist.name, playlist.tracks.len())).style(style)
            })
            .collect();
        let playlists_list = List::new(playlists).block(Block::default().borders(Borders::ALL).title("Playlists [[/]]"));
        frame.render_widget(playlists_list, left_chunks[1]);

        let queue = self.controller.queue();
        let queue_items: Vec<ListItem> = queue
            .tracks()
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let marker = if queue.current_index() == Some(i) { "▶ " } else { "  " };
                let liked = if self.controller.is_liked(&track.key()) { " ♥" } else { "" };
                let content = format!("{}{}{}", marker, Self::track_line(track), liked);
                let style = if i == self.selected_queue_item {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(content).style(style)
            })
            .collect();

        let queue_list = List::new(queue_items).block(Block::default().borders(Borders::ALL).title("Queue [J/K]"));
        frame.render_widget(queue_list, main_chunks[1]);

        // Player info
        let session = self.controller.session();
        let now_playing = match self.controller.loaded_track() {
            Some(track) => format!("Now Playing: {} [{}]", track.display_name(), track.provider.label()),
            None => "No track playing".to_string(),
        };

        let state_str = match session.state {
            TrackState::Playing => "▶ Playing",
            TrackState::Paused => "⏸ Paused",
            TrackState::Loading | TrackState::Ready => "… Loading",
            TrackState::Error => "✖ Error",
            TrackState::Idle | TrackState::Ended => "⏹ Stopped",
        };

        let time_pos = self.controller.current_time();
        let time_str = match self.controller.duration() {
            Some(duration) => format!("{} / {}", Self::format_time(time_pos), Self::format_time(duration)),
            None => Self::format_time(time_pos),
        };

        let settings = self.controller.settings();
        let player_info = format!(
            "{}\nState: {} | Volume: {}% | Time: {}\nShuffle: {} | Repeat: {} | Queue: {} tracks | Liked: {} | Listened: {}\nRecent: {}",
            now_playing,
            state_str,
            settings.volume,
            time_str,
            if settings.shuffle { "on" } else { "off" },
            settings.repeat.label(),
            queue.len(),
            self.controller.liked().len(),
            Self::format_listening(self.controller.listening_secs()),
            self.controller.recent_searches().join(", "),
        );

        let player_widget = Paragraph::new(player_info).block(Block::default().borders(Borders::ALL).title("Player"));
        frame.render_widget(player_widget, chunks[2]);
    }

    fn handle_input(&mut self, key: KeyCode) {
        // Clear status message on any key press (except when searching)
        if matches!(self.mode, AppMode::Normal) {
            self.status_message.clear();
            self.status_is_warning = false;
        }

        match self.mode {
            AppMode::Searching => match key {
                KeyCode::Char(c) => self.search_query.push(c),
                KeyCode::Backspace => {
                    self.search_query.pop();
                }
                KeyCode::Tab => self.provider = self.provider.next(),
                KeyCode::Enter => {
                    let query = std::mem::take(&mut self.search_query);
                    self.perform_search(&query);
                    self.mode = AppMode::Normal;
                }
                KeyCode::Esc => {
                    self.mode = AppMode::Normal;
                    self.search_query.clear();
                }
                _ => {}
            },
            AppMode::NamingPlaylist { from_queue } => match key {
                KeyCode::Char(c) => self.playlist_name.push(c),
                KeyCode::Backspace => {
                    self.playlist_name.pop();
                }
                KeyCode::Enter => {
                    let name = std::mem::take(&mut self.playlist_name);
                    self.mode = AppMode::Normal;
                    self.create_playlist(&name, from_queue);
                }
                KeyCode::Esc => {
                    self.mode = AppMode::Normal;
                    self.playlist_name.clear();
                }
                _ => {}
            },
            AppMode::Normal => match key {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('/') => self.mode = AppMode::Searching,
                KeyCode::Tab => {
                    self.provider = self.provider.next();
                    self.set_status(format!("Searching {}", self.provider.label()), false);
                }
                KeyCode::Char(' ') => self.controller.toggle_play_pause(),
                KeyCode::Char('n') => self.controller.next(),
                KeyCode::Char('p') => self.controller.previous(),
                KeyCode::Char('o') => self.play_selected(),
                KeyCode::Char('s') => self.toggle_shuffle(),
                KeyCode::Char('r') => {
                    let repeat = self.controller.cycle_repeat();
                    self.set_status(format!("Repeat: {}", repeat.label()), false);
                }
                KeyCode::Char('d') => self.remove_selected(),
                KeyCode::Char('c') => {
                    self.controller.clear();
                    self.selected_queue_item = 0;
                    self.set_status("Queue cleared", false);
                }
                KeyCode::Char('l') => self.like_selected(),
                KeyCode::Up => self.change_volume(true),
                KeyCode::Down => self.change_volume(false),
                KeyCode::Right => self.seek_relative(SEEK_STEP),
                KeyCode::Left => self.seek_relative(-SEEK_STEP),
                KeyCode::Char('j') => self.move_result_selection(true),
                KeyCode::Char('k') => self.move_result_selection(false),
                KeyCode::Char('J') => self.move_queue_selection(true),
                KeyCode::Char('K') => self.move_queue_selection(false),
                KeyCode::Enter => self.add_selected_to_queue(EnqueuePosition::End),
                KeyCode::Char('N') => self.add_selected_to_queue(EnqueuePosition::Next),
                KeyCode::Char('+') => self.move_selected_entry(true),
                KeyCode::Char('-') => self.move_selected_entry(false),
                KeyCode::Char('S') => self.mode = AppMode::NamingPlaylist { from_queue: true },
                KeyCode::Char('P') => self.mode = AppMode::NamingPlaylist { from_queue: false },
                KeyCode::Char(']') => self.move_playlist_selection(true),
                KeyCode::Char('[') => self.move_playlist_selection(false),
                KeyCode::Char('a') => self.add_selected_to_playlist(),
                KeyCode::Char('L') => self.load_selected_playlist(),
                KeyCode::Char('X') => self.delete_selected_playlist(),
                _ => {}
            },
        }
    }

    fn perform_search(&mut self, query: &str) {
        if query.trim().is_empty() {
            return;
        }

        // Mark as searching
        self.is_searching = true;

        // The future doesn't borrow the controller, await it in the background
        let search = self.controller.search(self.provider, query.trim());
        let tx = self.search_tx.clone();

        tokio::spawn(async move {
            let _ = tx.send(search.await);
        });
    }

    fn on_search_result(&mut self, result: SearchResult) {
        self.is_searching = false;
        match result {
            Ok(results) => {
                self.set_status(format!("Found {} results", results.len()), false);
                self.search_results = results;
                self.selected_result = 0;
            }
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn play_selected(&mut self) {
        if let Err(e) = self.controller.play_track_at(self.selected_queue_item) {
            self.set_status(e.to_string(), true);
        }
    }

    fn toggle_shuffle(&mut self) {
        let shuffle = !self.controller.settings().shuffle;
        self.controller.set_shuffle(shuffle);
        self.set_status(format!("Shuffle: {}", if shuffle { "on" } else { "off" }), false);
    }

    fn remove_selected(&mut self) {
        match self.controller.remove_at(self.selected_queue_item) {
            Ok(track) => {
                let len = self.controller.queue().len();
                self.selected_queue_item = self.selected_queue_item.min(len.saturating_sub(1));
                self.set_status(format!("Removed '{}'", track.title), false);
            }
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn like_selected(&mut self) {
        match self.controller.toggle_like(self.selected_queue_item) {
            Ok(true) => self.set_status("Added to liked tracks", false),
            Ok(false) => self.set_status("Removed from liked tracks", false),
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn change_volume(&mut self, up: bool) {
        let current = self.controller.settings().volume;
        let volume = if up {
            (current + VOLUME_STEP).min(100)
        } else {
            current.saturating_sub(VOLUME_STEP)
        };
        self.controller.set_volume(volume);
    }

    fn seek_relative(&mut self, delta: f64) {
        if let Some(duration) = self.controller.duration() {
            let fraction = self.controller.current_time() / duration + delta;
            self.controller.seek(fraction);
        }
    }

    // Swaps the selected queue entry with its neighbour, selection follows it
    fn move_selected_entry(&mut self, down: bool) {
        let len = self.controller.queue().len();
        if len < 2 {
            return;
        }
        let from = self.selected_queue_item;
        let to = Self::step_selection(from, len, down);
        match self.controller.move_entry(from, to) {
            Ok(()) => self.selected_queue_item = to,
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    // ==========================================
    // PLAYLISTS
    // ==========================================
    fn create_playlist(&mut self, name: &str, from_queue: bool) {
        let created = if from_queue {
            self.controller.save_queue_as_playlist(name)
        } else {
            self.controller.create_playlist(name, "")
        };
        match created {
            Ok(_) => {
                self.selected_playlist = self.controller.playlists().len().saturating_sub(1);
                self.set_status(format!("Playlist '{}' saved", name.trim()), false);
            }
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn selected_playlist_id(&self) -> Option<String> {
        self.controller
            .playlists()
            .get(self.selected_playlist)
            .map(|playlist| playlist.id.clone())
    }

    fn move_playlist_selection(&mut self, down: bool) {
        let len = self.controller.playlists().len();
        self.selected_playlist = Self::step_selection(self.selected_playlist, len, down);
    }

    fn add_selected_to_playlist(&mut self) {
        let Some(id) = self.selected_playlist_id() else {
            self.set_status("No playlists yet, press P to create one", false);
            return;
        };
        match self.controller.add_to_playlist(&id, self.selected_queue_item) {
            Ok(true) => self.set_status("Added to playlist", false),
            Ok(false) => self.set_status("Already in that playlist", false),
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn load_selected_playlist(&mut self) {
        let Some(id) = self.selected_playlist_id() else {
            return;
        };
        match self.controller.load_playlist(&id) {
            Ok(()) => {
                self.selected_queue_item = 0;
                self.set_status("Playlist loaded into the queue", false);
            }
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn delete_selected_playlist(&mut self) {
        let Some(id) = self.selected_playlist_id() else {
            return;
        };
        match self.controller.delete_playlist(&id) {
            Ok(()) => {
                let len = self.controller.playlists().len();
                self.selected_playlist = self.selected_playlist.min(len.saturating_sub(1));
                self.set_status("Playlist deleted", false);
            }
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn move_result_selection(&mut self, down: bool) {
        self.selected_result = Self::step_selection(self.selected_result, self.search_results.len(), down);
    }

    fn move_queue_selection(&mut self, down: bool) {
        let len = self.controller.queue().len();
        self.selected_queue_item = Self::step_selection(self.selected_queue_item, len, down);
    }

    // Wrapping list navigation
    fn step_selection(selected: usize, len: usize, down: bool) -> usize {
        if len == 0 {
            0
        } else if down {
            (selected + 1) % len
        } else if selected == 0 {
            len - 1
        } else {
            selected - 1
        }
    }

    fn add_selected_to_queue(&mut self, position: EnqueuePosition) {
        let track = match self.search_results.get(self.selected_result) {
            Some(track) => track.clone(),
            None => return,
        };

        let title = track.title.clone();
        let was_empty = self.controller.queue().is_empty();
        match self.controller.enqueue(track, position) {
            EnqueueOutcome::AlreadyQueued(index) => {
                self.selected_queue_item = index;
                self.set_status(format!("'{}' is already in the queue", title), false);
            }
            EnqueueOutcome::Added(_) if was_empty => {
                self.set_status(format!("Added '{}' to queue! Press Space to play", title), false);
            }
            EnqueueOutcome::Added(_) => {
                let total = self.controller.queue().len();
                self.set_status(format!("Added '{}' to queue! ({} total)", title, total), false);
            }
        }
    }

    fn track_line(track: &Track) -> String {
        match track.duration_seconds {
            Some(seconds) => format!("{} [{}]", track.display_name(), Self::format_time(seconds as f64)),
            None => track.display_name(),
        }
    }

    fn format_listening(seconds: u64) -> String {
        format!("{}h{:02}m", seconds / 3600, (seconds % 3600) / 60)
    }

    fn format_time(seconds: f64) -> String {
        let mins = (seconds / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{:02}:{:02}", mins, secs)
    }
}
