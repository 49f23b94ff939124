use crate::config;
use crate::engine::SimulatedEngine;
use crate::lookup::{CatalogLookup, LookupWorker, TrackLookup};
use crate::model::{PlaybackState, PlayerEvent, Theme, Track};
use crate::storage::{FileStore, Persistence};
use crate::store::{Advance, DownloadTicket, PlayerStore};
use anyhow::Result;
use log::{info, warn};
use std::io::{self, BufRead, Write, stdin, stdout};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

const SIMULATED_DOWNLOAD_TIME: Duration = Duration::from_secs(2);
const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Default, Clone)]
pub struct AppStartupOptions {
    pub catalog: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let root = config::ensure_config_dir(options.config_dir.as_deref())?;
    let storage_path = config::storage_path_in(&root);
    let catalog = match options.catalog {
        Some(path) => CatalogLookup::from_path(&path)?,
        None => {
            let default_path = config::catalog_path_in(&root);
            if default_path.exists() {
                CatalogLookup::from_path(&default_path)?
            } else {
                warn!("no catalog at {}; search will be empty", default_path.display());
                CatalogLookup::default()
            }
        }
    };
    info!(
        "catalog has {} tracks; storage at {}",
        catalog.len(),
        storage_path.display()
    );

    let mut store = PlayerStore::new(
        SimulatedEngine::new(),
        Persistence::new(FileStore::open(&storage_path)),
    );
    store.initialize();
    let worker = LookupWorker::spawn(catalog.clone());
    let mut shell = Shell::new(store, catalog, worker);

    let mut out = stdout();
    writeln!(out, "Tones. Type `help` for commands.")?;
    drive(&mut shell, spawn_stdin_reader(), &mut out)
}

/// Runs commands as lines arrive, pumping the shell every tick in between.
pub fn drive<L: TrackLookup>(
    shell: &mut Shell<L>,
    lines: Receiver<io::Result<String>>,
    out: &mut impl Write,
) -> Result<()> {
    write!(out, "> ")?;
    out.flush()?;
    loop {
        let input = match lines.recv_timeout(TICK) {
            Ok(line) => Some(line?),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let notes = shell.pump();
        if !notes.is_empty() {
            writeln!(out)?;
            for note in notes {
                writeln!(out, "{note}")?;
            }
            if input.is_none() {
                write!(out, "> ")?;
                out.flush()?;
            }
        }

        let Some(line) = input else {
            continue;
        };
        match shell.run_command(&line) {
            Reply::Quit => break,
            Reply::Message(message) => {
                if !message.is_empty() {
                    writeln!(out, "{message}")?;
                }
            }
        }
        for note in shell.pump() {
            writeln!(out, "{note}")?;
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    Ok(())
}

/// Reads stdin on its own thread so the shell keeps pumping while idle.
fn spawn_stdin_reader() -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Message(String),
    Quit,
}

pub struct Shell<L: TrackLookup> {
    store: PlayerStore<SimulatedEngine>,
    lookup: L,
    worker: LookupWorker,
    events: Receiver<PlayerEvent>,
    results: Vec<Track>,
    downloads: Vec<(DownloadTicket, Instant)>,
}

impl<L: TrackLookup> Shell<L> {
    pub fn new(mut store: PlayerStore<SimulatedEngine>, lookup: L, worker: LookupWorker) -> Self {
        let events = store.subscribe();
        Self {
            store,
            lookup,
            worker,
            events,
            results: Vec::new(),
            downloads: Vec::new(),
        }
    }

    pub fn store(&self) -> &PlayerStore<SimulatedEngine> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PlayerStore<SimulatedEngine> {
        &mut self.store
    }

    /// Feeds engine events, finished lookups and due downloads into the store.
    pub fn pump(&mut self) -> Vec<String> {
        let mut notes = Vec::new();

        for advance in self.store.pump_engine() {
            self.route(advance, &mut notes);
        }

        while let Some(response) = self.worker.try_recv() {
            if let Some(track) = self.store.complete_related(response) {
                notes.push(format!("Auto-play: {}", track.label()));
            }
        }

        let now = Instant::now();
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.downloads)
            .into_iter()
            .partition(|(_, ready_at)| *ready_at <= now);
        self.downloads = waiting;
        for (ticket, _) in due {
            let title = ticket.track.title.clone();
            match self.store.complete_download(ticket) {
                Some(song) => notes.push(format!("Downloaded {} ({})", song.track.title, song.size)),
                None => notes.push(format!("Download of {title} cancelled: track changed")),
            }
        }

        while let Ok(event) = self.events.try_recv() {
            if let PlayerEvent::Error(err) = event {
                notes.push(format!("error: {err}"));
            }
        }
        notes
    }

    pub fn run_command(&mut self, raw: &str) -> Reply {
        let input = raw.trim();
        if input.is_empty() {
            return Reply::Message(String::new());
        }

        let mut command_split = input.splitn(2, char::is_whitespace);
        let command = command_split.next().unwrap_or_default();
        let rest = command_split.next().unwrap_or("").trim();

        let message = match command {
            "help" => String::from(
                "Commands: search <q> | trending [genre] | play <n> | queue [<n>] | next | pause | resume | stop | clear | like [<n>] | likes | autoplay on|off | volume <0-100> | download | downloads | recent | theme light|dark|system | status | quit",
            ),
            "quit" | "exit" => return Reply::Quit,
            "search" => {
                if rest.is_empty() {
                    String::from("Usage: search <query>")
                } else {
                    let found = self.lookup.search(rest);
                    self.show_results(found)
                }
            }
            "trending" => {
                let found = if rest.is_empty() {
                    self.lookup.trending()
                } else {
                    self.lookup.trending_by_genre(rest)
                };
                self.show_results(found)
            }
            "play" => match self.pick(rest) {
                Ok(track) => match self.store.play(track.clone()) {
                    Ok(()) => format!("Playing {}", track.label()),
                    Err(err) => format!("playback error: {err}"),
                },
                Err(usage) => usage,
            },
            "queue" => {
                if rest.is_empty() {
                    self.describe_queue()
                } else {
                    match self.pick(rest) {
                        Ok(track) => {
                            let label = track.label();
                            match self.store.enqueue(track) {
                                Ok(()) => format!("Queued {label}"),
                                Err(err) => format!("queue error: {err}"),
                            }
                        }
                        Err(usage) => usage,
                    }
                }
            }
            "next" => match self.store.play_next() {
                Ok(advance) => {
                    let mut notes = Vec::new();
                    self.route(advance, &mut notes);
                    notes.join("\n")
                }
                Err(err) => format!("playback error: {err}"),
            },
            "pause" => {
                let before = self.store.state();
                self.store.pause();
                if before != PlaybackState::Paused && self.store.state() == PlaybackState::Paused {
                    String::from("Paused")
                } else {
                    format!("Nothing to pause ({})", before.label())
                }
            }
            "resume" => {
                let before = self.store.state();
                match self.store.resume() {
                    Ok(()) if before == PlaybackState::Paused => String::from("Resumed"),
                    Ok(()) => format!("Nothing to resume ({})", before.label()),
                    Err(err) => format!("playback error: {err}"),
                }
            }
            "stop" => {
                self.store.stop();
                String::from("Stopped")
            }
            "clear" => {
                self.store.clear_queue();
                String::from("Queue cleared")
            }
            "like" => {
                let target = if rest.is_empty() {
                    self.store
                        .current_track()
                        .cloned()
                        .ok_or_else(|| String::from("Nothing is playing"))
                } else {
                    self.pick(rest)
                };
                match target {
                    Ok(track) => match self.store.toggle_like(&track) {
                        Ok(true) => format!("Liked {}", track.label()),
                        Ok(false) => format!("Unliked {}", track.label()),
                        Err(err) => format!("like error: {err}"),
                    },
                    Err(usage) => usage,
                }
            }
            "likes" => list_tracks("Liked songs", self.store.liked_songs()),
            "recent" => list_tracks("Recently played", self.store.recently_played()),
            "autoplay" => match rest {
                "on" => {
                    self.store.set_auto_play(true);
                    String::from("Auto-play on")
                }
                "off" => {
                    self.store.set_auto_play(false);
                    String::from("Auto-play off")
                }
                _ => String::from("Usage: autoplay on|off"),
            },
            "volume" => match rest.parse::<u8>() {
                Ok(volume) => {
                    self.store.set_volume(volume);
                    format!("Volume: {}%", self.store.volume())
                }
                Err(_) => String::from("Usage: volume <0-100>"),
            },
            "theme" => match Theme::parse(rest) {
                Some(theme) => {
                    self.store.set_theme(theme);
                    format!("Theme: {}", theme.as_str())
                }
                None => String::from("Usage: theme light|dark|system"),
            },
            "download" => match self.store.begin_download() {
                Some(ticket) => {
                    let title = ticket.track.title.clone();
                    self.downloads
                        .push((ticket, Instant::now() + SIMULATED_DOWNLOAD_TIME));
                    format!("Downloading {title}...")
                }
                None => String::from("Nothing is playing"),
            },
            "downloads" => self.describe_downloads(),
            "status" => self.describe_status(),
            other => format!("Unknown command: {other}"),
        };
        Reply::Message(message)
    }

    fn route(&mut self, advance: Advance, notes: &mut Vec<String>) {
        match advance {
            Advance::Started(track) => notes.push(format!("Now playing {}", track.label())),
            Advance::AwaitingRelated(request) => {
                notes.push(String::from("Queue finished; finding something similar"));
                self.worker.request(request);
            }
            Advance::Stopped => notes.push(String::from("Reached end of queue")),
        }
    }

    fn show_results(&mut self, found: crate::error::Result<Vec<Track>>) -> String {
        match found {
            Ok(tracks) if tracks.is_empty() => {
                self.results.clear();
                String::from("No results")
            }
            Ok(tracks) => {
                self.results = tracks;
                list_tracks("Results", &self.results)
            }
            Err(err) => format!("lookup error: {err}"),
        }
    }

    fn pick(&self, raw: &str) -> std::result::Result<Track, String> {
        let index = raw
            .parse::<usize>()
            .map_err(|_| String::from("Expected a result number"))?;
        index
            .checked_sub(1)
            .and_then(|idx| self.results.get(idx))
            .cloned()
            .ok_or_else(|| format!("No result #{index}"))
    }

    fn describe_queue(&self) -> String {
        let queue: Vec<Track> = self.store.queue().iter().cloned().collect();
        list_tracks("Queue", &queue)
    }

    fn describe_downloads(&self) -> String {
        let songs = self.store.downloaded_songs();
        if songs.is_empty() {
            return String::from("Downloads: none");
        }
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        let mut lines = vec![String::from("Downloads:")];
        for song in songs {
            let when = OffsetDateTime::from_unix_timestamp(song.downloaded_at)
                .ok()
                .and_then(|at| at.to_offset(offset).format(&Rfc3339).ok())
                .unwrap_or_else(|| String::from("unknown time"));
            lines.push(format!("  {} [{}] {when}", song.track.label(), song.size));
        }
        lines.join("\n")
    }

    fn describe_status(&self) -> String {
        let now_playing = self
            .store
            .current_track()
            .map(|track| {
                let heart = if self.store.is_liked(&track.id) { " <3" } else { "" };
                format!("{}{heart}", track.label())
            })
            .unwrap_or_else(|| String::from("nothing"));
        format!(
            "{} {} {:.0}% | queue {} | auto-play {} | volume {}% | theme {}",
            self.store.state().label(),
            now_playing,
            self.store.progress(),
            self.store.queue().len(),
            if self.store.auto_play() { "on" } else { "off" },
            self.store.volume(),
            self.store.theme().as_str(),
        )
    }
}

fn list_tracks(heading: &str, tracks: &[Track]) -> String {
    if tracks.is_empty() {
        return format!("{heading}: none");
    }
    let mut lines = vec![format!("{heading}:")];
    for (idx, track) in tracks.iter().enumerate() {
        lines.push(format!("  {:>2}. {}", idx + 1, track.label()));
    }
    lines.join("\n")
}
