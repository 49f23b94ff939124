use crate::engine::{EngineEvent, EngineEventKind, PlaybackEngine};
use crate::error::{PlayerError, Result};
use crate::lookup::{LookupResponse, RelatedRequest};
use crate::model::{DownloadedSong, PlaybackState, PlayerEvent, Theme, Track};
use crate::storage::{DEFAULT_VOLUME, Persistence};
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use time::OffsetDateTime;

const MAX_RECENTLY_PLAYED: usize = 50;

/// What `play_next` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Started(Track),
    AwaitingRelated(RelatedRequest),
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTicket {
    pub track: Track,
    pub generation: u64,
}

struct Snapshot {
    current: Option<Track>,
    queue: VecDeque<Track>,
    state: PlaybackState,
    progress: f64,
    generation: u64,
    advanced_generation: Option<u64>,
    pending_related: Option<RelatedRequest>,
}

/// Single source of truth for what is playing and what comes next.
///
/// The store owns its engine and persistence handles. Every track load bumps
/// `generation`; asynchronous answers (related lookups, downloads) carry the
/// generation they were issued under and are dropped once it moves on.
pub struct PlayerStore<E: PlaybackEngine> {
    engine: E,
    persistence: Persistence,
    current: Option<Track>,
    queue: VecDeque<Track>,
    state: PlaybackState,
    progress: f64,
    generation: u64,
    advanced_generation: Option<u64>,
    pending_related: Option<RelatedRequest>,
    liked: Vec<Track>,
    auto_play: bool,
    downloads: Vec<DownloadedSong>,
    recently_played: Vec<Track>,
    volume: u8,
    theme: Theme,
    initialized: bool,
    subscribers: Vec<Sender<PlayerEvent>>,
}

impl<E: PlaybackEngine> PlayerStore<E> {
    pub fn new(engine: E, persistence: Persistence) -> Self {
        Self {
            engine,
            persistence,
            current: None,
            queue: VecDeque::new(),
            state: PlaybackState::Idle,
            progress: 0.0,
            generation: 0,
            advanced_generation: None,
            pending_related: None,
            liked: Vec::new(),
            auto_play: false,
            downloads: Vec::new(),
            recently_played: Vec::new(),
            volume: DEFAULT_VOLUME,
            theme: Theme::default(),
            initialized: false,
            subscribers: Vec::new(),
        }
    }

    /// Hydrates persisted state. Calling it again is a no-op.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }

        self.theme = self.persistence.load_theme();
        self.volume = self.persistence.load_volume();
        self.engine.set_volume(self.volume);
        self.auto_play = self.persistence.load_auto_play();
        self.liked = self.persistence.load_liked_songs();
        self.downloads = self.persistence.load_downloaded_songs();
        self.recently_played = self.persistence.load_recently_played();
        self.initialized = true;
        debug!(
            "player store initialized: {} liked, {} downloaded, auto-play {}",
            self.liked.len(),
            self.downloads.len(),
            self.auto_play
        );

        self.publish(PlayerEvent::ThemeChanged(self.theme));
        self.publish(PlayerEvent::VolumeChanged(self.volume));
        self.publish(PlayerEvent::AutoPlayChanged(self.auto_play));
        self.publish(PlayerEvent::LikesChanged(self.liked.len()));
        self.publish(PlayerEvent::DownloadsChanged(self.downloads.len()));
    }

    pub fn subscribe(&mut self) -> Receiver<PlayerEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn play(&mut self, track: Track) -> Result<()> {
        if let Err(err) = track.validate() {
            self.publish(PlayerEvent::Error(err.clone()));
            return Err(err);
        }

        let snapshot = self.snapshot();
        self.generation += 1;
        self.pending_related = None;
        self.current = Some(track.clone());
        self.progress = 0.0;
        self.state = PlaybackState::Loading;

        let loaded = self
            .engine
            .load(&track)
            .and_then(|()| self.engine.play());
        if let Err(err) = loaded {
            warn!("engine refused {}: {err}", track.id);
            self.restore(snapshot);
            self.publish(PlayerEvent::Error(err.clone()));
            return Err(err);
        }

        debug!("loading {} (generation {})", track.id, self.generation);
        self.remember_played(&track);
        self.publish(PlayerEvent::TrackChanged(Some(track)));
        self.publish(PlayerEvent::StateChanged(self.state));
        self.publish(PlayerEvent::ProgressChanged(self.progress));
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.current.is_none() {
            return;
        }
        if matches!(self.state, PlaybackState::Loading | PlaybackState::Playing) {
            self.engine.pause();
            self.set_state(PlaybackState::Paused);
        }
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.current.is_none() || self.state != PlaybackState::Paused {
            return Ok(());
        }
        if let Err(err) = self.engine.play() {
            self.set_state(PlaybackState::Idle);
            self.publish(PlayerEvent::Error(err.clone()));
            return Err(err);
        }
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.generation += 1;
        self.pending_related = None;
        self.progress = 0.0;
        if self.current.take().is_some() {
            self.publish(PlayerEvent::TrackChanged(None));
        }
        self.set_state(PlaybackState::Idle);
    }

    pub fn enqueue(&mut self, track: Track) -> Result<()> {
        track.validate()?;
        self.queue.push_back(track);
        self.publish(PlayerEvent::QueueChanged(self.queue.len()));
        Ok(())
    }

    /// Appends every track, or none of them if any is malformed.
    pub fn enqueue_many(&mut self, tracks: Vec<Track>) -> Result<()> {
        for track in &tracks {
            track.validate()?;
        }
        if tracks.is_empty() {
            return Ok(());
        }
        self.queue.extend(tracks);
        self.publish(PlayerEvent::QueueChanged(self.queue.len()));
        Ok(())
    }

    pub fn remove_from_queue(&mut self, index: usize) -> Option<Track> {
        let removed = self.queue.remove(index)?;
        self.publish(PlayerEvent::QueueChanged(self.queue.len()));
        Some(removed)
    }

    pub fn clear_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        self.queue.clear();
        self.publish(PlayerEvent::QueueChanged(0));
    }

    /// Plays the head of the queue. A head entry that is the track already
    /// playing is skipped once, but only when something else follows it.
    pub fn play_next(&mut self) -> Result<Advance> {
        let before = self.queue.clone();
        let head_is_current = self.queue.front().is_some_and(|head| {
            self.current
                .as_ref()
                .is_some_and(|current| current.id == head.id)
        });
        if head_is_current && self.queue.len() > 1 {
            self.queue.pop_front();
        }

        if let Some(head) = self.queue.pop_front() {
            if let Err(err) = self.play(head.clone()) {
                self.queue = before;
                return Err(err);
            }
            self.publish(PlayerEvent::QueueChanged(self.queue.len()));
            return Ok(Advance::Started(head));
        }
        let seed = self
            .current
            .clone()
            .or_else(|| self.recently_played.first().cloned());
        match seed {
            Some(seed) if self.auto_play => {
                let request = RelatedRequest {
                    seed,
                    generation: self.generation,
                };
                debug!("queue exhausted; asking for tracks related to {}", request.seed.id);
                self.pending_related = Some(request.clone());
                Ok(Advance::AwaitingRelated(request))
            }
            _ => {
                self.stop();
                Ok(Advance::Stopped)
            }
        }
    }

    /// Applies a related-track answer if nothing has superseded it.
    /// Lookup failures are swallowed.
    pub fn complete_related(&mut self, response: LookupResponse) -> Option<Track> {
        let LookupResponse { request, result } = response;
        if self.pending_related.as_ref() != Some(&request) || request.generation != self.generation
        {
            warn!("dropping stale related lookup for {}", request.seed.id);
            return None;
        }
        if self.current.as_ref().is_some_and(|current| current.id != request.seed.id) {
            warn!("dropping related lookup for {}: track changed", request.seed.id);
            return None;
        }
        self.pending_related = None;

        let candidates = match result {
            Ok(candidates) => candidates,
            Err(err) => {
                debug!("auto-play lookup failed: {err}");
                return None;
            }
        };

        let next = candidates
            .into_iter()
            .find(|candidate| candidate.id != request.seed.id && candidate.validate().is_ok())?;
        self.play(next.clone()).ok()?;
        Some(next)
    }

    pub fn report_progress(&mut self, percent: f64) -> Option<Advance> {
        self.current.as_ref()?;
        let clamped = clamp_progress(percent);
        self.progress = clamped;
        self.publish(PlayerEvent::ProgressChanged(clamped));
        if clamped >= 100.0 {
            return self.finish_current();
        }
        None
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Option<Advance> {
        if self.current.as_ref().map(|track| track.id.as_str()) != Some(event.track_id.as_str()) {
            debug!("ignoring engine event for {}: not current", event.track_id);
            return None;
        }

        match event.kind {
            EngineEventKind::Ready => {
                if self.state == PlaybackState::Loading {
                    self.set_state(PlaybackState::Playing);
                }
                None
            }
            EngineEventKind::Progress(percent) => self.report_progress(percent),
            EngineEventKind::Ended => {
                self.progress = 100.0;
                self.publish(PlayerEvent::ProgressChanged(self.progress));
                self.finish_current()
            }
            EngineEventKind::Error(message) => {
                warn!("engine fault on {}: {message}", event.track_id);
                self.pending_related = None;
                self.set_state(PlaybackState::Idle);
                self.publish(PlayerEvent::Error(PlayerError::Engine(message)));
                None
            }
        }
    }

    /// Drains pending engine events into the store.
    pub fn pump_engine(&mut self) -> Vec<Advance> {
        let events = self.engine.poll_events();
        events
            .into_iter()
            .filter_map(|event| self.handle_engine_event(event))
            .collect()
    }

    pub fn toggle_like(&mut self, track: &Track) -> Result<bool> {
        track.validate()?;
        let liked = match self.liked.iter().position(|t| t.id == track.id) {
            Some(pos) => {
                self.liked.remove(pos);
                false
            }
            None => {
                self.liked.push(track.clone());
                true
            }
        };
        let saved = self.persistence.save_liked_songs(&self.liked);
        self.report_storage(saved);
        self.publish(PlayerEvent::LikesChanged(self.liked.len()));
        Ok(liked)
    }

    pub fn set_auto_play(&mut self, enabled: bool) {
        self.auto_play = enabled;
        let saved = self.persistence.save_auto_play(enabled);
        self.report_storage(saved);
        self.publish(PlayerEvent::AutoPlayChanged(enabled));
    }

    pub fn set_volume(&mut self, volume: u8) {
        let volume = volume.min(100);
        self.volume = volume;
        self.engine.set_volume(volume);
        let saved = self.persistence.save_volume(volume);
        self.report_storage(saved);
        self.publish(PlayerEvent::VolumeChanged(volume));
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        let saved = self.persistence.save_theme(theme);
        self.report_storage(saved);
        self.publish(PlayerEvent::ThemeChanged(theme));
    }

    pub fn begin_download(&self) -> Option<DownloadTicket> {
        let track = self.current.clone()?;
        Some(DownloadTicket {
            track,
            generation: self.generation,
        })
    }

    /// Records a simulated download unless the track stopped being current.
    pub fn complete_download(&mut self, ticket: DownloadTicket) -> Option<DownloadedSong> {
        let still_current = ticket.generation == self.generation
            && self.current.as_ref().map(|t| t.id.as_str()) == Some(ticket.track.id.as_str());
        if !still_current {
            warn!("dropping download of {}: no longer playing", ticket.track.id);
            return None;
        }

        if let Some(existing) = self.downloads.iter().find(|d| d.track.id == ticket.track.id) {
            return Some(existing.clone());
        }

        let song = DownloadedSong {
            track: ticket.track,
            downloaded_at: OffsetDateTime::now_utc().unix_timestamp(),
            size: simulated_size(),
        };
        self.downloads.push(song.clone());
        let saved = self.persistence.save_downloaded_songs(&self.downloads);
        self.report_storage(saved);
        self.publish(PlayerEvent::DownloadsChanged(self.downloads.len()));
        Some(song)
    }

    pub fn remove_download(&mut self, id: &str) -> bool {
        let before = self.downloads.len();
        self.downloads.retain(|song| song.track.id != id);
        if self.downloads.len() == before {
            return false;
        }
        let saved = self.persistence.save_downloaded_songs(&self.downloads);
        self.report_storage(saved);
        self.publish(PlayerEvent::DownloadsChanged(self.downloads.len()));
        true
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &VecDeque<Track> {
        &self.queue
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn liked_songs(&self) -> &[Track] {
        &self.liked
    }

    pub fn is_liked(&self, id: &str) -> bool {
        self.liked.iter().any(|track| track.id == id)
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    pub fn downloaded_songs(&self) -> &[DownloadedSong] {
        &self.downloads
    }

    pub fn recently_played(&self) -> &[Track] {
        &self.recently_played
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn pending_related(&self) -> Option<&RelatedRequest> {
        self.pending_related.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    fn finish_current(&mut self) -> Option<Advance> {
        if self.advanced_generation == Some(self.generation) {
            return None;
        }
        self.advanced_generation = Some(self.generation);
        self.set_state(PlaybackState::Ended);

        match self.play_next() {
            Ok(advance) => Some(advance),
            Err(err) => {
                debug!("auto-advance failed: {err}");
                None
            }
        }
    }

    fn remember_played(&mut self, track: &Track) {
        self.recently_played.retain(|t| t.id != track.id);
        self.recently_played.insert(0, track.clone());
        self.recently_played.truncate(MAX_RECENTLY_PLAYED);
        let saved = self
            .persistence
            .save_recently_played(&self.recently_played);
        self.report_storage(saved);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        debug!("{} -> {}", self.state.label(), state.label());
        self.state = state;
        self.publish(PlayerEvent::StateChanged(state));
    }

    fn report_storage(&mut self, result: Result<()>) {
        if let Err(err) = result {
            self.publish(PlayerEvent::Error(err));
        }
    }

    fn publish(&mut self, event: PlayerEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            current: self.current.clone(),
            queue: self.queue.clone(),
            state: self.state,
            progress: self.progress,
            generation: self.generation,
            advanced_generation: self.advanced_generation,
            pending_related: self.pending_related.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.current = snapshot.current;
        self.queue = snapshot.queue;
        self.state = snapshot.state;
        self.progress = snapshot.progress;
        self.generation = snapshot.generation;
        self.advanced_generation = snapshot.advanced_generation;
        self.pending_related = snapshot.pending_related;
    }
}

fn clamp_progress(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

fn simulated_size() -> String {
    let tenths: u32 = rand::random_range(20..=95);
    format!("{}.{} MB", tenths / 10, tenths % 10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LIKED_SONGS_KEY, MemoryStore};
    use proptest::prop_assert;
    use proptest::prop_assert_eq;
    use std::collections::HashSet;

    #[derive(Default)]
    struct ScriptedEngine {
        loaded: Vec<String>,
        refuse: HashSet<String>,
        paused: bool,
        stops: usize,
        volume: u8,
        pending: Vec<EngineEvent>,
    }

    impl PlaybackEngine for ScriptedEngine {
        fn load(&mut self, track: &Track) -> Result<()> {
            if self.refuse.contains(&track.id) {
                return Err(PlayerError::Engine(format!("cannot load {}", track.id)));
            }
            self.loaded.push(track.id.clone());
            Ok(())
        }

        fn play(&mut self) -> Result<()> {
            self.paused = false;
            Ok(())
        }

        fn pause(&mut self) {
            self.paused = true;
        }

        fn stop(&mut self) {
            self.stops += 1;
        }

        fn set_volume(&mut self, volume: u8) {
            self.volume = volume;
        }

        fn volume(&self) -> u8 {
            self.volume
        }

        fn poll_events(&mut self) -> Vec<EngineEvent> {
            std::mem::take(&mut self.pending)
        }
    }

    fn store() -> PlayerStore<ScriptedEngine> {
        PlayerStore::new(ScriptedEngine::default(), Persistence::in_memory())
    }

    fn track(id: &str) -> Track {
        Track::new(id, id.to_uppercase())
    }

    #[test]
    fn play_resets_progress_and_loads_engine() {
        let mut store = store();
        store.play(track("a")).expect("play");
        store.report_progress(40.0);
        store.play(track("b")).expect("play");

        assert_eq!(store.progress(), 0.0);
        assert_eq!(store.state(), PlaybackState::Loading);
        assert_eq!(store.engine().loaded, vec!["a", "b"]);
        assert_eq!(store.recently_played()[0].id, "b");
    }

    #[test]
    fn invalid_track_leaves_state_untouched() {
        let mut store = store();
        store.play(track("a")).expect("play");
        let err = store.play(Track::new("", "nothing")).expect_err("invalid");
        assert!(matches!(err, PlayerError::InvalidTrack { .. }));
        assert_eq!(store.current_track().map(|t| t.id.as_str()), Some("a"));
    }

    #[test]
    fn refused_load_restores_previous_track_and_queue() {
        let mut store = store();
        store.engine_mut().refuse.insert(String::from("bad"));
        store.play(track("a")).expect("play");
        store.enqueue(track("bad")).expect("enqueue");
        let events = store.subscribe();

        let err = store.play_next().expect_err("refused");
        assert!(matches!(err, PlayerError::Engine(_)));
        assert_eq!(store.current_track().map(|t| t.id.as_str()), Some("a"));
        assert_eq!(store.queue().len(), 1);
        assert!(
            events
                .try_iter()
                .any(|event| matches!(event, PlayerEvent::Error(PlayerError::Engine(_))))
        );
    }

    #[test]
    fn pause_and_resume_without_track_are_noops() {
        let mut store = store();
        store.pause();
        store.resume().expect("resume");
        assert_eq!(store.state(), PlaybackState::Idle);
        assert!(!store.engine().paused);
    }

    #[test]
    fn ready_event_is_ignored_while_paused() {
        let mut store = store();
        store.play(track("a")).expect("play");
        store.pause();
        store.handle_engine_event(EngineEvent::new("a", EngineEventKind::Ready));
        assert_eq!(store.state(), PlaybackState::Paused);

        store.resume().expect("resume");
        assert_eq!(store.state(), PlaybackState::Playing);
    }

    #[test]
    fn events_for_previous_track_are_ignored() {
        let mut store = store();
        store.play(track("a")).expect("play");
        store.play(track("b")).expect("play");

        assert_eq!(
            store.handle_engine_event(EngineEvent::new("a", EngineEventKind::Ended)),
            None
        );
        store.handle_engine_event(EngineEvent::new("a", EngineEventKind::Progress(70.0)));
        assert_eq!(store.progress(), 0.0);
        assert_eq!(store.current_track().map(|t| t.id.as_str()), Some("b"));
    }

    #[test]
    fn engine_error_moves_to_idle_and_keeps_track() {
        let mut store = store();
        store.play(track("a")).expect("play");
        store.enqueue(track("b")).expect("enqueue");
        let events = store.subscribe();

        store.handle_engine_event(EngineEvent::new(
            "a",
            EngineEventKind::Error(String::from("video unavailable")),
        ));

        assert_eq!(store.state(), PlaybackState::Idle);
        assert_eq!(store.current_track().map(|t| t.id.as_str()), Some("a"));
        assert_eq!(store.queue().len(), 1);
        assert!(events.try_iter().any(|event| event
            == PlayerEvent::Error(PlayerError::Engine(String::from("video unavailable")))));
        assert_eq!(store.engine().loaded, vec!["a"]);
    }

    #[test]
    fn ended_event_advances_once() {
        let mut store = store();
        store.play(track("a")).expect("play");
        store.enqueue_many(vec![track("b"), track("c")]).expect("enqueue");
        store.engine_mut().pending = vec![
            EngineEvent::new("a", EngineEventKind::Progress(100.0)),
            EngineEvent::new("a", EngineEventKind::Ended),
        ];

        let advances = store.pump_engine();
        assert_eq!(advances, vec![Advance::Started(track("b"))]);
        assert_eq!(store.queue().len(), 1);
    }

    #[test]
    fn exhausted_queue_without_auto_play_stops() {
        let mut store = store();
        store.play(track("a")).expect("play");
        assert_eq!(store.play_next().expect("next"), Advance::Stopped);
        assert_eq!(store.current_track(), None);
        assert_eq!(store.state(), PlaybackState::Idle);
        assert_eq!(store.engine().stops, 1);
    }

    #[test]
    fn related_lookup_failure_is_silent() {
        let mut store = store();
        store.set_auto_play(true);
        store.play(track("a")).expect("play");
        let Advance::AwaitingRelated(request) = store.play_next().expect("next") else {
            panic!("expected a related lookup");
        };

        let applied = store.complete_related(LookupResponse {
            request,
            result: Err(PlayerError::Network(String::from("offline"))),
        });
        assert_eq!(applied, None);
        assert_eq!(store.current_track().map(|t| t.id.as_str()), Some("a"));
        assert!(store.pending_related().is_none());
    }

    #[test]
    fn related_lookup_skips_the_seed_track() {
        let mut store = store();
        store.set_auto_play(true);
        store.play(track("a")).expect("play");
        let Advance::AwaitingRelated(request) = store.play_next().expect("next") else {
            panic!("expected a related lookup");
        };

        let applied = store.complete_related(LookupResponse {
            request,
            result: Ok(vec![track("a"), track("r")]),
        });
        assert_eq!(applied, Some(track("r")));
        assert_eq!(store.current_track(), Some(&track("r")));
    }

    #[test]
    fn auto_play_without_any_seed_stops() {
        let mut store = store();
        store.set_auto_play(true);
        assert_eq!(store.play_next().expect("next"), Advance::Stopped);
    }

    #[test]
    fn download_of_superseded_track_is_dropped() {
        let mut store = store();
        store.play(track("a")).expect("play");
        let stale = store.begin_download().expect("ticket");
        store.play(track("b")).expect("play");
        assert_eq!(store.complete_download(stale), None);

        let ticket = store.begin_download().expect("ticket");
        let song = store.complete_download(ticket.clone()).expect("download");
        assert_eq!(song.track.id, "b");
        assert!(song.size.ends_with(" MB"));
        assert_eq!(store.complete_download(ticket), Some(song));
        assert_eq!(store.downloaded_songs().len(), 1);

        assert!(store.remove_download("b"));
        assert!(!store.remove_download("b"));
    }

    #[test]
    fn initialize_runs_once() {
        let persistence = Persistence::new(
            MemoryStore::new()
                .with_value("autoPlay", "true")
                .with_value("volume", "35")
                .with_value("theme", "dark")
                .with_value(LIKED_SONGS_KEY, r#"[{"id":"x","title":"X"}]"#),
        );
        let mut store = PlayerStore::new(ScriptedEngine::default(), persistence);
        store.initialize();

        assert!(store.is_initialized());
        assert!(store.auto_play());
        assert_eq!(store.volume(), 35);
        assert_eq!(store.engine().volume, 35);
        assert_eq!(store.theme(), Theme::Dark);
        assert!(store.is_liked("x"));

        store.toggle_like(&track("x")).expect("toggle");
        store.initialize();
        assert!(!store.is_liked("x"));
    }

    #[test]
    fn remove_from_queue_keeps_remaining_order() {
        let mut store = store();
        store
            .enqueue_many(vec![track("a"), track("b"), track("c")])
            .expect("enqueue");
        assert_eq!(store.remove_from_queue(1), Some(track("b")));
        assert_eq!(store.remove_from_queue(5), None);
        let ids: Vec<&str> = store.queue().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn requeued_current_track_is_skipped_at_most_once() {
        let mut store = store();
        store.play(track("a")).expect("play");
        store
            .enqueue_many(vec![track("a"), track("a"), track("b")])
            .expect("enqueue");

        assert_eq!(store.play_next().expect("next"), Advance::Started(track("a")));
        let ids: Vec<&str> = store.queue().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn volume_is_capped() {
        let mut store = store();
        store.set_volume(250);
        assert_eq!(store.volume(), 100);
        assert_eq!(store.engine().volume, 100);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut store = store();
        let kept = store.subscribe();
        drop(store.subscribe());
        store.set_auto_play(true);
        assert_eq!(store.subscribers.len(), 1);
        assert_eq!(kept.try_recv(), Ok(PlayerEvent::AutoPlayChanged(true)));
    }

    #[test]
    fn nan_progress_reads_as_zero() {
        assert_eq!(clamp_progress(f64::NAN), 0.0);
        assert_eq!(clamp_progress(150.0), 100.0);
        assert_eq!(clamp_progress(-10.0), 0.0);
    }

    proptest::proptest! {
        #[test]
        fn enqueue_appends_and_preserves_order(ids in proptest::collection::vec("[a-z]{1,6}", 0..20), extra in "[a-z]{1,6}") {
            let mut store = store();
            store.enqueue_many(ids.iter().map(|id| track(id)).collect()).expect("enqueue");
            store.enqueue(track(&extra)).expect("enqueue");

            prop_assert_eq!(store.queue().len(), ids.len() + 1);
            prop_assert_eq!(&store.queue().back().expect("tail").id, &extra);
            let kept: Vec<&str> = store.queue().iter().take(ids.len()).map(|t| t.id.as_str()).collect();
            let expected: Vec<&str> = ids.iter().map(String::as_str).collect();
            prop_assert_eq!(kept, expected);
        }

        #[test]
        fn reported_progress_stays_in_range(percent in proptest::num::f64::ANY) {
            let mut store = store();
            store.play(track("a")).expect("play");
            store.report_progress(percent);
            prop_assert!((0.0..=100.0).contains(&store.progress()));
        }

        #[test]
        fn store_invariants_hold_after_random_ops(ops in proptest::collection::vec(0u8..10, 1..200)) {
            let mut store = store();
            let mut counter = 0_u32;
            for op in ops {
                counter += 1;
                match op {
                    0 => { let _ = store.play(track(&format!("t{counter}"))); }
                    1 => store.pause(),
                    2 => { let _ = store.resume(); }
                    3 => { let _ = store.enqueue(track(&format!("q{counter}"))); }
                    4 => { let _ = store.play_next(); }
                    5 => store.clear_queue(),
                    6 => { store.report_progress(100.0); }
                    7 => store.set_auto_play(!store.auto_play()),
                    8 => { let _ = store.toggle_like(&track("fav")); }
                    _ => store.stop(),
                }

                prop_assert!((0.0..=100.0).contains(&store.progress()));
                if store.current_track().is_none() {
                    prop_assert_eq!(store.state(), PlaybackState::Idle);
                }
                prop_assert!(store.liked_songs().len() <= 1);
                prop_assert!(store.recently_played().len() <= MAX_RECENTLY_PLAYED);
            }
        }
    }
}
