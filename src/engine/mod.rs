use crate::error::{PlayerError, Result};
use crate::model::Track;
use std::time::{Duration, Instant};

const DEFAULT_TRACK_SECONDS: u32 = 180;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    Ready,
    Progress(f64),
    Ended,
    Error(String),
}

/// Event reported by a playback engine, tagged with the track it concerns.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub track_id: String,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn new(track_id: impl Into<String>, kind: EngineEventKind) -> Self {
        Self {
            track_id: track_id.into(),
            kind,
        }
    }
}

pub trait PlaybackEngine {
    fn load(&mut self, track: &Track) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn stop(&mut self);
    fn set_volume(&mut self, volume: u8);
    fn volume(&self) -> u8;
    fn poll_events(&mut self) -> Vec<EngineEvent>;
}

/// Wall-clock engine that produces no sound. It reports readiness, progress
/// and end-of-track as a real embedded player would.
pub struct SimulatedEngine {
    current: Option<String>,
    paused: bool,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Duration,
    volume: u8,
    ready_sent: bool,
    ended_sent: bool,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            current: None,
            paused: true,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: Duration::from_secs(u64::from(DEFAULT_TRACK_SECONDS)),
            volume: 100,
            ready_sent: false,
            ended_sent: false,
        }
    }

    pub fn current_track_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Moves the playhead forward without waiting.
    pub fn advance(&mut self, by: Duration) {
        self.position_offset = self.position_offset.saturating_add(by);
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        position.min(self.track_duration)
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn load(&mut self, track: &Track) -> Result<()> {
        let seconds = track.duration_seconds.unwrap_or(DEFAULT_TRACK_SECONDS);
        if seconds == 0 {
            return Err(PlayerError::Engine(format!(
                "track {} has zero length",
                track.id
            )));
        }
        self.current = Some(track.id.clone());
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = Duration::from_secs(u64::from(seconds));
        self.ready_sent = false;
        self.ended_sent = false;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Err(PlayerError::Engine(String::from("no track loaded")));
        }
        if self.paused {
            self.started_at = Some(Instant::now());
            self.paused = false;
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = true;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
    }

    fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    fn volume(&self) -> u8 {
        self.volume
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        let Some(id) = self.current.clone() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if !self.ready_sent {
            self.ready_sent = true;
            events.push(EngineEvent::new(id.clone(), EngineEventKind::Ready));
        }

        if self.ended_sent {
            return events;
        }

        let position = self.current_position();
        let percent = position.as_secs_f64() / self.track_duration.as_secs_f64() * 100.0;
        events.push(EngineEvent::new(id.clone(), EngineEventKind::Progress(percent)));

        if position >= self.track_duration {
            self.ended_sent = true;
            events.push(EngineEvent::new(id, EngineEventKind::Ended));
        }
        events
    }
}
