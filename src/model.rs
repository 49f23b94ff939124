use crate::error::PlayerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            thumbnail: String::new(),
            channel: String::new(),
            published_at: String::new(),
            duration_seconds: None,
        }
    }

    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.id.trim().is_empty() {
            return Err(PlayerError::InvalidTrack {
                reason: format!("track \"{}\" has no identifier", self.title),
            });
        }
        Ok(())
    }

    pub fn label(&self) -> String {
        if self.channel.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.channel)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedSong {
    #[serde(flatten)]
    pub track: Track,
    pub downloaded_at: i64,
    pub size: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
}

impl PlaybackState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Notification published by the player store to every live subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackChanged(Option<Track>),
    StateChanged(PlaybackState),
    ProgressChanged(f64),
    QueueChanged(usize),
    LikesChanged(usize),
    AutoPlayChanged(bool),
    VolumeChanged(u8),
    ThemeChanged(Theme),
    DownloadsChanged(usize),
    Error(PlayerError),
}
