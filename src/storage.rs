//! Persistence adapter for the player store.
//!
//! Values live in a flat string key/value store, mirroring browser local
//! storage. Readers never fail: a missing, empty or unparsable value loads as
//! the type's default and the corruption is logged.

use crate::error::{PlayerError, Result};
use crate::model::{DownloadedSong, Theme, Track};
use log::{error, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const AUTO_PLAY_KEY: &str = "autoPlay";
pub const LIKED_SONGS_KEY: &str = "likedSongs";
pub const DOWNLOADED_SONGS_KEY: &str = "downloadedSongs";
pub const RECENTLY_PLAYED_KEY: &str = "recentlyPlayed";
pub const THEME_KEY: &str = "theme";
pub const VOLUME_KEY: &str = "volume";

pub const DEFAULT_VOLUME: u8 = 100;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Key/value store backed by one JSON object on disk, written through on
/// every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: &Path) -> Self {
        let values = match fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("storage file {} is corrupt, starting empty: {err}", path.display());
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Self {
            path: path.to_path_buf(),
            values,
        }
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

pub struct Persistence {
    store: Box<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json).inspect_err(|err| {
            error!("failed to persist {key}: {err}");
        })
    }

    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.try_load(key).unwrap_or_else(|err| {
            warn!("{err}; treating as empty");
            T::default()
        })
    }

    fn try_load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let Some(raw) = self.store.get(key) else {
            return Ok(T::default());
        };
        if raw.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&raw).map_err(|err| PlayerError::StorageCorrupt {
            key: key.to_string(),
            detail: err.to_string(),
        })
    }

    pub fn load_auto_play(&self) -> bool {
        self.store
            .get(AUTO_PLAY_KEY)
            .is_some_and(|raw| raw.trim() == "true")
    }

    pub fn save_auto_play(&mut self, enabled: bool) -> Result<()> {
        let raw = if enabled { "true" } else { "false" };
        self.store.set(AUTO_PLAY_KEY, raw)
    }

    pub fn load_liked_songs(&self) -> Vec<Track> {
        dedup_tracks(self.load(LIKED_SONGS_KEY))
    }

    pub fn save_liked_songs(&mut self, liked: &[Track]) -> Result<()> {
        self.save(LIKED_SONGS_KEY, liked)
    }

    pub fn load_downloaded_songs(&self) -> Vec<DownloadedSong> {
        let songs: Vec<DownloadedSong> = self.load(DOWNLOADED_SONGS_KEY);
        let mut seen = HashSet::new();
        songs
            .into_iter()
            .filter(|song| seen.insert(song.track.id.clone()))
            .collect()
    }

    pub fn save_downloaded_songs(&mut self, songs: &[DownloadedSong]) -> Result<()> {
        self.save(DOWNLOADED_SONGS_KEY, songs)
    }

    pub fn load_recently_played(&self) -> Vec<Track> {
        dedup_tracks(self.load(RECENTLY_PLAYED_KEY))
    }

    pub fn save_recently_played(&mut self, tracks: &[Track]) -> Result<()> {
        self.save(RECENTLY_PLAYED_KEY, tracks)
    }

    pub fn load_theme(&self) -> Theme {
        self.store
            .get(THEME_KEY)
            .and_then(|raw| Theme::parse(&raw))
            .unwrap_or_default()
    }

    pub fn save_theme(&mut self, theme: Theme) -> Result<()> {
        self.store.set(THEME_KEY, theme.as_str())
    }

    pub fn load_volume(&self) -> u8 {
        match self.store.get(VOLUME_KEY) {
            Some(raw) => raw.trim().parse::<u8>().map(|v| v.min(100)).unwrap_or_else(|_| {
                warn!("stored volume {raw:?} is not a number; using default");
                DEFAULT_VOLUME
            }),
            None => DEFAULT_VOLUME,
        }
    }

    pub fn save_volume(&mut self, volume: u8) -> Result<()> {
        self.store.set(VOLUME_KEY, &volume.to_string())
    }
}

fn dedup_tracks(tracks: Vec<Track>) -> Vec<Track> {
    let mut seen = HashSet::new();
    tracks
        .into_iter()
        .filter(|track| seen.insert(track.id.clone()))
        .collect()
}
