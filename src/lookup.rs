use crate::error::{PlayerError, Result};
use crate::model::Track;
use anyhow::Context;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

const MAX_RESULTS: usize = 25;

pub trait TrackLookup {
    fn search(&self, query: &str) -> Result<Vec<Track>>;
    fn trending(&self) -> Result<Vec<Track>>;
    fn trending_by_genre(&self, genre: &str) -> Result<Vec<Track>>;

    /// Tracks similar to `track`, never including `track` itself.
    fn related(&self, track: &Track) -> Result<Vec<Track>> {
        let query = if track.channel.trim().is_empty() {
            track.title.as_str()
        } else {
            track.channel.as_str()
        };
        let mut found = self.search(query)?;
        found.retain(|candidate| candidate.id != track.id);
        Ok(found)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub track: Track,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub trending: bool,
}

/// Lookup service answering from an in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogLookup {
    entries: Vec<CatalogEntry>,
    folded: Vec<String>,
}

impl CatalogLookup {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let folded = entries
            .iter()
            .map(|entry| fold(&format!("{} {}", entry.track.title, entry.track.channel)))
            .collect();
        Self { entries, folded }
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let entries: Vec<CatalogEntry> =
            serde_json::from_str(raw).context("failed to parse catalog")?;
        Ok(Self::new(entries))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("in {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TrackLookup for CatalogLookup {
    fn search(&self, query: &str) -> Result<Vec<Track>> {
        let folded_query = fold(query);
        let terms: Vec<&str> = folded_query.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .entries
            .iter()
            .zip(&self.folded)
            .filter(|(_, haystack)| terms.iter().all(|term| haystack.contains(term)))
            .map(|(entry, _)| entry.track.clone())
            .take(MAX_RESULTS)
            .collect())
    }

    fn trending(&self) -> Result<Vec<Track>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.trending)
            .map(|entry| entry.track.clone())
            .take(MAX_RESULTS)
            .collect())
    }

    fn trending_by_genre(&self, genre: &str) -> Result<Vec<Track>> {
        let wanted = fold(genre);
        if wanted.trim().is_empty() {
            return Err(PlayerError::Network(String::from("genre must not be empty")));
        }
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.genres.iter().any(|g| fold(g) == wanted.trim()))
            .map(|entry| entry.track.clone())
            .take(MAX_RESULTS)
            .collect())
    }
}

fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Related-track lookup issued when the queue runs dry with auto-play on.
/// Tagged with the track it was issued for so a stale answer can be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedRequest {
    pub seed: Track,
    pub generation: u64,
}

#[derive(Debug)]
pub struct LookupResponse {
    pub request: RelatedRequest,
    pub result: Result<Vec<Track>>,
}

/// Runs related-track lookups on a background thread.
pub struct LookupWorker {
    request_tx: Sender<RelatedRequest>,
    response_rx: Receiver<LookupResponse>,
}

impl LookupWorker {
    pub fn spawn<L>(lookup: L) -> Self
    where
        L: TrackLookup + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<RelatedRequest>();
        let (response_tx, response_rx) = mpsc::channel();

        thread::spawn(move || {
            for request in request_rx {
                debug!("looking up tracks related to {}", request.seed.id);
                let result = lookup.related(&request.seed);
                if response_tx.send(LookupResponse { request, result }).is_err() {
                    break;
                }
            }
        });

        Self {
            request_tx,
            response_rx,
        }
    }

    pub fn request(&self, request: RelatedRequest) {
        if self.request_tx.send(request).is_err() {
            debug!("lookup worker has stopped; request dropped");
        }
    }

    pub fn try_recv(&self) -> Option<LookupResponse> {
        self.response_rx.try_recv().ok()
    }
}
