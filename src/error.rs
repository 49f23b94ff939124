use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("invalid track: {reason}")]
    InvalidTrack { reason: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("playback engine error: {0}")]
    Engine(String),

    #[error("stored value for {key} is corrupt: {detail}")]
    StorageCorrupt { key: String, detail: String },

    #[error("failed to write storage: {0}")]
    StorageWrite(String),
}

impl From<std::io::Error> for PlayerError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageWrite(err.to_string())
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageWrite(err.to_string())
    }
}
