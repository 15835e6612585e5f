//! Error type for the sync layer.

use encore_common::EncoreError;
use thiserror::Error;

/// Errors surfaced by realtime reads, REST fetches and the local cache.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("path is read-only for clients: {0}")]
    ReadOnly(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<SyncError> for EncoreError {
    fn from(err: SyncError) -> Self {
        EncoreError::Sync(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_into_encore_error() {
        let err: EncoreError = SyncError::ReadOnly("playback/7".into()).into();
        assert!(matches!(err, EncoreError::Sync(_)));
        assert!(err.to_string().contains("playback/7"));
    }

    #[test]
    fn json_errors_map_to_parse() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(SyncError::from(bad), SyncError::Parse(_)));
    }
}
