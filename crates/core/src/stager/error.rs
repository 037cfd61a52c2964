//! Error types for the stager module.

use std::path::PathBuf;
use thiserror::Error;

use crate::source::SourceError;

/// Errors that can occur while staging an item.
#[derive(Debug, Error)]
pub enum StagingError {
    /// The item name cannot be used as a file name in the publish directory.
    #[error("Item name is not a plain file name: {name:?}")]
    InvalidName { name: String },

    /// The stager is missing a setting required by its mode.
    #[error("Stager misconfigured: {0}")]
    Misconfigured(String),

    /// Failed to clear or recreate the publish directory.
    #[error("Failed to prepare publish directory: {path}")]
    PrepareFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to retrieve the item bytes from the source collection.
    #[error("Failed to retrieve item {item_id}")]
    RetrievalFailed {
        item_id: String,
        #[source]
        source: SourceError,
    },

    /// Failed to write or read the staged file.
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The public URL never answered with a 2xx.
    #[error("Public URL not reachable after {attempts} attempts: {url}")]
    NotReachable { url: String, attempts: u32 },

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl StagingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is likely to clear up on a later run (propagation
    /// delay or a transient store error).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotReachable { .. } => true,
            Self::RetrievalFailed { source, .. } => matches!(
                source,
                SourceError::Timeout | SourceError::ConnectionFailed(_)
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StagingError::NotReachable {
            url: "https://host/media/clip_1.mp4".to_string(),
            attempts: 30,
        };
        assert_eq!(
            err.to_string(),
            "Public URL not reachable after 30 attempts: https://host/media/clip_1.mp4"
        );
    }

    #[test]
    fn test_is_transient() {
        assert!(StagingError::NotReachable {
            url: "u".into(),
            attempts: 1
        }
        .is_transient());
        assert!(StagingError::RetrievalFailed {
            item_id: "a".into(),
            source: SourceError::Timeout,
        }
        .is_transient());
        assert!(!StagingError::RetrievalFailed {
            item_id: "a".into(),
            source: SourceError::NotFound("a".into()),
        }
        .is_transient());
        assert!(!StagingError::InvalidName { name: "../x".into() }.is_transient());
    }
}
