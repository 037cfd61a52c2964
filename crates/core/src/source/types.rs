//! Types for the remote source collection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWrite;

/// Errors that can occur while talking to the remote file store.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SourceError {
    /// Whether the store reported the file as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound(_))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else if e.is_connect() {
            SourceError::ConnectionFailed(e.to_string())
        } else {
            SourceError::ApiError(e.to_string())
        }
    }
}

/// A file as listed by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Opaque remote identifier.
    pub id: String,
    /// File name, including extension.
    pub name: String,
    /// Size in bytes, when the store reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Ids of the collections containing this file.
    #[serde(default)]
    pub parents: Vec<String>,
}

/// A remote file store organised in parent collections (folders).
///
/// Implementations only need to be consistent per call; the pipeline never
/// assumes anything is cached between calls.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// List the non-trashed files directly inside `parent_id`.
    async fn list(&self, parent_id: &str) -> Result<Vec<RemoteFile>, SourceError>;

    /// Stream the content of `file_id` into `sink`, returning the byte count.
    async fn download(
        &self,
        file_id: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, SourceError>;

    /// Current parents of `file_id`, or `None` if the file no longer exists
    /// (deleted or trashed).
    async fn parents(&self, file_id: &str) -> Result<Option<Vec<String>>, SourceError>;

    /// Add and/or remove a parent collection of `file_id`.
    async fn update_parents(
        &self,
        file_id: &str,
        add: Option<&str>,
        remove: Option<&str>,
    ) -> Result<(), SourceError>;

    /// Permanently delete `file_id`.
    async fn delete(&self, file_id: &str) -> Result<(), SourceError>;
}
