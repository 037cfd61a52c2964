//! Types for publishing operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors returned by a platform backend.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    /// The response carried no id where one was required.
    #[error("Response did not contain an id")]
    MissingId,

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PlatformError::Timeout
        } else if e.is_connect() {
            PlatformError::ConnectionFailed(e.to_string())
        } else {
            PlatformError::ApiError(e.to_string())
        }
    }
}

/// Step of the publish protocol a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStage {
    Submit,
    Processing,
    Finalize,
}

impl PublishStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStage::Submit => "submit",
            PublishStage::Processing => "processing",
            PublishStage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed publish attempt.
#[derive(Debug, Error)]
#[error("publish failed during {stage}: {detail}")]
pub struct PublishError {
    pub stage: PublishStage,
    pub detail: String,
}

impl PublishError {
    /// Detail used when the platform reports a processing error.
    pub const REMOTE_ERROR: &'static str = "remote reported error";
    /// Detail used when processing did not finish within the poll budget.
    pub const TIMEOUT: &'static str = "timeout";

    pub fn new(stage: PublishStage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.stage == PublishStage::Processing && self.detail == Self::TIMEOUT
    }
}

/// Kind of media being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Whether the platform processes this kind asynchronously.
    pub fn needs_processing(&self) -> bool {
        matches!(self, MediaKind::Video)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }
}

/// Normalised processing status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Finished,
    Error,
}

impl ProcessingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessingStatus::Pending)
    }
}

/// Request to create a processing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub media_url: String,
    pub caption: String,
    pub kind: MediaKind,
}

/// A job tracked between submit and finalize. Never outlives a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub job_id: String,
    pub kind: MediaKind,
    pub status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a complete publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub job_id: String,
    pub published_id: String,
    /// Status polls issued (0 for images).
    pub polls: u32,
}

/// Trait for publishing platform backends.
#[async_trait]
pub trait PublishPlatform: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Create a processing job, returning its id.
    async fn create_job(&self, request: &CreateJobRequest) -> Result<String, PlatformError>;

    /// Current status of a job.
    async fn job_status(&self, job_id: &str) -> Result<ProcessingStatus, PlatformError>;

    /// Make a processed job visible, returning the published content id.
    async fn finalize(&self, job_id: &str) -> Result<String, PlatformError>;
}
