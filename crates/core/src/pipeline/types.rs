//! Types for the publication pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::marker::{ConsumptionError, ConsumptionOutcome};
use crate::publisher::{MediaKind, PublishError};
use crate::selector::{CandidateItem, SelectorError};
use crate::stager::StagingError;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("selection failed: {0}")]
    Selection(#[from] SelectorError),

    /// The selected name has no configured video or image extension.
    #[error("unsupported media type: {name}")]
    UnsupportedMedia { name: String },

    #[error("staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("consumption failed: {0}")]
    Consumption(#[from] ConsumptionError),
}

/// Progress of a run, in the order states are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Selected,
    Staged,
    Submitted,
    Processed,
    Finalized,
    Consumed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Selected => "selected",
            RunState::Staged => "staged",
            RunState::Submitted => "submitted",
            RunState::Processed => "processed",
            RunState::Finalized => "finalized",
            RunState::Consumed => "consumed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run that stopped before the item was consumed.
#[derive(Debug, Error)]
#[error(
    "run {run_id} failed (last state: {}): {error}",
    .last_state.map(|s| s.as_str()).unwrap_or("none")
)]
pub struct RunFailure {
    pub run_id: Uuid,
    /// Last state reached before the failure; `None` if nothing was selected.
    pub last_state: Option<RunState>,
    pub item: Option<CandidateItem>,
    /// Set when the item went live but could not be marked consumed.
    pub published_id: Option<String>,
    #[source]
    pub error: PipelineError,
}

impl RunFailure {
    /// Whether the item is live on the platform yet still selectable, so the
    /// next run will publish it again.
    pub fn published_but_not_consumed(&self) -> bool {
        self.published_id.is_some()
    }

    /// Whether a later run is likely to succeed without intervention.
    pub fn is_transient(&self) -> bool {
        match &self.error {
            PipelineError::Staging(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Summary of a successful run, logged as one structured event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub item_id: String,
    pub item_name: String,
    pub kind: MediaKind,
    pub public_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub probe_attempts: u32,
    pub job_id: String,
    pub polls: u32,
    pub published_id: String,
    pub consumption: ConsumptionOutcome,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_fingerprint: Option<String>,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The source collection had no eligible item.
    NothingToPublish,
    Published(RunReport),
}
