//! Types for consumption marking.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::SourceError;

/// Errors that can occur while marking an item as consumed.
#[derive(Debug, Error)]
pub enum ConsumptionError {
    /// The item's current parents could not be looked up.
    #[error("Failed to look up item {item_id}")]
    Lookup {
        item_id: String,
        #[source]
        source: SourceError,
    },

    /// Relocation failed and no delete fallback was configured.
    #[error("Failed to relocate item {item_id} to {target}")]
    Relocate {
        item_id: String,
        target: String,
        #[source]
        source: SourceError,
    },

    /// Deletion failed (directly, or as the fallback after a failed relocation).
    #[error("Failed to delete item {item_id}")]
    Delete {
        item_id: String,
        #[source]
        source: SourceError,
    },

    #[error("Completion marker misconfigured: {0}")]
    Misconfigured(String),
}

/// How a consumed item leaves the source collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Move the item into `consumed_collection`; optionally delete it when
    /// the move fails.
    Relocate {
        consumed_collection: String,
        delete_on_failure: bool,
    },
    /// Permanently delete the item.
    Delete,
}

/// What the marker did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionOutcome {
    Relocated,
    Deleted,
    /// The item had already left the source collection.
    AlreadyConsumed,
}

impl ConsumptionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumptionOutcome::Relocated => "relocated",
            ConsumptionOutcome::Deleted => "deleted",
            ConsumptionOutcome::AlreadyConsumed => "already_consumed",
        }
    }
}
