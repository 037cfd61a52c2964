//! Types for the stager module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An item made reachable at a public URL, owned by a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedAsset {
    /// Remote id of the staged item.
    pub item_id: String,
    /// Where the bytes were written (retrieve mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// URL the publishing platform will fetch.
    pub public_url: String,
    /// Bytes written (retrieve mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// SHA-256 of the staged file (retrieve mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Reachability probes issued before the URL answered.
    pub probe_attempts: u32,
}
