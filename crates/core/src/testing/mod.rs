//! Testing utilities and mock implementations.
//!
//! Every external collaborator of a run has an in-memory stand-in here, so a
//! whole run can be exercised without Drive, a public host, or the Graph API.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipcast_core::testing::{MockProbe, MockPublishPlatform, MockRemoteCollection};
//!
//! let collection = MockRemoteCollection::new();
//! collection.add_file("f1", "clip_1.mp4", "src", b"bytes").await;
//!
//! let platform = MockPublishPlatform::new();
//! platform.set_status_sequence(vec![ProcessingStatus::Pending, ProcessingStatus::Finished]).await;
//!
//! let probe = MockProbe::reachable_after(2);
//! ```

mod mock_collection;
mod mock_platform;
mod mock_probe;

pub use mock_collection::{CollectionCall, MockRemoteCollection};
pub use mock_platform::{MockPublishPlatform, PlatformCall};
pub use mock_probe::MockProbe;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::config::{
        CompletionPolicy, Config, DriveConfig, MediaConfig, NameFilterKind, PublisherConfig,
        SourceConfig, StagerConfig, StagingMode,
    };
    use crate::selector::{CandidateItem, OrderingKey};
    use crate::source::RemoteFile;

    /// Source collection id used by [`config`].
    pub const SOURCE: &str = "src";
    /// Consumed collection id used by [`config`].
    pub const CONSUMED: &str = "posted";

    /// A listed remote file inside `parent`.
    pub fn remote_file(id: &str, name: &str, parent: &str) -> RemoteFile {
        RemoteFile {
            id: id.to_string(),
            name: name.to_string(),
            size: None,
            parents: vec![parent.to_string()],
        }
    }

    /// A selected candidate without an ordering number.
    pub fn candidate(id: &str, name: &str) -> CandidateItem {
        CandidateItem {
            id: id.to_string(),
            name: name.to_string(),
            size_hint: None,
            ordering_key: OrderingKey::Unordered,
        }
    }

    /// A valid retrieve-mode configuration staging into `publish_dir`.
    ///
    /// Probe and poll intervals are one second with five attempts each.
    pub fn config(publish_dir: impl Into<PathBuf>) -> Config {
        Config {
            source: SourceConfig {
                collection_id: SOURCE.to_string(),
                consumed_collection_id: Some(CONSUMED.to_string()),
                completion: CompletionPolicy::Relocate,
                delete_if_relocation_fails: false,
                accept: NameFilterKind::Pattern,
                name_pattern: r"(?i)^clip_\d+\.(mp4|jpg)$".to_string(),
                ordering_pattern: r"(?i)clip_(\d+)".to_string(),
                drive: DriveConfig {
                    access_token: "drive-token".to_string(),
                    ..Default::default()
                },
            },
            stager: StagerConfig {
                mode: StagingMode::Retrieve,
                publish_dir: Some(publish_dir.into()),
                public_base_url: Some("https://someone.github.io/clips/media".to_string()),
                probe_interval_ms: 1_000,
                probe_max_attempts: 5,
                ..Default::default()
            },
            publisher: PublisherConfig {
                api_url: "https://graph.example.test/v19.0".to_string(),
                account_id: "acct".to_string(),
                access_token: "graph-token".to_string(),
                caption: "New clip #shorts".to_string(),
                poll_interval_ms: 1_000,
                poll_max_attempts: 5,
                timeout_secs: 5,
            },
            media: MediaConfig::default(),
        }
    }
}
