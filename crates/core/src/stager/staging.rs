//! Stager implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use crate::config::{StagerConfig, StagingMode};
use crate::selector::CandidateItem;
use crate::source::RemoteCollection;
use crate::wait::{bounded_wait, Check, WaitOutcome};

use super::error::StagingError;
use super::probe::ReachabilityProbe;
use super::types::StagedAsset;

/// Buffer size for writing and hashing staged files.
const BUFFER_SIZE: usize = 1024 * 1024;

/// Makes candidate items publicly reachable.
pub struct Stager {
    config: StagerConfig,
    collection: Arc<dyn RemoteCollection>,
    probe: Arc<dyn ReachabilityProbe>,
}

impl Stager {
    pub fn new(
        config: StagerConfig,
        collection: Arc<dyn RemoteCollection>,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> Self {
        Self {
            config,
            collection,
            probe,
        }
    }

    pub fn mode(&self) -> StagingMode {
        self.config.mode
    }

    fn publish_dir(&self) -> Result<&Path, StagingError> {
        self.config
            .publish_dir
            .as_deref()
            .ok_or_else(|| StagingError::Misconfigured("publish_dir is not set".to_string()))
    }

    fn public_base_url(&self) -> Result<&str, StagingError> {
        self.config
            .public_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .ok_or_else(|| StagingError::Misconfigured("public_base_url is not set".to_string()))
    }

    /// Clear the publish directory so a stale file from an earlier run can
    /// never be served under a reused name. No-op in direct-link mode.
    pub async fn prepare(&self) -> Result<(), StagingError> {
        if self.config.mode == StagingMode::DirectLink {
            return Ok(());
        }

        let dir = self.publish_dir()?;
        let prepare_failed = |source: std::io::Error| StagingError::PrepareFailed {
            path: dir.to_path_buf(),
            source,
        };

        match fs::remove_dir_all(dir).await {
            Ok(()) => debug!(dir = %dir.display(), "Removed previous publish directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(prepare_failed(e)),
        }
        fs::create_dir_all(dir).await.map_err(prepare_failed)?;

        info!(dir = %dir.display(), "Publish directory cleared");
        Ok(())
    }

    /// Public URL an item will be served under in retrieve mode.
    pub fn public_url_for(&self, name: &str) -> Result<String, StagingError> {
        Ok(format!(
            "{}/{}",
            self.public_base_url()?,
            urlencoding::encode(name)
        ))
    }

    /// Direct-download URL for an item id.
    pub fn direct_link_for(&self, item_id: &str) -> String {
        self.config
            .direct_link_template
            .replace("{id}", &urlencoding::encode(item_id))
    }

    /// Stage `item` according to the configured mode.
    pub async fn stage(&self, item: &CandidateItem) -> Result<StagedAsset, StagingError> {
        match self.config.mode {
            StagingMode::DirectLink => {
                let public_url = self.direct_link_for(&item.id);
                info!(item_id = %item.id, url = %public_url, "Using direct link");
                Ok(StagedAsset {
                    item_id: item.id.clone(),
                    local_path: None,
                    public_url,
                    size_bytes: None,
                    sha256: None,
                    probe_attempts: 0,
                })
            }
            StagingMode::Retrieve => self.stage_retrieved(item).await,
        }
    }

    async fn stage_retrieved(&self, item: &CandidateItem) -> Result<StagedAsset, StagingError> {
        validate_file_name(&item.name)?;

        let public_url = self.public_url_for(&item.name)?;
        let local_path = self.publish_dir()?.join(&item.name);

        let size_bytes = self.retrieve(item, &local_path).await?;
        let sha256 = checksum(&local_path).await?;
        info!(
            item_id = %item.id,
            path = %local_path.display(),
            size_bytes,
            "Retrieved item into publish directory"
        );

        let probe_attempts = self.await_reachable(&public_url).await?;

        Ok(StagedAsset {
            item_id: item.id.clone(),
            local_path: Some(local_path),
            public_url,
            size_bytes: Some(size_bytes),
            sha256: Some(sha256),
            probe_attempts,
        })
    }

    /// Stream the item bytes to `path`. A partial file is removed on failure.
    async fn retrieve(&self, item: &CandidateItem, path: &Path) -> Result<u64, StagingError> {
        let file = File::create(path)
            .await
            .map_err(|e| StagingError::io(path, e))?;
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);

        let result = self.collection.download(&item.id, &mut writer).await;
        let result = match result {
            Ok(bytes) => writer
                .flush()
                .await
                .map(|()| bytes)
                .map_err(|e| StagingError::io(path, e)),
            Err(source) => Err(StagingError::RetrievalFailed {
                item_id: item.id.clone(),
                source,
            }),
        };

        if result.is_err() {
            drop(writer);
            if let Err(e) = fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove partial file");
            }
        }
        result
    }

    /// Probe `url` until it answers, returning the number of probes issued.
    async fn await_reachable(&self, url: &str) -> Result<u32, StagingError> {
        if self.config.settle_delay_ms > 0 {
            debug!(delay_ms = self.config.settle_delay_ms, "Waiting before first probe");
            tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        }

        let policy = self.config.probe_policy();
        let probe = &self.probe;

        let outcome = bounded_wait(policy, |attempt| async move {
            if probe.probe(url).await {
                Ok::<_, std::convert::Infallible>(Check::Ready(()))
            } else {
                debug!(
                    url,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "Public URL not reachable yet"
                );
                Ok(Check::Pending)
            }
        })
        .await;

        match outcome {
            Ok(WaitOutcome::Ready { attempts, .. }) => {
                info!(url, attempts, "Public URL reachable");
                Ok(attempts)
            }
            Ok(WaitOutcome::Exhausted { attempts }) => {
                warn!(url, attempts, "Public URL never became reachable");
                Err(StagingError::NotReachable {
                    url: url.to_string(),
                    attempts,
                })
            }
            Err(never) => match never {},
        }
    }
}

/// Reject names that would escape the publish directory.
fn validate_file_name(name: &str) -> Result<(), StagingError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');

    if invalid {
        return Err(StagingError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// SHA-256 of a file as lowercase hex.
async fn checksum(path: &Path) -> Result<String, StagingError> {
    let to_error = |e: std::io::Error| StagingError::io(PathBuf::from(path), e);

    let file = File::open(path).await.map_err(to_error)?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer).await.map_err(to_error)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use crate::testing::{fixtures, MockProbe, MockRemoteCollection};
    use tempfile::TempDir;

    struct TestHarness {
        collection: Arc<MockRemoteCollection>,
        probe: Arc<MockProbe>,
        temp_dir: TempDir,
    }

    impl TestHarness {
        fn new(probe: MockProbe) -> Self {
            Self {
                collection: Arc::new(MockRemoteCollection::new()),
                probe: Arc::new(probe),
                temp_dir: TempDir::new().expect("Failed to create temp dir"),
            }
        }

        fn publish_dir(&self) -> PathBuf {
            self.temp_dir.path().join("media")
        }

        fn config(&self) -> StagerConfig {
            StagerConfig {
                mode: StagingMode::Retrieve,
                publish_dir: Some(self.publish_dir()),
                public_base_url: Some("https://someone.github.io/clips/media/".to_string()),
                probe_interval_ms: 1000,
                probe_max_attempts: 5,
                ..Default::default()
            }
        }

        fn stager(&self, config: StagerConfig) -> Stager {
            Stager::new(
                config,
                Arc::clone(&self.collection) as Arc<dyn RemoteCollection>,
                Arc::clone(&self.probe) as Arc<dyn ReachabilityProbe>,
            )
        }
    }

    #[tokio::test]
    async fn test_prepare_clears_stale_files() {
        let harness = TestHarness::new(MockProbe::always());
        let dir = harness.publish_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("clip_1.mp4"), b"stale").unwrap();

        let stager = harness.stager(harness.config());
        stager.prepare().await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_creates_missing_directory() {
        let harness = TestHarness::new(MockProbe::always());
        let stager = harness.stager(harness.config());
        stager.prepare().await.unwrap();
        assert!(harness.publish_dir().is_dir());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_retrieve_writes_file_and_probes() {
        let harness = TestHarness::new(MockProbe::reachable_after(3));
        harness
            .collection
            .add_file("f1", "clip 1.mp4", "src", b"video-bytes")
            .await;

        let stager = harness.stager(harness.config());
        stager.prepare().await.unwrap();

        let item = fixtures::candidate("f1", "clip 1.mp4");
        let asset = stager.stage(&item).await.unwrap();

        let local_path = asset.local_path.clone().unwrap();
        assert_eq!(std::fs::read(&local_path).unwrap(), b"video-bytes");
        assert_eq!(
            asset.public_url,
            "https://someone.github.io/clips/media/clip%201.mp4"
        );
        assert_eq!(asset.size_bytes, Some(11));
        let expected = format!("{:x}", Sha256::digest(b"video-bytes"));
        assert_eq!(asset.sha256.as_deref(), Some(expected.as_str()));
        assert_eq!(asset.probe_attempts, 3);
        assert_eq!(harness.probe.probe_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_unreachable_fails_after_exact_attempts() {
        let harness = TestHarness::new(MockProbe::never());
        harness
            .collection
            .add_file("f1", "clip_1.mp4", "src", b"bytes")
            .await;

        let stager = harness.stager(harness.config());
        stager.prepare().await.unwrap();

        let start = tokio::time::Instant::now();
        let err = stager
            .stage(&fixtures::candidate("f1", "clip_1.mp4"))
            .await
            .unwrap_err();

        match err {
            StagingError::NotReachable { attempts, url } => {
                assert_eq!(attempts, 5);
                assert!(url.ends_with("/media/clip_1.mp4"));
            }
            other => panic!("Expected NotReachable, got {:?}", other),
        }
        assert_eq!(harness.probe.probe_count().await, 5);
        // Four intervals between five probes.
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_waits_settle_delay_before_probing() {
        let harness = TestHarness::new(MockProbe::always());
        harness
            .collection
            .add_file("f1", "clip_1.mp4", "src", b"bytes")
            .await;

        let mut config = harness.config();
        config.settle_delay_ms = 30_000;
        let stager = harness.stager(config);
        stager.prepare().await.unwrap();

        let start = tokio::time::Instant::now();
        let asset = stager
            .stage(&fixtures::candidate("f1", "clip_1.mp4"))
            .await
            .unwrap();

        assert_eq!(asset.probe_attempts, 1);
        assert_eq!(start.elapsed(), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn test_stage_retrieval_failure_removes_partial_file() {
        let harness = TestHarness::new(MockProbe::always());
        harness
            .collection
            .fail_next_download(SourceError::ConnectionFailed("reset".into()))
            .await;

        let stager = harness.stager(harness.config());
        stager.prepare().await.unwrap();

        let err = stager
            .stage(&fixtures::candidate("f1", "clip_1.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, StagingError::RetrievalFailed { .. }));
        assert!(err.is_transient());
        assert!(!harness.publish_dir().join("clip_1.mp4").exists());
        assert_eq!(harness.probe.probe_count().await, 0);
    }

    #[tokio::test]
    async fn test_stage_rejects_path_like_names() {
        let harness = TestHarness::new(MockProbe::always());
        let stager = harness.stager(harness.config());
        stager.prepare().await.unwrap();

        for name in ["../escape.mp4", "nested/clip_1.mp4", "..", ""] {
            let err = stager
                .stage(&fixtures::candidate("f1", name))
                .await
                .unwrap_err();
            assert!(
                matches!(err, StagingError::InvalidName { .. }),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_stage_direct_link_skips_download_and_probe() {
        let harness = TestHarness::new(MockProbe::never());
        let config = StagerConfig {
            mode: StagingMode::DirectLink,
            ..Default::default()
        };
        let stager = harness.stager(config);
        stager.prepare().await.unwrap();

        let asset = stager
            .stage(&fixtures::candidate("1AbC", "clip_1.mp4"))
            .await
            .unwrap();

        assert_eq!(
            asset.public_url,
            "https://drive.google.com/uc?export=download&id=1AbC"
        );
        assert_eq!(asset.local_path, None);
        assert_eq!(asset.probe_attempts, 0);
        assert_eq!(harness.probe.probe_count().await, 0);
        assert!(harness.collection.calls().await.is_empty());
        assert!(!harness.publish_dir().exists());
    }

    #[tokio::test]
    async fn test_retrieve_mode_without_publish_dir_is_misconfigured() {
        let harness = TestHarness::new(MockProbe::always());
        let stager = harness.stager(StagerConfig::default());
        let err = stager.prepare().await.unwrap_err();
        assert!(matches!(err, StagingError::Misconfigured(_)));
    }
}
