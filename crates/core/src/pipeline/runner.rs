//! One publication run: select, stage, publish, consume.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{Config, MediaConfig};
use crate::marker::CompletionMarker;
use crate::publisher::{PublishPlatform, PublisherClient};
use crate::selector::{CandidateItem, ItemSelector};
use crate::source::RemoteCollection;
use crate::stager::{ReachabilityProbe, Stager};

use super::types::{PipelineError, RunFailure, RunOutcome, RunReport, RunState};

/// Sequences the components of a run.
///
/// Runs are strictly sequential and carry no state between them: every run
/// re-derives what to do from the source collection.
pub struct PublicationPipeline {
    collection: Arc<dyn RemoteCollection>,
    selector: ItemSelector,
    stager: Stager,
    publisher: PublisherClient,
    marker: CompletionMarker,
    media: MediaConfig,
    caption: String,
    fingerprint: Option<String>,
}

/// What the current run has established so far.
struct RunProgress {
    run_id: Uuid,
    state: Option<RunState>,
    item: Option<CandidateItem>,
    published_id: Option<String>,
}

impl RunProgress {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: None,
            item: None,
            published_id: None,
        }
    }

    fn advance(&mut self, state: RunState) {
        info!(from = ?self.state.map(|s| s.as_str()), to = state.as_str(), "Run state transition");
        self.state = Some(state);
    }

    fn fail(&self, error: PipelineError) -> RunFailure {
        RunFailure {
            run_id: self.run_id,
            last_state: self.state,
            item: self.item.clone(),
            published_id: self.published_id.clone(),
            error,
        }
    }
}

impl PublicationPipeline {
    pub fn new(
        collection: Arc<dyn RemoteCollection>,
        selector: ItemSelector,
        stager: Stager,
        publisher: PublisherClient,
        marker: CompletionMarker,
        media: MediaConfig,
        caption: impl Into<String>,
    ) -> Self {
        Self {
            collection,
            selector,
            stager,
            publisher,
            marker,
            media,
            caption: caption.into(),
            fingerprint: None,
        }
    }

    /// Wire a pipeline from configuration and the three external backends.
    pub fn from_config(
        config: &Config,
        collection: Arc<dyn RemoteCollection>,
        probe: Arc<dyn ReachabilityProbe>,
        platform: Arc<dyn PublishPlatform>,
    ) -> Result<Self, PipelineError> {
        let selector = ItemSelector::from_config(&config.source, &config.media)?;
        let stager = Stager::new(config.stager.clone(), Arc::clone(&collection), probe);
        let publisher = PublisherClient::new(platform, config.publisher.poll_policy());
        let marker = CompletionMarker::from_config(&config.source, Arc::clone(&collection))?;

        Ok(Self::new(
            collection,
            selector,
            stager,
            publisher,
            marker,
            config.media.clone(),
            config.publisher.caption.clone(),
        ))
    }

    /// Attach a configuration fingerprint to run reports.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Execute one run.
    pub async fn run_once(&self) -> Result<RunOutcome, RunFailure> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);
        self.execute(run_id).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid) -> Result<RunOutcome, RunFailure> {
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let mut run = RunProgress::new(run_id);

        info!(
            source = self.collection.name(),
            mode = ?self.stager.mode(),
            "Run started"
        );

        self.stager
            .prepare()
            .await
            .map_err(|e| run.fail(e.into()))?;

        let item = match self.selector.select_next(self.collection.as_ref()).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                info!("Nothing to publish");
                return Ok(RunOutcome::NothingToPublish);
            }
            Err(e) => return Err(run.fail(e.into())),
        };
        run.item = Some(item.clone());
        run.advance(RunState::Selected);

        let kind = self.media.kind_of(&item.name).ok_or_else(|| {
            run.fail(PipelineError::UnsupportedMedia {
                name: item.name.clone(),
            })
        })?;

        let asset = self
            .stager
            .stage(&item)
            .await
            .map_err(|e| run.fail(e.into()))?;
        run.advance(RunState::Staged);

        let mut job = self
            .publisher
            .submit(&asset.public_url, &self.caption, kind)
            .await
            .map_err(|e| run.fail(e.into()))?;
        run.advance(RunState::Submitted);

        let polls = self
            .publisher
            .await_processing(&mut job)
            .await
            .map_err(|e| run.fail(e.into()))?;
        run.advance(RunState::Processed);

        let published_id = self
            .publisher
            .finalize(&job)
            .await
            .map_err(|e| run.fail(e.into()))?;
        run.published_id = Some(published_id.clone());
        run.advance(RunState::Finalized);

        // Nothing may run between finalize and the marker.
        let consumption = match self.marker.mark_consumed(&item).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    item_id = %item.id,
                    published_id = %published_id,
                    "Item is live but still selectable; the next run will publish it again"
                );
                return Err(run.fail(e.into()));
            }
        };
        run.advance(RunState::Consumed);

        let report = RunReport {
            run_id,
            item_id: item.id,
            item_name: item.name,
            kind,
            public_url: asset.public_url,
            size_bytes: asset.size_bytes,
            sha256: asset.sha256,
            probe_attempts: asset.probe_attempts,
            job_id: job.job_id,
            polls,
            published_id,
            consumption,
            state: RunState::Consumed,
            started_at,
            finished_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
            config_fingerprint: self.fingerprint.clone(),
        };

        match serde_json::to_string(&report) {
            Ok(json) => info!(report = %json, "Run finished"),
            Err(e) => warn!(error = %e, "Failed to serialise run report"),
        }

        Ok(RunOutcome::Published(report))
    }
}
