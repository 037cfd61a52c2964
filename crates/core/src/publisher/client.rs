//! Submit / await / finalize protocol on top of a [`PublishPlatform`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::wait::{bounded_wait, Check, WaitOutcome, WaitPolicy};

use super::{
    CreateJobRequest, MediaKind, ProcessingJob, ProcessingStatus, PublishError, PublishPlatform,
    PublishResult, PublishStage,
};

/// Drives one media item through the platform's asynchronous publish protocol.
pub struct PublisherClient {
    platform: Arc<dyn PublishPlatform>,
    poll: WaitPolicy,
}

impl PublisherClient {
    pub fn new(platform: Arc<dyn PublishPlatform>, poll: WaitPolicy) -> Self {
        Self { platform, poll }
    }

    /// Create a processing job for a publicly reachable media URL.
    pub async fn submit(
        &self,
        media_url: &str,
        caption: &str,
        kind: MediaKind,
    ) -> Result<ProcessingJob, PublishError> {
        let request = CreateJobRequest {
            media_url: media_url.to_string(),
            caption: caption.to_string(),
            kind,
        };

        let job_id = self
            .platform
            .create_job(&request)
            .await
            .map_err(|e| PublishError::new(PublishStage::Submit, e.to_string()))?;

        info!(
            platform = self.platform.name(),
            job_id = %job_id,
            kind = kind.as_str(),
            "Submitted processing job"
        );

        Ok(ProcessingJob {
            job_id,
            kind,
            status: ProcessingStatus::Pending,
            created_at: Utc::now(),
        })
    }

    /// Poll until the job finishes, returning the number of polls issued.
    ///
    /// Images are not processed asynchronously and are marked finished
    /// without polling.
    pub async fn await_processing(&self, job: &mut ProcessingJob) -> Result<u32, PublishError> {
        if !job.kind.needs_processing() {
            job.status = ProcessingStatus::Finished;
            debug!(job_id = %job.job_id, "Image job needs no processing wait");
            return Ok(0);
        }

        let platform = &self.platform;
        let job_id = job.job_id.as_str();

        let outcome = bounded_wait(self.poll, |attempt| async move {
            let status = platform
                .job_status(job_id)
                .await
                .map_err(|e| PublishError::new(PublishStage::Processing, e.to_string()))?;

            debug!(job_id, attempt, ?status, "Polled processing status");
            Ok::<_, PublishError>(if status.is_terminal() {
                Check::Ready(status)
            } else {
                Check::Pending
            })
        })
        .await?;

        match outcome {
            WaitOutcome::Ready {
                value: ProcessingStatus::Finished,
                attempts,
            } => {
                job.status = ProcessingStatus::Finished;
                info!(job_id, polls = attempts, "Processing finished");
                Ok(attempts)
            }
            WaitOutcome::Ready { attempts, .. } => {
                job.status = ProcessingStatus::Error;
                warn!(job_id, polls = attempts, "Platform reported processing error");
                Err(PublishError::new(
                    PublishStage::Processing,
                    PublishError::REMOTE_ERROR,
                ))
            }
            WaitOutcome::Exhausted { attempts } => {
                warn!(job_id, polls = attempts, "Processing did not finish in time");
                Err(PublishError::new(PublishStage::Processing, PublishError::TIMEOUT))
            }
        }
    }

    /// Make a finished job visible, returning the published content id.
    pub async fn finalize(&self, job: &ProcessingJob) -> Result<String, PublishError> {
        if job.status != ProcessingStatus::Finished {
            return Err(PublishError::new(
                PublishStage::Finalize,
                format!("job {} is not finished", job.job_id),
            ));
        }

        let published_id = self
            .platform
            .finalize(&job.job_id)
            .await
            .map_err(|e| PublishError::new(PublishStage::Finalize, e.to_string()))?;

        info!(job_id = %job.job_id, published_id = %published_id, "Published media");
        Ok(published_id)
    }

    /// Submit, await and finalize in one call.
    pub async fn publish(
        &self,
        media_url: &str,
        caption: &str,
        kind: MediaKind,
    ) -> Result<PublishResult, PublishError> {
        let mut job = self.submit(media_url, caption, kind).await?;
        let polls = self.await_processing(&mut job).await?;
        let published_id = self.finalize(&job).await?;

        Ok(PublishResult {
            job_id: job.job_id,
            published_id,
            polls,
        })
    }
}
