//! Mock publishing platform for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::publisher::{CreateJobRequest, PlatformError, ProcessingStatus, PublishPlatform};

/// A recorded platform call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    CreateJob(CreateJobRequest),
    JobStatus(String),
    Finalize(String),
}

/// Mock implementation of the PublishPlatform trait.
///
/// Job ids are `job-1`, `job-2`, ... and the published id of a job is
/// `published-<job id>`. Status polls walk the configured sequence and keep
/// returning its last entry; with no sequence every poll reports finished.
#[derive(Debug)]
pub struct MockPublishPlatform {
    calls: Arc<RwLock<Vec<PlatformCall>>>,
    statuses: Arc<RwLock<VecDeque<ProcessingStatus>>>,
    job_counter: Arc<RwLock<u32>>,
    next_create_error: Arc<RwLock<Option<PlatformError>>>,
    next_status_error: Arc<RwLock<Option<PlatformError>>>,
    next_finalize_error: Arc<RwLock<Option<PlatformError>>>,
}

impl Default for MockPublishPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPublishPlatform {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            statuses: Arc::new(RwLock::new(VecDeque::new())),
            job_counter: Arc::new(RwLock::new(0)),
            next_create_error: Arc::new(RwLock::new(None)),
            next_status_error: Arc::new(RwLock::new(None)),
            next_finalize_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Statuses returned by successive polls.
    pub async fn set_status_sequence(&self, statuses: Vec<ProcessingStatus>) {
        *self.statuses.write().await = statuses.into();
    }

    pub async fn set_next_create_error(&self, error: PlatformError) {
        *self.next_create_error.write().await = Some(error);
    }

    pub async fn set_next_status_error(&self, error: PlatformError) {
        *self.next_status_error.write().await = Some(error);
    }

    pub async fn set_next_finalize_error(&self, error: PlatformError) {
        *self.next_finalize_error.write().await = Some(error);
    }

    /// All recorded calls, in order.
    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.calls.read().await.clone()
    }

    /// Requests of every create call.
    pub async fn created_jobs(&self) -> Vec<CreateJobRequest> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                PlatformCall::CreateJob(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Job ids that were finalized.
    pub async fn finalized_jobs(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                PlatformCall::Finalize(job_id) => Some(job_id.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: PlatformCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl PublishPlatform for MockPublishPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_job(&self, request: &CreateJobRequest) -> Result<String, PlatformError> {
        self.record(PlatformCall::CreateJob(request.clone())).await;
        if let Some(error) = self.next_create_error.write().await.take() {
            return Err(error);
        }

        let mut counter = self.job_counter.write().await;
        *counter += 1;
        Ok(format!("job-{}", *counter))
    }

    async fn job_status(&self, job_id: &str) -> Result<ProcessingStatus, PlatformError> {
        self.record(PlatformCall::JobStatus(job_id.to_string())).await;
        if let Some(error) = self.next_status_error.write().await.take() {
            return Err(error);
        }

        let mut statuses = self.statuses.write().await;
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().copied()
        };
        Ok(status.unwrap_or(ProcessingStatus::Finished))
    }

    async fn finalize(&self, job_id: &str) -> Result<String, PlatformError> {
        self.record(PlatformCall::Finalize(job_id.to_string())).await;
        if let Some(error) = self.next_finalize_error.write().await.take() {
            return Err(error);
        }

        Ok(format!("published-{}", job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::MediaKind;

    #[tokio::test]
    async fn test_status_sequence_repeats_last() {
        let platform = MockPublishPlatform::new();
        platform
            .set_status_sequence(vec![ProcessingStatus::Pending, ProcessingStatus::Error])
            .await;

        assert_eq!(platform.job_status("j").await.unwrap(), ProcessingStatus::Pending);
        assert_eq!(platform.job_status("j").await.unwrap(), ProcessingStatus::Error);
        assert_eq!(platform.job_status("j").await.unwrap(), ProcessingStatus::Error);
    }

    #[tokio::test]
    async fn test_job_ids_increment() {
        let platform = MockPublishPlatform::new();
        let request = CreateJobRequest {
            media_url: "https://host/a.mp4".to_string(),
            caption: "c".to_string(),
            kind: MediaKind::Video,
        };

        assert_eq!(platform.create_job(&request).await.unwrap(), "job-1");
        assert_eq!(platform.create_job(&request).await.unwrap(), "job-2");
        assert_eq!(platform.finalize("job-2").await.unwrap(), "published-job-2");
        assert_eq!(platform.created_jobs().await.len(), 2);
        assert_eq!(platform.finalized_jobs().await, vec!["job-2"]);
    }
}
