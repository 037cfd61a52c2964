//! Mock remote collection for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;

use crate::source::{RemoteCollection, RemoteFile, SourceError};

/// A recorded call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionCall {
    List(String),
    Download(String),
    Parents(String),
    UpdateParents {
        file_id: String,
        add: Option<String>,
        remove: Option<String>,
    },
    Delete(String),
}

#[derive(Debug, Clone)]
struct MockFile {
    id: String,
    name: String,
    parents: Vec<String>,
    content: Vec<u8>,
}

impl MockFile {
    fn to_remote(&self) -> RemoteFile {
        RemoteFile {
            id: self.id.clone(),
            name: self.name.clone(),
            size: Some(self.content.len() as u64),
            parents: self.parents.clone(),
        }
    }
}

/// One-shot failures, consumed by the next call of the matching operation.
#[derive(Debug, Default)]
struct PendingFailures {
    list: Option<SourceError>,
    download: Option<SourceError>,
    parents: Option<SourceError>,
    update: Option<SourceError>,
    delete: Option<SourceError>,
}

/// In-memory implementation of the RemoteCollection trait.
///
/// Files keep their insertion order, which is also the listing order.
///
/// # Example
///
/// ```rust,ignore
/// let collection = MockRemoteCollection::new();
/// collection.add_file("f1", "clip_1.mp4", "src", b"bytes").await;
///
/// collection.fail_next_update(SourceError::Timeout).await;
///
/// let calls = collection.calls().await;
/// ```
#[derive(Debug)]
pub struct MockRemoteCollection {
    files: Arc<RwLock<Vec<MockFile>>>,
    calls: Arc<RwLock<Vec<CollectionCall>>>,
    failures: Arc<RwLock<PendingFailures>>,
}

impl Default for MockRemoteCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteCollection {
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(Vec::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(PendingFailures::default())),
        }
    }

    /// Add a file inside `parent`.
    pub async fn add_file(&self, id: &str, name: &str, parent: &str, content: &[u8]) {
        self.files.write().await.push(MockFile {
            id: id.to_string(),
            name: name.to_string(),
            parents: vec![parent.to_string()],
            content: content.to_vec(),
        });
    }

    /// All recorded calls, in order.
    pub async fn calls(&self) -> Vec<CollectionCall> {
        self.calls.read().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Ids of the files currently inside `parent`, in listing order.
    pub async fn files_in(&self, parent: &str) -> Vec<String> {
        self.files
            .read()
            .await
            .iter()
            .filter(|f| f.parents.iter().any(|p| p == parent))
            .map(|f| f.id.clone())
            .collect()
    }

    /// Whether the file still exists anywhere.
    pub async fn contains(&self, id: &str) -> bool {
        self.files.read().await.iter().any(|f| f.id == id)
    }

    pub async fn parents_of(&self, id: &str) -> Option<Vec<String>> {
        self.files
            .read()
            .await
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.parents.clone())
    }

    pub async fn fail_next_list(&self, error: SourceError) {
        self.failures.write().await.list = Some(error);
    }

    pub async fn fail_next_download(&self, error: SourceError) {
        self.failures.write().await.download = Some(error);
    }

    pub async fn fail_next_parents(&self, error: SourceError) {
        self.failures.write().await.parents = Some(error);
    }

    pub async fn fail_next_update(&self, error: SourceError) {
        self.failures.write().await.update = Some(error);
    }

    pub async fn fail_next_delete(&self, error: SourceError) {
        self.failures.write().await.delete = Some(error);
    }

    async fn record(&self, call: CollectionCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl RemoteCollection for MockRemoteCollection {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list(&self, parent_id: &str) -> Result<Vec<RemoteFile>, SourceError> {
        self.record(CollectionCall::List(parent_id.to_string())).await;
        if let Some(error) = self.failures.write().await.list.take() {
            return Err(error);
        }

        Ok(self
            .files
            .read()
            .await
            .iter()
            .filter(|f| f.parents.iter().any(|p| p == parent_id))
            .map(MockFile::to_remote)
            .collect())
    }

    async fn download(
        &self,
        file_id: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, SourceError> {
        self.record(CollectionCall::Download(file_id.to_string())).await;
        if let Some(error) = self.failures.write().await.download.take() {
            return Err(error);
        }

        let content = self
            .files
            .read()
            .await
            .iter()
            .find(|f| f.id == file_id)
            .map(|f| f.content.clone())
            .ok_or_else(|| SourceError::NotFound(file_id.to_string()))?;

        sink.write_all(&content).await?;
        sink.flush().await?;
        Ok(content.len() as u64)
    }

    async fn parents(&self, file_id: &str) -> Result<Option<Vec<String>>, SourceError> {
        self.record(CollectionCall::Parents(file_id.to_string())).await;
        if let Some(error) = self.failures.write().await.parents.take() {
            return Err(error);
        }

        Ok(self.parents_of(file_id).await)
    }

    async fn update_parents(
        &self,
        file_id: &str,
        add: Option<&str>,
        remove: Option<&str>,
    ) -> Result<(), SourceError> {
        self.record(CollectionCall::UpdateParents {
            file_id: file_id.to_string(),
            add: add.map(str::to_string),
            remove: remove.map(str::to_string),
        })
        .await;
        if let Some(error) = self.failures.write().await.update.take() {
            return Err(error);
        }

        let mut files = self.files.write().await;
        let file = files
            .iter_mut()
            .find(|f| f.id == file_id)
            .ok_or_else(|| SourceError::NotFound(file_id.to_string()))?;

        if let Some(add) = add {
            if !file.parents.iter().any(|p| p == add) {
                file.parents.push(add.to_string());
            }
        }
        if let Some(remove) = remove {
            file.parents.retain(|p| p != remove);
        }
        Ok(())
    }

    async fn delete(&self, file_id: &str) -> Result<(), SourceError> {
        self.record(CollectionCall::Delete(file_id.to_string())).await;
        if let Some(error) = self.failures.write().await.delete.take() {
            return Err(error);
        }

        let mut files = self.files.write().await;
        let before = files.len();
        files.retain(|f| f.id != file_id);
        if files.len() == before {
            return Err(SourceError::NotFound(file_id.to_string()));
        }
        Ok(())
    }
}
