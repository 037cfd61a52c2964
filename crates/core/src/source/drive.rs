//! Google Drive v3 source collection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::DriveConfig;

use super::{RemoteCollection, RemoteFile, SourceError};

/// Fields requested for every listed file.
const LIST_FIELDS: &str = "nextPageToken, files(id, name, size, parents)";

/// Maximum page size accepted by the Drive API.
const PAGE_SIZE: &str = "1000";

/// Stable listing order; ties between equal ordering keys follow it.
const LIST_ORDER: &str = "createdTime,name";

/// Drive REST client authenticated with a pre-provisioned bearer token.
pub struct DriveClient {
    client: Client,
    config: DriveConfig,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(config: DriveConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SourceError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.base_url(), urlencoding::encode(file_id))
    }

    /// Map a non-success response to a [`SourceError`].
    async fn check(response: Response, file_id: &str) -> Result<Response, SourceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = format!(
            "HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        );

        Err(match status {
            StatusCode::NOT_FOUND => SourceError::NotFound(file_id.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                SourceError::AuthenticationFailed(detail)
            }
            _ => SourceError::ApiError(detail),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
    /// Drive encodes int64 values as strings.
    size: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    trashed: bool,
}

impl From<DriveFile> for RemoteFile {
    fn from(file: DriveFile) -> Self {
        RemoteFile {
            id: file.id,
            name: file.name,
            size: file.size.and_then(|s| s.parse().ok()),
            parents: file.parents,
        }
    }
}

#[async_trait]
impl RemoteCollection for DriveClient {
    fn name(&self) -> &str {
        "google_drive"
    }

    async fn list(&self, parent_id: &str) -> Result<Vec<RemoteFile>, SourceError> {
        let url = format!("{}/files", self.base_url());
        let query = format!("'{}' in parents and trashed=false", parent_id.replace('\'', "\\'"));

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
                ("orderBy", LIST_ORDER),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.config.access_token)
                .query(&params)
                .send()
                .await
                .map_err(SourceError::from_reqwest)?;

            let page: FileListResponse = Self::check(response, parent_id)
                .await?
                .json()
                .await
                .map_err(|e| SourceError::ApiError(format!("Failed to parse file list: {}", e)))?;

            debug!(parent_id, count = page.files.len(), "Listed Drive page");
            files.extend(page.files.into_iter().filter(|f| !f.trashed).map(RemoteFile::from));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }

    async fn download(
        &self,
        file_id: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, SourceError> {
        let response = self
            .client
            .get(self.file_url(file_id))
            .bearer_auth(&self.config.access_token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        let mut response = Self::check(response, file_id).await?;

        let mut total_bytes = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(SourceError::from_reqwest)? {
            sink.write_all(&chunk).await?;
            total_bytes += chunk.len() as u64;
        }
        sink.flush().await?;

        debug!(file_id, total_bytes, "Downloaded Drive file");
        Ok(total_bytes)
    }

    async fn parents(&self, file_id: &str) -> Result<Option<Vec<String>>, SourceError> {
        let response = self
            .client
            .get(self.file_url(file_id))
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", "id, name, parents, trashed")])
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        let file: DriveFile = match Self::check(response, file_id).await {
            Ok(response) => response
                .json()
                .await
                .map_err(|e| SourceError::ApiError(format!("Failed to parse file: {}", e)))?,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        if file.trashed {
            return Ok(None);
        }
        Ok(Some(file.parents))
    }

    async fn update_parents(
        &self,
        file_id: &str,
        add: Option<&str>,
        remove: Option<&str>,
    ) -> Result<(), SourceError> {
        let mut params = vec![("fields", "id, parents")];
        if let Some(add) = add {
            params.push(("addParents", add));
        }
        if let Some(remove) = remove {
            params.push(("removeParents", remove));
        }

        let response = self
            .client
            .patch(self.file_url(file_id))
            .bearer_auth(&self.config.access_token)
            .query(&params)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        Self::check(response, file_id).await?;
        debug!(file_id, ?add, ?remove, "Updated Drive parents");
        Ok(())
    }

    async fn delete(&self, file_id: &str) -> Result<(), SourceError> {
        let response = self
            .client
            .delete(self.file_url(file_id))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;

        Self::check(response, file_id).await?;
        debug!(file_id, "Deleted Drive file");
        Ok(())
    }
}
