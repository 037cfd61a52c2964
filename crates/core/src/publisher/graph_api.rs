//! Instagram Graph API publishing backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PublisherConfig;

use super::{CreateJobRequest, MediaKind, PlatformError, ProcessingStatus, PublishPlatform};

/// Graph API error code for an invalid or expired access token.
const OAUTH_ERROR_CODE: i64 = 190;

/// Graph API client publishing to a single account.
pub struct GraphApiClient {
    client: Client,
    config: PublisherConfig,
}

impl GraphApiClient {
    /// Create a new Graph API client.
    pub fn new(config: PublisherConfig) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| PlatformError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    fn account_url(&self, edge: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url(),
            urlencoding::encode(&self.config.account_id),
            edge
        )
    }

    /// Decode a Graph response, mapping error envelopes to [`PlatformError`].
    async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, PlatformError> {
        let status = response.status();
        let body = response.text().await.map_err(PlatformError::from_reqwest)?;

        if !status.is_success() {
            let envelope: Option<ErrorEnvelope> = serde_json::from_str(&body).ok();
            return Err(match envelope {
                Some(ErrorEnvelope { error }) if error.code == Some(OAUTH_ERROR_CODE) => {
                    PlatformError::AuthenticationFailed(error.message)
                }
                Some(ErrorEnvelope { error }) => {
                    PlatformError::ApiError(format!("HTTP {}: {}", status, error.message))
                }
                None => PlatformError::ApiError(format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                )),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| PlatformError::ApiError(format!("Failed to parse response: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct CreateContainerBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    media_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    caption: &'a str,
}

impl<'a> CreateContainerBody<'a> {
    fn from_request(request: &'a CreateJobRequest) -> Self {
        match request.kind {
            MediaKind::Video => Self {
                media_type: Some("REELS"),
                video_url: Some(&request.media_url),
                image_url: None,
                caption: &request.caption,
            },
            MediaKind::Image => Self {
                media_type: None,
                video_url: None,
                image_url: Some(&request.media_url),
                caption: &request.caption,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct PublishBody<'a> {
    creation_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: Option<String>,
}

impl IdResponse {
    fn into_id(self) -> Result<String, PlatformError> {
        self.id
            .filter(|id| !id.is_empty())
            .ok_or(PlatformError::MissingId)
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    code: Option<i64>,
}

/// Map a container `status_code` to a processing status.
fn parse_status_code(code: &str) -> ProcessingStatus {
    match code {
        "FINISHED" | "PUBLISHED" => ProcessingStatus::Finished,
        "ERROR" | "EXPIRED" => ProcessingStatus::Error,
        _ => ProcessingStatus::Pending,
    }
}

#[async_trait]
impl PublishPlatform for GraphApiClient {
    fn name(&self) -> &str {
        "instagram_graph"
    }

    async fn create_job(&self, request: &CreateJobRequest) -> Result<String, PlatformError> {
        let body = CreateContainerBody::from_request(request);

        let response = self
            .client
            .post(self.account_url("media"))
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(PlatformError::from_reqwest)?;

        let id = Self::decode::<IdResponse>(response).await?.into_id()?;
        debug!(container_id = %id, kind = request.kind.as_str(), "Created media container");
        Ok(id)
    }

    async fn job_status(&self, job_id: &str) -> Result<ProcessingStatus, PlatformError> {
        let url = format!("{}/{}", self.base_url(), urlencoding::encode(job_id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", "status_code")])
            .send()
            .await
            .map_err(PlatformError::from_reqwest)?;

        let status: StatusResponse = Self::decode(response).await?;
        let code = status.status_code.unwrap_or_default();
        debug!(container_id = job_id, status_code = %code, "Polled container status");
        Ok(parse_status_code(&code))
    }

    async fn finalize(&self, job_id: &str) -> Result<String, PlatformError> {
        let response = self
            .client
            .post(self.account_url("media_publish"))
            .bearer_auth(&self.config.access_token)
            .json(&PublishBody { creation_id: job_id })
            .send()
            .await
            .map_err(PlatformError::from_reqwest)?;

        let id = Self::decode::<IdResponse>(response).await?.into_id()?;
        debug!(container_id = job_id, media_id = %id, "Published container");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GraphApiClient {
        GraphApiClient::new(PublisherConfig {
            api_url: server.uri(),
            account_id: "1784".to_string(),
            access_token: "graph-token".to_string(),
            caption: "unused".to_string(),
            poll_interval_ms: 10,
            poll_max_attempts: 3,
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn request(kind: MediaKind) -> CreateJobRequest {
        CreateJobRequest {
            media_url: "https://host/media/clip_1.mp4".to_string(),
            caption: "hello #tag".to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn test_create_video_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1784/media"))
            .and(header("authorization", "Bearer graph-token"))
            .and(body_json(json!({
                "media_type": "REELS",
                "video_url": "https://host/media/clip_1.mp4",
                "caption": "hello #tag"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "container-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server)
            .create_job(&request(MediaKind::Video))
            .await
            .unwrap();
        assert_eq!(id, "container-1");
    }

    #[tokio::test]
    async fn test_create_image_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1784/media"))
            .and(body_json(json!({
                "image_url": "https://host/media/clip_1.mp4",
                "caption": "hello #tag"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "container-2"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server)
            .create_job(&request(MediaKind::Image))
            .await
            .unwrap();
        assert_eq!(id, "container-2");
    }

    #[tokio::test]
    async fn test_create_job_without_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1784/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_job(&request(MediaKind::Video))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::MissingId));
    }

    #[tokio::test]
    async fn test_expired_token_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1784/media"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Session has expired", "type": "OAuthException", "code": 190}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_job(&request(MediaKind::Video))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlatformError::AuthenticationFailed(msg) if msg == "Session has expired"
        ));
    }

    #[tokio::test]
    async fn test_job_status_mapping() {
        let server = MockServer::start().await;
        for (id, code) in [
            ("c1", "IN_PROGRESS"),
            ("c2", "FINISHED"),
            ("c3", "ERROR"),
            ("c4", "EXPIRED"),
        ] {
            Mock::given(method("GET"))
                .and(path(format!("/{}", id)))
                .and(query_param("fields", "status_code"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"id": id, "status_code": code})),
                )
                .mount(&server)
                .await;
        }

        let client = client_for(&server);
        assert_eq!(client.job_status("c1").await.unwrap(), ProcessingStatus::Pending);
        assert_eq!(client.job_status("c2").await.unwrap(), ProcessingStatus::Finished);
        assert_eq!(client.job_status("c3").await.unwrap(), ProcessingStatus::Error);
        assert_eq!(client.job_status("c4").await.unwrap(), ProcessingStatus::Error);
    }

    #[tokio::test]
    async fn test_finalize() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .and(body_json(json!({"creation_id": "container-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "media-99"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server).finalize("container-1").await.unwrap();
        assert_eq!(id, "media-99");
    }

    #[tokio::test]
    async fn test_finalize_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1784/media_publish"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client_for(&server).finalize("container-1").await.unwrap_err();
        assert!(matches!(err, PlatformError::ApiError(msg) if msg.contains("500")));
    }

    #[test]
    fn test_parse_status_code() {
        assert_eq!(parse_status_code("PUBLISHED"), ProcessingStatus::Finished);
        assert_eq!(parse_status_code(""), ProcessingStatus::Pending);
        assert_eq!(parse_status_code("SOMETHING_NEW"), ProcessingStatus::Pending);
    }
}
