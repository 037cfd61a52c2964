//! Public URL reachability probes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::error::StagingError;

/// Checks whether a public URL is being served.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// `true` when the URL currently answers with a 2xx.
    ///
    /// Transport failures are reported as `false`: for a host that is still
    /// propagating, "unreachable" and "not yet there" are the same thing.
    async fn probe(&self, url: &str) -> bool;
}

/// HEAD-request probe.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, StagingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StagingError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(url, %status, "Probed public URL");
                status.is_success()
            }
            Err(e) => {
                debug!(url, error = %e, "Probe request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe() -> HttpProbe {
        HttpProbe::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_probe_success() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/media/clip_1.mp4"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/media/clip_1.mp4", server.uri());
        assert!(probe().probe(&url).await);
    }

    #[tokio::test]
    async fn test_probe_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/media/clip_1.mp4", server.uri());
        assert!(!probe().probe(&url).await);
    }

    #[tokio::test]
    async fn test_probe_connection_refused() {
        // Nothing listens on port 9 locally.
        assert!(!probe().probe("http://127.0.0.1:9/media/clip_1.mp4").await);
    }
}
