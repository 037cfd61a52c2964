//! Mock reachability probe for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::stager::ReachabilityProbe;

/// Probe whose answer depends only on how many times it has been asked.
#[derive(Debug)]
pub struct MockProbe {
    /// Probe number (1-based) from which URLs answer; `None` never answers.
    reachable_from: Option<u32>,
    probed: Arc<RwLock<Vec<String>>>,
}

impl MockProbe {
    /// Every probe succeeds.
    pub fn always() -> Self {
        Self::reachable_after(1)
    }

    /// No probe ever succeeds.
    pub fn never() -> Self {
        Self {
            reachable_from: None,
            probed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// The `n`-th probe and every later one succeed.
    pub fn reachable_after(n: u32) -> Self {
        Self {
            reachable_from: Some(n),
            probed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn probe_count(&self) -> u32 {
        self.probed.read().await.len() as u32
    }

    pub async fn probed_urls(&self) -> Vec<String> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl ReachabilityProbe for MockProbe {
    async fn probe(&self, url: &str) -> bool {
        let mut probed = self.probed.write().await;
        probed.push(url.to_string());
        let count = probed.len() as u32;

        self.reachable_from.is_some_and(|n| count >= n)
    }
}
