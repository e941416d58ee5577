//! HTTP liveness probes against peers' `/health` endpoints

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{NetworkError, NetworkResult};

/// Liveness check for a peer's API
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Succeeds when the peer answers its health endpoint.
    ///
    /// The caller bounds the call with its own timeout.
    async fn probe(&self, api_endpoint: &str) -> NetworkResult<()>;
}

/// `GET {api_endpoint}/health` with reqwest
#[derive(Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new(timeout: Duration) -> NetworkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Connection(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, api_endpoint: &str) -> NetworkResult<()> {
        let url = format!("{}/health", api_endpoint.trim_end_matches('/'));
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout(url.clone())
            } else {
                NetworkError::Connection(format!("{}: {}", url, e))
            }
        })?;

        if !response.status().is_success() {
            return Err(NetworkError::Connection(format!(
                "{}: status {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}
