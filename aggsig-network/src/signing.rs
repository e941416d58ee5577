//! Signing Coordinator
//!
//! Drives one signing round: select a committee from the directory, ask
//! every member for a partial signature over the same message, then
//! aggregate and verify.
//!
//! A response is only used if it comes from the node we asked and carries
//! the public key the directory has for that node. Every selected member
//! must answer; a partial committee is reported as insufficient signers.

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{info, warn};

use aggsig_signer::{
    aggregate_results, decode_g1_hex, decode_hex, hash_to_curve, invalid_signers,
    AggregateSignatureResult, DecodedShare, SignatureResult, SignerError,
};

use crate::directory::{PeerDirectory, PeerNode};
use crate::endpoint::EndpointValidator;
use crate::error::{NetworkError, NetworkResult};
use crate::selector::SignerSelector;

/// Body of `POST /sign`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    /// Hex-encoded message bytes
    pub message: String,
}

/// Requests partial signatures from remote nodes
#[async_trait]
pub trait SignClient: Send + Sync {
    async fn request_signature(&self, api_endpoint: &str, message_hex: &str) -> NetworkResult<SignatureResult>;
}

/// `POST {api_endpoint}/sign` with reqwest
#[derive(Clone)]
pub struct HttpSignClient {
    client: reqwest::Client,
    validator: EndpointValidator,
}

impl HttpSignClient {
    pub fn new(validator: EndpointValidator, request_timeout: Duration) -> NetworkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| NetworkError::Connection(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, validator })
    }
}

#[async_trait]
impl SignClient for HttpSignClient {
    async fn request_signature(&self, api_endpoint: &str, message_hex: &str) -> NetworkResult<SignatureResult> {
        let base = self.validator.validate_api(api_endpoint, false)?;
        let url = format!("{}/sign", base.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&SignRequest {
                message: message_hex.to_string(),
            })
            .send()
            .await
            .map_err(|e| {
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

        response
            .json::<SignatureResult>()
            .await
            .map_err(|e| NetworkError::InvalidMessage(format!("{}: {}", url, e)))
    }
}

/// Committee signing rounds over the shared directory
pub struct SigningCoordinator {
    directory: Arc<RwLock<PeerDirectory>>,
    selector: Arc<Mutex<SignerSelector>>,
    client: Arc<dyn SignClient>,
    dst: String,
    request_timeout: Duration,
}

impl SigningCoordinator {
    pub fn new(
        directory: Arc<RwLock<PeerDirectory>>,
        selector: Arc<Mutex<SignerSelector>>,
        client: Arc<dyn SignClient>,
        dst: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            selector,
            client,
            dst: dst.into(),
            request_timeout,
        }
    }

    /// Pick `count` healthy nodes from the directory
    pub async fn select_signers(&self, count: usize) -> NetworkResult<Vec<PeerNode>> {
        let peers = self.directory.read().await.all();
        self.selector
            .lock()
            .await
            .select_signers(&peers, count, Utc::now())
    }

    /// Collect `count` partial signatures over `message_hex` and aggregate them
    pub async fn aggregate_signature(
        &self,
        message_hex: &str,
        count: usize,
    ) -> NetworkResult<AggregateSignatureResult> {
        let message = decode_hex(message_hex)?;
        let committee = self.select_signers(count).await?;

        info!(
            count,
            committee = ?committee.iter().map(|n| n.node_id.as_str()).collect::<Vec<_>>(),
            "Requesting partial signatures"
        );

        let responses = join_all(committee.iter().map(|node| async move {
            let result = match timeout(
                self.request_timeout,
                self.client.request_signature(&node.api_endpoint, message_hex),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(NetworkError::Timeout(format!("sign request to {}", node.node_id))),
            };
            (node, result)
        }))
        .await;

        let mut results = Vec::with_capacity(count);
        let mut shares = Vec::with_capacity(count);
        for (node, response) in responses {
            match response.and_then(|r| Self::check_response(node, r)) {
                Ok((result, share)) => {
                    results.push(result);
                    shares.push(share);
                }
                Err(e) => {
                    warn!(node_id = %node.node_id, error = %e, "Discarding partial signature");
                }
            }
        }

        if results.len() < count {
            return Err(NetworkError::InsufficientSigners {
                needed: count,
                available: results.len(),
            });
        }

        match aggregate_results(&message, &results, &self.dst) {
            Ok(aggregate) => {
                info!(count, "Aggregate signature assembled");
                Ok(aggregate)
            }
            Err(SignerError::AggregateVerificationFailed) => {
                let hashed = hash_to_curve(&message, &self.dst);
                Err(NetworkError::AggregateVerificationFailed {
                    invalid_signers: invalid_signers(&hashed, &results, &shares),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Response must come from `node` and carry its registered key
    fn check_response(
        node: &PeerNode,
        result: SignatureResult,
    ) -> NetworkResult<(SignatureResult, DecodedShare)> {
        if result.node_id != node.node_id {
            return Err(NetworkError::InvalidMessage(format!(
                "expected signature from {}, got {}",
                node.node_id, result.node_id
            )));
        }
        let share = result.decode()?;
        let expected = decode_g1_hex(&node.public_key)?;
        if share.public_key != expected {
            return Err(NetworkError::InvalidMessage(format!(
                "public key mismatch for {}",
                node.node_id
            )));
        }
        Ok((result, share))
    }
}
