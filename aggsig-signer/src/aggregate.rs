//! Aggregate signature assembly
//!
//! Turns the partial signatures returned by a signing committee into the
//! pairing-ready blob the on-chain verifier consumes.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bls::{aggregate_public_keys, aggregate_signatures, hash_to_curve, verify, G1Point, G2Point};
use crate::eip2537::{decode_g1_hex, decode_g2_hex, encode_g1_hex, encode_g2_hex};
use crate::error::{SignerError, SignerResult};

/// A partial signature produced by one node (hex, EIP-2537 layout)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResult {
    pub node_id: String,
    /// G2 signature (256 bytes)
    pub signature: String,
    /// G1 public key (128 bytes)
    pub public_key: String,
}

/// Pairing-ready aggregate (hex, EIP-2537 layout)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSignatureResult {
    /// Aggregated G1 public key (128 bytes)
    pub agg_pk: String,
    /// Hashed message G2 point (256 bytes)
    pub hashed_msg: String,
    /// Aggregated G2 signature (256 bytes)
    pub agg_sig: String,
}

/// Decoded partial signature
#[derive(Debug, Clone, Copy)]
pub struct DecodedShare {
    pub signature: G2Point,
    pub public_key: G1Point,
}

impl SignatureResult {
    pub fn new(node_id: impl Into<String>, signature: &G2Point, public_key: &G1Point) -> Self {
        Self {
            node_id: node_id.into(),
            signature: encode_g2_hex(signature),
            public_key: encode_g1_hex(public_key),
        }
    }

    pub fn decode(&self) -> SignerResult<DecodedShare> {
        Ok(DecodedShare {
            signature: decode_g2_hex(&self.signature)?,
            public_key: decode_g1_hex(&self.public_key)?,
        })
    }
}

/// Aggregate partial signatures over `message` and check the result.
///
/// Fails with [`SignerError::AggregateVerificationFailed`] when the sum
/// does not verify against the summed keys, which means at least one
/// committee member returned a bad share.
pub fn aggregate_results(
    message: &[u8],
    results: &[SignatureResult],
    dst: &str,
) -> SignerResult<AggregateSignatureResult> {
    if results.is_empty() {
        return Err(SignerError::InsufficientInput(
            "at least one signature is required".to_string(),
        ));
    }

    let shares = results
        .iter()
        .map(SignatureResult::decode)
        .collect::<SignerResult<Vec<_>>>()?;

    let hashed = hash_to_curve(message, dst);
    let signatures: Vec<G2Point> = shares.iter().map(|s| s.signature).collect();
    let public_keys: Vec<G1Point> = shares.iter().map(|s| s.public_key).collect();

    let agg_sig = aggregate_signatures(&signatures)?;
    let agg_pk = aggregate_public_keys(&public_keys)?;

    if !verify(&agg_sig, &hashed, &agg_pk) {
        let invalid = invalid_signers(&hashed, results, &shares);
        warn!(invalid = ?invalid, count = results.len(), "Aggregate signature failed verification");
        return Err(SignerError::AggregateVerificationFailed);
    }

    debug!(count = results.len(), "Aggregated signatures");
    Ok(AggregateSignatureResult {
        agg_pk: encode_g1_hex(&agg_pk),
        hashed_msg: encode_g2_hex(&hashed),
        agg_sig: encode_g2_hex(&agg_sig),
    })
}

/// Check an aggregate signature against a list of public keys
pub fn verify_aggregate(
    signature: &G2Point,
    public_keys: &[G1Point],
    message: &[u8],
    dst: &str,
) -> SignerResult<bool> {
    let agg_pk = aggregate_public_keys(public_keys)?;
    Ok(verify(signature, &hash_to_curve(message, dst), &agg_pk))
}

/// Node ids whose individual share does not verify
pub fn invalid_signers(
    hashed: &G2Point,
    results: &[SignatureResult],
    shares: &[DecodedShare],
) -> Vec<String> {
    results
        .iter()
        .zip(shares)
        .filter(|(_, share)| !verify(&share.signature, hashed, &share.public_key))
        .map(|(result, _)| result.node_id.clone())
        .collect()
}
