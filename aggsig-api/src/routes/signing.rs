//! Signing endpoints
//!
//! Messages travel as hex strings; keys and signatures use the EIP-2537
//! hex layout the on-chain verifier consumes.

use axum::{extract::State, Json};
use tracing::{debug, warn};

use aggsig_network::NetworkError;
use aggsig_signer::{
    aggregate_results, decode_g1_hex, decode_g2_hex, decode_hex, hash_to_curve, invalid_signers,
    verify_aggregate, AggregateSignatureResult, SignatureResult, SignerError, SignerResult,
};

use crate::dto::{
    AggregateRequest, AggregateSignRequest, IdentityResponse, SignRequest, VerifyRequest,
    VerifyResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// This node's public identity
pub async fn get_identity(State(state): State<AppState>) -> ApiResult<Json<IdentityResponse>> {
    let identity = state.identity.read().await;

    Ok(Json(IdentityResponse {
        node_id: identity.node_id().to_string(),
        public_key: identity.public_key_hex(),
        registration_status: identity.registration_status(),
        version: state.version.clone(),
    }))
}

/// Produce this node's partial signature over a message
pub async fn sign(
    State(state): State<AppState>,
    Json(req): Json<SignRequest>,
) -> ApiResult<Json<SignatureResult>> {
    let message = parse_message(&req.message)?;

    let identity = state.identity.read().await;
    let result = identity.sign(&message, &state.dst);
    debug!(node_id = %identity.node_id(), bytes = message.len(), "Signed message");

    Ok(Json(result))
}

/// Aggregate partial signatures collected by the caller
pub async fn aggregate(
    State(state): State<AppState>,
    Json(req): Json<AggregateRequest>,
) -> ApiResult<Json<AggregateSignatureResult>> {
    let message = parse_message(&req.message)?;
    if req.signatures.is_empty() {
        return Err(ApiError::Validation("signatures must not be empty".to_string()));
    }

    match aggregate_results(&message, &req.signatures, &state.dst) {
        Ok(result) => Ok(Json(result)),
        Err(SignerError::AggregateVerificationFailed) => {
            let shares = req
                .signatures
                .iter()
                .map(SignatureResult::decode)
                .collect::<SignerResult<Vec<_>>>()?;
            let hashed = hash_to_curve(&message, &state.dst);
            let invalid = invalid_signers(&hashed, &req.signatures, &shares);
            warn!(invalid = ?invalid, "Rejected aggregate with invalid partial signatures");
            Err(NetworkError::AggregateVerificationFailed {
                invalid_signers: invalid,
            }
            .into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Check a signature against the aggregate of the given public keys
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    if req.public_keys.is_empty() {
        return Err(ApiError::Validation("publicKeys must not be empty".to_string()));
    }

    let message = parse_message(&req.message)?;
    let signature = decode_g2_hex(&req.signature)?;
    let public_keys = req
        .public_keys
        .iter()
        .map(|pk| decode_g1_hex(pk))
        .collect::<SignerResult<Vec<_>>>()?;

    let valid = verify_aggregate(&signature, &public_keys, &message, &state.dst)?;

    Ok(Json(VerifyResponse {
        valid,
        message: if valid {
            "Signature is valid".to_string()
        } else {
            "Signature is invalid".to_string()
        },
    }))
}

/// Run a full signing round across a freshly selected committee
pub async fn aggregate_sign(
    State(state): State<AppState>,
    Json(req): Json<AggregateSignRequest>,
) -> ApiResult<Json<AggregateSignatureResult>> {
    if req.count == 0 {
        return Err(ApiError::Validation("count must be at least 1".to_string()));
    }
    parse_message(&req.message)?;

    let result = state
        .coordinator
        .aggregate_signature(&req.message, req.count)
        .await?;

    Ok(Json(result))
}

// Helper functions

fn parse_message(message: &str) -> ApiResult<Vec<u8>> {
    let bytes = decode_hex(message)?;
    if bytes.is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }
    Ok(bytes)
}
