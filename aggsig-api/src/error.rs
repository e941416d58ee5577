//! API Error types

use aggsig_network::NetworkError;
use aggsig_signer::SignerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

fn signer_status(e: &SignerError) -> (StatusCode, &'static str) {
    match e {
        SignerError::Decode(_) => (StatusCode::BAD_REQUEST, "DECODE_ERROR"),
        SignerError::InvalidPoint(_) => (StatusCode::BAD_REQUEST, "INVALID_POINT"),
        SignerError::InsufficientInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        SignerError::AggregateVerificationFailed => {
            (StatusCode::UNPROCESSABLE_ENTITY, "AGGREGATE_VERIFICATION_FAILED")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Signer(e) => signer_status(e),
            ApiError::Network(e) => match e {
                NetworkError::InsufficientSigners { needed, available } => {
                    details = Some(json!({ "needed": needed, "available": available }));
                    (StatusCode::BAD_REQUEST, "INSUFFICIENT_SIGNERS")
                }
                NetworkError::AggregateVerificationFailed { invalid_signers } => {
                    details = Some(json!({ "invalidSigners": invalid_signers }));
                    (StatusCode::UNPROCESSABLE_ENTITY, "AGGREGATE_VERIFICATION_FAILED")
                }
                NetworkError::InvalidEndpoint { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                NetworkError::Signer(e) => signer_status(e),
                NetworkError::Connection(_) | NetworkError::Timeout(_) => {
                    (StatusCode::BAD_GATEWAY, "INTERNAL_ERROR")
                }
                NetworkError::ShutDown => (StatusCode::SERVICE_UNAVAILABLE, "INTERNAL_ERROR"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;
