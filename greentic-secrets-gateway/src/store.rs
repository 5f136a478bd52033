//! Seam to the remote secret store.
//!
//! The store is an opaque RPC client: one typed request, one typed response,
//! and a closed set of failure kinds. Bindings live in provider crates.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// One "get secret value" call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetSecretRequest {
    pub secret_id: String,
    pub version_id: Option<String>,
    pub version_stage: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub enum SecretPayload {
    Text(String),
    Binary(Vec<u8>),
}

impl std::fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretPayload::Text(_) => f.write_str("Text(** redacted **)"),
            SecretPayload::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
        }
    }
}

/// Raw store response. Metadata the store did not return stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetSecretResponse {
    pub payload: Option<SecretPayload>,
    pub arn: Option<String>,
    pub name: Option<String>,
    pub version_id: Option<String>,
    pub version_stages: Vec<String>,
}

/// Closed set of failures a store reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),
    #[error("internal service error: {0}")]
    InternalServiceError(String),
    #[error("{0}")]
    Other(String),
}

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Permanent,
    Transient,
}

impl StoreError {
    /// Store-provided detail, without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            StoreError::ResourceNotFound(msg)
            | StoreError::InvalidRequest(msg)
            | StoreError::InvalidParameter(msg)
            | StoreError::DecryptionFailure(msg)
            | StoreError::InternalServiceError(msg)
            | StoreError::Other(msg) => msg,
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            StoreError::ResourceNotFound(_)
            | StoreError::InvalidRequest(_)
            | StoreError::InvalidParameter(_)
            | StoreError::DecryptionFailure(_) => Disposition::Permanent,
            StoreError::InternalServiceError(_) | StoreError::Other(_) => Disposition::Transient,
        }
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret_value(
        &self,
        request: &GetSecretRequest,
    ) -> Result<GetSecretResponse, StoreError>;
}

/// Produces region-bound store clients. Shared read-only across invocations.
pub trait ClientFactory: Send + Sync {
    fn client_for(&self, region: &str) -> Result<Arc<dyn SecretStore>, StoreError>;
}
