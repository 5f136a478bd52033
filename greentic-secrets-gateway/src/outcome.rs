//! Outcome of one invocation and its projection onto output attributes.

use crate::message::{Message, OutputNames};
use crate::store::{GetSecretResponse, SecretPayload, StoreError};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::fmt;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Text,
    Binary,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Binary => "binary",
        }
    }
}

/// Normalized secret value and metadata.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecretResult {
    /// Text as-is, or base64 of a binary payload. `None` when the store
    /// returned neither.
    pub value: Option<(String, ValueType)>,
    pub arn: Option<String>,
    pub name: Option<String>,
    pub version_id: Option<String>,
    pub version_stages: Vec<String>,
}

impl SecretResult {
    pub fn normalize(response: GetSecretResponse) -> Self {
        let value = response.payload.map(|payload| match payload {
            SecretPayload::Text(text) => (text, ValueType::Text),
            SecretPayload::Binary(bytes) => (STANDARD.encode(bytes), ValueType::Binary),
        });
        Self {
            value,
            arn: response.arn,
            name: response.name,
            version_id: response.version_id,
            version_stages: response.version_stages,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_ref().map(|(value, _)| value.as_str())
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.value.as_ref().map(|(_, value_type)| *value_type)
    }
}

impl fmt::Debug for SecretResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretResult")
            .field("value_type", &self.value_type())
            .field("arn", &self.arn)
            .field("name", &self.name)
            .field("version_id", &self.version_id)
            .field("version_stages", &self.version_stages)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    NotFound,
    InvalidRequest,
    Decryption,
    Exhausted,
    Interrupted,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOutcome {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl ErrorOutcome {
    pub fn secret_name_missing() -> Self {
        Self {
            kind: ErrorKind::Configuration,
            message: "Secret name not specified".into(),
            status: None,
        }
    }

    /// Outcome for a store failure that ends the retrieval on the attempt
    /// that produced it.
    pub fn rejected(err: &StoreError, secret_id: &str) -> Self {
        let (kind, message, status) = match err {
            StoreError::ResourceNotFound(_) => (
                ErrorKind::NotFound,
                format!("Secret not found: {secret_id}"),
                STATUS_NOT_FOUND,
            ),
            StoreError::InvalidRequest(detail) | StoreError::InvalidParameter(detail) => (
                ErrorKind::InvalidRequest,
                format!("Invalid request: {detail}"),
                STATUS_BAD_REQUEST,
            ),
            StoreError::DecryptionFailure(detail) => (
                ErrorKind::Decryption,
                format!("Decryption failure: {detail}"),
                STATUS_INTERNAL,
            ),
            StoreError::InternalServiceError(_) | StoreError::Other(_) => {
                return Self::unexpected(err);
            }
        };
        Self {
            kind,
            message,
            status: Some(status),
        }
    }

    pub fn invalid_region(region: &str) -> Self {
        Self {
            kind: ErrorKind::InvalidRequest,
            message: format!("Invalid request: invalid region `{region}`"),
            status: Some(STATUS_BAD_REQUEST),
        }
    }

    pub fn exhausted(attempts: u32, last: &str) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            message: format!("Failed to retrieve secret after {attempts} attempts: {last}"),
            status: Some(STATUS_INTERNAL),
        }
    }

    pub fn interrupted(attempts: u32, last: &str) -> Self {
        Self {
            kind: ErrorKind::Interrupted,
            message: format!("Retry interrupted after {attempts} attempts: {last}"),
            status: Some(STATUS_INTERNAL),
        }
    }

    pub fn unexpected(detail: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Unexpected,
            message: format!("Unexpected error: {detail}"),
            status: Some(STATUS_INTERNAL),
        }
    }
}

impl fmt::Display for ErrorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Exactly one of these is produced per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeRecord {
    Success(SecretResult),
    Failure(ErrorOutcome),
}

impl OutcomeRecord {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeRecord::Success(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            OutcomeRecord::Success(_) => Some(STATUS_OK),
            OutcomeRecord::Failure(err) => err.status,
        }
    }

    pub fn error(&self) -> Option<&ErrorOutcome> {
        match self {
            OutcomeRecord::Success(_) => None,
            OutcomeRecord::Failure(err) => Some(err),
        }
    }

    /// Replace any earlier result attributes in `message` with this outcome.
    pub fn write_to(&self, message: &mut Message, names: &OutputNames) {
        for name in names.all() {
            message.remove(&name);
        }
        match self {
            OutcomeRecord::Success(result) => {
                message.put(names.status_code(), STATUS_OK.to_string());
                if let Some((value, value_type)) = &result.value {
                    message.put(names.value(), value.as_str());
                    message.put(names.value_type(), value_type.as_str());
                }
                if let Some(arn) = &result.arn {
                    message.put(names.arn(), arn.as_str());
                }
                if let Some(name) = &result.name {
                    message.put(names.secret_name(), name.as_str());
                }
                if let Some(version_id) = &result.version_id {
                    message.put(names.version_id(), version_id.as_str());
                }
                if !result.version_stages.is_empty() {
                    message.put(names.version_stages(), result.version_stages.join(","));
                }
            }
            OutcomeRecord::Failure(err) => {
                message.put(names.error(), err.message.as_str());
                if let Some(status) = err.status {
                    message.put(names.status_code(), status.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> OutputNames {
        OutputNames::default()
    }

    #[test]
    fn binary_payload_is_base64() {
        let bytes = vec![0u8, 159, 146, 150, 255];
        let result = SecretResult::normalize(GetSecretResponse {
            payload: Some(SecretPayload::Binary(bytes.clone())),
            ..Default::default()
        });
        assert_eq!(result.value_type(), Some(ValueType::Binary));
        assert_eq!(STANDARD.decode(result.value().unwrap()).unwrap(), bytes);
    }

    #[test]
    fn success_writes_metadata_and_stages_in_order() {
        let result = SecretResult::normalize(GetSecretResponse {
            payload: Some(SecretPayload::Text("pw".into())),
            arn: Some("arn:aws:secretsmanager:us-east-1:1:secret:db".into()),
            name: Some("db".into()),
            version_id: Some("v1".into()),
            version_stages: vec!["AWSCURRENT".into(), "blue".into()],
        });
        let mut message = Message::new();
        OutcomeRecord::Success(result).write_to(&mut message, &names());

        assert_eq!(message.get("aws.secretsmanager.value"), Some("pw"));
        assert_eq!(message.get("aws.secretsmanager.value.type"), Some("text"));
        assert_eq!(message.get("aws.secretsmanager.status.code"), Some("200"));
        assert_eq!(message.get("aws.secretsmanager.name"), Some("db"));
        assert_eq!(message.get("aws.secretsmanager.version.id"), Some("v1"));
        assert_eq!(
            message.get("aws.secretsmanager.version.stages"),
            Some("AWSCURRENT,blue")
        );
        assert!(message.get("aws.secretsmanager.error").is_none());
    }

    #[test]
    fn empty_response_writes_status_only() {
        let mut message = Message::new();
        OutcomeRecord::Success(SecretResult::normalize(GetSecretResponse::default()))
            .write_to(&mut message, &names());
        assert_eq!(message.len(), 1);
        assert_eq!(message.get("aws.secretsmanager.status.code"), Some("200"));
    }

    #[test]
    fn failure_replaces_stale_success_attributes() {
        let mut message: Message = [
            ("aws.secretsmanager.value", "old"),
            ("aws.secretsmanager.version.stages", "AWSCURRENT"),
            ("unrelated", "kept"),
        ]
        .into_iter()
        .collect();

        OutcomeRecord::Failure(ErrorOutcome::secret_name_missing())
            .write_to(&mut message, &names());

        assert_eq!(
            message.get("aws.secretsmanager.error"),
            Some("Secret name not specified")
        );
        assert!(message.get("aws.secretsmanager.status.code").is_none());
        assert!(message.get("aws.secretsmanager.value").is_none());
        assert!(message.get("aws.secretsmanager.version.stages").is_none());
        assert_eq!(message.get("unrelated"), Some("kept"));
    }

    #[test]
    fn rejected_failures_map_to_statuses() {
        let not_found =
            ErrorOutcome::rejected(&StoreError::ResourceNotFound("gone".into()), "prod/db");
        assert_eq!(not_found.message, "Secret not found: prod/db");
        assert_eq!(not_found.status, Some(404));

        let invalid =
            ErrorOutcome::rejected(&StoreError::InvalidParameter("bad stage".into()), "x");
        assert_eq!(invalid.message, "Invalid request: bad stage");
        assert_eq!(invalid.status, Some(400));

        let decrypt = ErrorOutcome::rejected(&StoreError::DecryptionFailure("kms".into()), "x");
        assert_eq!(decrypt.message, "Decryption failure: kms");
        assert_eq!(decrypt.status, Some(500));

        let region = ErrorOutcome::invalid_region("evil.example/#");
        assert_eq!(region.kind, ErrorKind::InvalidRequest);
        assert_eq!(region.message, "Invalid request: invalid region `evil.example/#`");
        assert_eq!(region.status, Some(400));
    }

    #[test]
    fn secret_value_is_not_in_debug_output() {
        let result = SecretResult::normalize(GetSecretResponse {
            payload: Some(SecretPayload::Text("hunter2".into())),
            ..Default::default()
        });
        assert!(!format!("{result:?}").contains("hunter2"));
    }
}
