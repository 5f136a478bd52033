use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;
pub type DecryptResult<T> = std::result::Result<T, DecryptError>;

/// Errors surfaced while loading adapter configuration.
///
/// Field-level problems never show up here: a malformed field degrades to
/// "absent" when it is read. Only an unreadable or unparsable document is an
/// error, since nothing can be attached without one.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {format} config {origin}: {message}")]
    ParseConfig {
        format: &'static str,
        origin: String,
        message: String,
    },
    #[error("config document must be a table of fields")]
    NotATable,
}

/// Failures of the scoped decrypt operation used for sensitive configuration
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptError {
    #[error("no configuration cipher key is available")]
    NoKey,
    #[error("invalid cipher key: {0}")]
    InvalidKey(String),
    #[error("encrypted value is not valid base64: {0}")]
    Encoding(String),
    #[error("encrypted value is too short")]
    Truncated,
    #[error("message authentication failed")]
    MacMismatch,
    #[error("decrypted value is not valid utf-8")]
    NotUtf8,
}
