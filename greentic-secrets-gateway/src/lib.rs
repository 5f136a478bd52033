//! Secret retrieval adapter for gateway filters.
//!
//! A [`SecretsManagerFilter`] is attached once from a configuration entity and
//! then invoked per message: it resolves the secret identifier and region
//! (literal or `${attribute}` templates), fetches the secret through a
//! [`ClientFactory`], retries transient failures with a fixed delay and writes
//! a flat set of output attributes back into the message.

pub mod cipher;
pub mod client_cache;
pub mod credentials;
pub mod entity;
pub mod errors;
pub mod filter;
pub mod message;
pub mod outcome;
pub mod retry;
pub mod rt;
pub mod store;
pub mod telemetry;
pub mod template;
pub mod transport;

pub use cipher::{AesGcmCipher, Cipher, NoCipher};
pub use client_cache::RegionClients;
pub use credentials::{
    CredentialSelector, CredentialSource, CredentialType, StaticCredentials, WorkloadIdentity,
};
pub use entity::ConfigEntity;
pub use errors::{DecryptError, GatewayError, Result};
pub use filter::{AttachContext, AttachedConfig, FilterFields, SecretsManagerFilter, prepare};
pub use message::{Message, OutputNames};
pub use outcome::{ErrorKind, ErrorOutcome, OutcomeRecord, SecretResult, ValueType};
pub use retry::{Retrieval, RetrievalRequest, RetryPolicy};
pub use store::{
    ClientFactory, GetSecretRequest, GetSecretResponse, SecretPayload, SecretStore, StoreError,
};
pub use template::Selector;
pub use transport::{Protocol, TransportConfig};
