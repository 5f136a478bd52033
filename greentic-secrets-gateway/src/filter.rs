//! The attachable secret retrieval filter.
//!
//! Attach once: resolve configuration fields, pick a credential source, build
//! the transport configuration and hand them to a client factory. Invoke many
//! times: evaluate templated fields against the message, run the retrieval
//! engine and write the outcome back into the message.

use crate::cipher::{AesGcmCipher, Cipher, NoCipher};
use crate::credentials::{
    CredentialFields, CredentialSelector, CredentialSource, InlineCredential, StaticCredentials,
};
use crate::entity::ConfigEntity;
use crate::message::{Message, OutputNames};
use crate::outcome::{ErrorOutcome, OutcomeRecord};
use crate::retry::{Retrieval, RetrievalRequest, RetryPolicy, retrieve};
use crate::rt;
use crate::store::ClientFactory;
use crate::template::Selector;
use crate::transport::{TransportConfig, build_transport_config};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use zeroize::Zeroizing;

pub const FIELD_SECRET_NAME: &str = "secretName";
pub const FIELD_SECRET_REGION: &str = "secretRegion";
pub const FIELD_MAX_RETRIES: &str = "maxRetries";
pub const FIELD_RETRY_DELAY: &str = "retryDelay";
pub const FIELD_CREDENTIAL_TYPE: &str = "credentialType";
pub const FIELD_CREDENTIALS_FILE_PATH: &str = "credentialsFilePath";
pub const FIELD_AWS_PROFILE: &str = "awsProfile";
pub const FIELD_CLIENT_CONFIGURATION: &str = "clientConfiguration";
pub const FIELD_AWS_CREDENTIAL: &str = "awsCredential";
pub const FIELD_VERSION_ID: &str = "versionId";
pub const FIELD_VERSION_STAGE: &str = "versionStage";
pub const FIELD_OUTPUT_PREFIX: &str = "outputPrefix";

/// Field selectors read from the filter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterFields {
    pub secret_name: Selector,
    pub region: Selector,
    pub max_retries: Selector,
    pub retry_delay: Selector,
    pub credential_type: Selector,
    pub credentials_file_path: Selector,
    pub aws_profile: Selector,
    pub version_id: Selector,
    pub version_stage: Selector,
    pub output_prefix: Selector,
}

impl FilterFields {
    pub fn from_entity(config: &ConfigEntity) -> Self {
        let selector = |name: &str| {
            config
                .string_value(name)
                .map(Selector::parse)
                .unwrap_or_default()
        };
        Self {
            secret_name: selector(FIELD_SECRET_NAME),
            region: selector(FIELD_SECRET_REGION),
            max_retries: selector(FIELD_MAX_RETRIES),
            retry_delay: selector(FIELD_RETRY_DELAY),
            credential_type: selector(FIELD_CREDENTIAL_TYPE),
            credentials_file_path: selector(FIELD_CREDENTIALS_FILE_PATH),
            aws_profile: selector(FIELD_AWS_PROFILE),
            version_id: selector(FIELD_VERSION_ID),
            version_stage: selector(FIELD_VERSION_STAGE),
            output_prefix: selector(FIELD_OUTPUT_PREFIX),
        }
    }

    /// Live request values for one invocation.
    pub fn resolve(&self, message: &Message) -> RetrievalRequest {
        let policy = RetryPolicy::from_fields(
            &self.max_retries.substitute(message),
            &self.retry_delay.substitute(message),
        );
        RetrievalRequest::new(self.secret_name.substitute(message))
            .with_region(&self.region.substitute(message))
            .with_policy(policy)
            .with_version_id(&self.version_id.substitute(message))
            .with_version_stage(&self.version_stage.substitute(message))
    }
}

/// Process-level collaborators used while attaching.
pub struct AttachContext {
    cipher: Arc<dyn Cipher>,
    selector: CredentialSelector,
}

impl Default for AttachContext {
    fn default() -> Self {
        Self {
            cipher: Arc::new(NoCipher),
            selector: CredentialSelector::new(),
        }
    }
}

impl AttachContext {
    /// Cipher key from the environment when present, process environment for
    /// credential discovery.
    pub fn from_env() -> Self {
        let cipher: Arc<dyn Cipher> = match AesGcmCipher::from_env() {
            Some(cipher) => Arc::new(cipher),
            None => Arc::new(NoCipher),
        };
        Self {
            cipher,
            selector: CredentialSelector::new(),
        }
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_selector(mut self, selector: CredentialSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn cipher(&self) -> &dyn Cipher {
        self.cipher.as_ref()
    }
}

/// Everything resolved at attach time. Immutable for the filter's lifetime.
#[derive(Debug, Clone)]
pub struct AttachedConfig {
    pub fields: FilterFields,
    pub credentials: CredentialSource,
    pub transport: TransportConfig,
    pub outputs: OutputNames,
}

/// Resolve attach-time configuration. Never fails; every problem degrades to
/// a default and is logged.
pub fn prepare(config: &ConfigEntity, ctx: &AttachContext) -> AttachedConfig {
    let fields = FilterFields::from_entity(config);

    let credential_fields = CredentialFields {
        credential_type: fields.credential_type.attach_value(),
        credentials_file_path: fields.credentials_file_path.attach_value(),
        profile: fields.aws_profile.attach_value(),
        inline: inline_credential(config),
    };
    let credentials = ctx.selector.select(&credential_fields);

    let client_config = client_configuration(config);
    let transport = build_transport_config(client_config.as_ref(), ctx.cipher());
    let outputs = OutputNames::new(&fields.output_prefix.attach_value());

    AttachedConfig {
        fields,
        credentials,
        transport,
        outputs,
    }
}

fn client_configuration(config: &ConfigEntity) -> Option<ConfigEntity> {
    match config.raw(FIELD_CLIENT_CONFIGURATION)? {
        Value::Object(_) => config.entity(FIELD_CLIENT_CONFIGURATION),
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => match ConfigEntity::from_text(text) {
            Ok(entity) => Some(entity),
            Err(err) => {
                warn!(error = %err, "ignoring unparsable client configuration");
                None
            }
        },
        _ => {
            warn!("client configuration must be a table or text; ignoring");
            None
        }
    }
}

fn inline_credential(config: &ConfigEntity) -> Option<InlineCredential> {
    if let Some(table) = config.entity(FIELD_AWS_CREDENTIAL) {
        let access_key = table.non_blank_string("accessKeyId");
        let secret_key = table.non_blank_string("secretAccessKey");
        let session_token = table.non_blank_string("sessionToken");
        return match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Some(InlineCredential::Pair(
                StaticCredentials::new(access_key, secret_key, session_token),
            )),
            _ => {
                warn!("inline credential table needs accessKeyId and secretAccessKey");
                None
            }
        };
    }
    config
        .non_blank_string(FIELD_AWS_CREDENTIAL)
        .map(|text| InlineCredential::Text(Zeroizing::new(text)))
}

/// An attached secret retrieval filter.
pub struct SecretsManagerFilter {
    attached: AttachedConfig,
    factory: Arc<dyn ClientFactory>,
    shutdown: CancellationToken,
}

impl SecretsManagerFilter {
    pub fn new(attached: AttachedConfig, factory: Arc<dyn ClientFactory>) -> Self {
        info!(
            credentials = %attached.credentials,
            transport = %attached.transport,
            output_prefix = attached.outputs.prefix(),
            "secrets manager filter attached"
        );
        Self {
            attached,
            factory,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &AttachedConfig {
        &self.attached
    }

    /// Token cancelled when the filter detaches. Invocations that pass their
    /// own token should derive it from this one.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Stop in-flight retry delays. Further invocations fail fast on their
    /// first transient error.
    pub fn detach(&self) {
        self.shutdown.cancel();
        info!("secrets manager filter detached");
    }

    pub fn is_detached(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn invoke_async(&self, message: &mut Message) -> Retrieval {
        let cancel = self.child_token();
        self.invoke_with(message, &cancel).await
    }

    /// Run one retrieval and write the outcome into `message`.
    pub async fn invoke_with(
        &self,
        message: &mut Message,
        cancel: &CancellationToken,
    ) -> Retrieval {
        let span = info_span!("secrets_manager_invoke", prefix = self.attached.outputs.prefix());
        let run = {
            let message: &Message = message;
            async move {
                let request = self.attached.fields.resolve(message);
                retrieve(self.factory.as_ref(), &request, cancel).await
            }
        };

        let retrieval = match AssertUnwindSafe(run).catch_unwind().instrument(span.clone()).await {
            Ok(retrieval) => retrieval,
            Err(panic) => {
                let detail = panic_detail(panic.as_ref());
                span.in_scope(|| error!(error = %detail, "secret retrieval panicked"));
                Retrieval {
                    outcome: OutcomeRecord::Failure(ErrorOutcome::unexpected(detail)),
                    attempts: 0,
                }
            }
        };

        span.in_scope(|| match &retrieval.outcome {
            OutcomeRecord::Success(_) => {
                info!(attempts = retrieval.attempts, "secret retrieved")
            }
            OutcomeRecord::Failure(err) => warn!(
                attempts = retrieval.attempts,
                status = ?err.status,
                error = %err.message,
                "secret retrieval failed"
            ),
        });
        retrieval.outcome.write_to(message, &self.attached.outputs);
        retrieval
    }

    /// Blocking facade over [`invoke_async`](Self::invoke_async).
    pub fn invoke(&self, message: &mut Message) -> Retrieval {
        rt::sync_await(self.invoke_async(message))
    }
}

impl Drop for SecretsManagerFilter {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic".to_string()
    }
}
