//! AWS Secrets Manager binding for the secrets gateway filter.

mod credentials;
mod store;

pub use credentials::credentials_provider;
pub use store::{AwsSecretStore, classify_service_error};

use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use aws_smithy_types::retry::RetryConfig;
use aws_smithy_types::timeout::TimeoutConfig;
use aws_types::app_name::AppName;
use aws_types::region::Region;
use greentic_secrets_gateway::client_cache::RegionClients;
use greentic_secrets_gateway::credentials::CredentialSource;
use greentic_secrets_gateway::retry::{DEFAULT_REGION, is_valid_region};
use greentic_secrets_gateway::store::{ClientFactory, SecretStore, StoreError};
use greentic_secrets_gateway::transport::{DEFAULT_MAX_CONNECTIONS, Protocol, TransportConfig};
use greentic_secrets_gateway::{AttachContext, ConfigEntity, SecretsManagerFilter, prepare, rt};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const SM_ENDPOINT_ENV: &str = "GREENTIC_AWS_SM_ENDPOINT";

/// Secrets Manager service configuration for one region.
pub fn service_config(
    transport: &TransportConfig,
    region: &str,
    credentials: SharedCredentialsProvider,
    endpoint: Option<&str>,
) -> aws_sdk_secretsmanager::Config {
    let timeouts = TimeoutConfig::builder()
        .connect_timeout(transport.connection_timeout)
        .read_timeout(transport.socket_timeout)
        .build();

    let mut builder = aws_sdk_secretsmanager::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .credentials_provider(credentials)
        .timeout_config(timeouts);

    match transport.max_error_retry {
        Some(0) => builder = builder.retry_config(RetryConfig::disabled()),
        Some(retries) => {
            builder = builder.retry_config(RetryConfig::standard().with_max_attempts(retries + 1))
        }
        None => {}
    }

    if let Some(agent) = transport.user_agent.as_deref() {
        match AppName::new(agent.to_string()) {
            Ok(app_name) => builder = builder.app_name(app_name),
            Err(err) => warn!(
                user_agent = agent,
                error = %err,
                "user agent is not a valid app name; ignoring"
            ),
        }
    }

    match endpoint {
        Some(endpoint) => builder = builder.endpoint_url(endpoint),
        None if transport.protocol == Protocol::Http => {
            builder = builder.endpoint_url(format!("http://secretsmanager.{region}.amazonaws.com"))
        }
        None => {}
    }

    builder.build()
}

fn endpoint_from_env() -> Option<String> {
    env::var(SM_ENDPOINT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Builds one Secrets Manager client per region on first use and reuses it.
pub struct AwsClientFactory {
    credentials: SharedCredentialsProvider,
    transport: TransportConfig,
    endpoint: Option<String>,
    clients: RegionClients<Arc<AwsSecretStore>>,
}

impl AwsClientFactory {
    pub async fn new(source: &CredentialSource, transport: TransportConfig) -> Self {
        let credentials = credentials_provider(source, DEFAULT_REGION).await;
        Self {
            credentials,
            transport,
            endpoint: endpoint_from_env(),
            clients: RegionClients::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn regions(&self) -> Vec<String> {
        self.clients.regions()
    }
}

impl ClientFactory for AwsClientFactory {
    fn client_for(&self, region: &str) -> Result<Arc<dyn SecretStore>, StoreError> {
        if !is_valid_region(region) {
            return Err(StoreError::InvalidRequest(format!("invalid region `{region}`")));
        }
        let store = self
            .clients
            .get_or_try_insert_with(region, || {
                debug!(region, endpoint = ?self.endpoint, "building secrets manager client");
                let config = service_config(
                    &self.transport,
                    region,
                    self.credentials.clone(),
                    self.endpoint.as_deref(),
                );
                Ok::<_, StoreError>(Arc::new(AwsSecretStore::new(
                    SecretsManagerClient::from_conf(config),
                )))
            })?;
        Ok(store as Arc<dyn SecretStore>)
    }
}

fn report_transport(transport: &TransportConfig) {
    if transport.proxy.is_configured() {
        warn!(
            proxy_host = transport.proxy.host.as_deref(),
            proxy_port = transport.proxy.port,
            "proxy settings are not applied by the default connector; set HTTPS_PROXY instead"
        );
    }
    if transport.max_connections != DEFAULT_MAX_CONNECTIONS {
        info!(
            max_connections = transport.max_connections,
            "connection pool size is managed by the sdk connector"
        );
    }
    if let Some(hints) = transport.socket_buffer_hints {
        info!(send = hints.send, receive = hints.receive, "socket buffer hints recorded");
    }
}

/// Attach a filter backed by Secrets Manager.
pub async fn build_filter(config: &ConfigEntity, ctx: &AttachContext) -> SecretsManagerFilter {
    let attached = prepare(config, ctx);
    report_transport(&attached.transport);
    let factory = AwsClientFactory::new(&attached.credentials, attached.transport.clone()).await;
    SecretsManagerFilter::new(attached, Arc::new(factory))
}

/// Blocking variant of [`build_filter`].
pub fn build_filter_blocking(config: &ConfigEntity, ctx: &AttachContext) -> SecretsManagerFilter {
    rt::sync_await(build_filter(config, ctx))
}
