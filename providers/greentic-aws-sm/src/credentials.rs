use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::ecs::EcsCredentialsProvider;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::profile::ProfileFileCredentialsProvider;
#[allow(deprecated)]
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::provider_config::ProviderConfig;
use aws_config::web_identity_token::{StaticConfiguration, WebIdentityTokenCredentialsProvider};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_types::region::Region;
use greentic_secrets_gateway::credentials::{CredentialSource, StaticCredentials, WorkloadIdentity};

const STATIC_PROVIDER_NAME: &str = "greentic-gateway-static";
const SESSION_NAME: &str = "greentic-secrets-gateway";

/// SDK credentials provider for a resolved [`CredentialSource`].
///
/// `region` scopes the STS and SSO calls some providers make while
/// refreshing; the credentials themselves work in any region.
pub async fn credentials_provider(
    source: &CredentialSource,
    region: &str,
) -> SharedCredentialsProvider {
    let region = Region::new(region.to_string());
    match source {
        CredentialSource::WorkloadIdentity(identity) => workload_provider(identity, region),
        CredentialSource::ProfileFile { path, profile } => {
            #[allow(deprecated)]
            let files = ProfileFiles::builder()
                .with_file(ProfileFileKind::Credentials, path)
                .build();
            SharedCredentialsProvider::new(
                ProfileFileCredentialsProvider::builder()
                    .profile_files(files)
                    .profile_name(profile)
                    .build(),
            )
        }
        CredentialSource::NamedProfile { profile } => SharedCredentialsProvider::new(
            ProfileFileCredentialsProvider::builder()
                .profile_name(profile)
                .build(),
        ),
        CredentialSource::Static(creds) => static_provider(creds),
        CredentialSource::DefaultChain => SharedCredentialsProvider::new(
            DefaultCredentialsChain::builder().region(region).build().await,
        ),
    }
}

fn workload_provider(identity: &WorkloadIdentity, region: Region) -> SharedCredentialsProvider {
    match identity {
        WorkloadIdentity::WebIdentityToken {
            token_file,
            role_arn,
        } => SharedCredentialsProvider::new(
            WebIdentityTokenCredentialsProvider::builder()
                .configure(&ProviderConfig::default().with_region(Some(region)))
                .static_configuration(StaticConfiguration {
                    web_identity_token_file: token_file.clone(),
                    role_arn: role_arn.clone(),
                    session_name: SESSION_NAME.to_string(),
                })
                .build(),
        ),
        WorkloadIdentity::Container => {
            SharedCredentialsProvider::new(EcsCredentialsProvider::builder().build())
        }
        WorkloadIdentity::InstanceMetadata => {
            SharedCredentialsProvider::new(ImdsCredentialsProvider::builder().build())
        }
    }
}

fn static_provider(creds: &StaticCredentials) -> SharedCredentialsProvider {
    SharedCredentialsProvider::new(Credentials::new(
        creds.access_key_id(),
        creds.secret_access_key(),
        creds.session_token().map(str::to_string),
        None,
        STATIC_PROVIDER_NAME,
    ))
}
