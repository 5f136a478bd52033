//! Credential provider selection.
//!
//! The configured credential type picks one [`CredentialSpec`]; the selector
//! turns it into a [`CredentialSource`] the store binding can hand to its SDK.
//! Selection never fails. Anything that cannot be honoured falls back to the
//! ambient default provider chain.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

pub const WEB_IDENTITY_TOKEN_FILE_ENV: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
pub const ROLE_ARN_ENV: &str = "AWS_ROLE_ARN";
pub const CONTAINER_RELATIVE_URI_ENV: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";
pub const CONTAINER_FULL_URI_ENV: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
pub const SHARED_CREDENTIALS_FILE_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";
pub const CONFIG_FILE_ENV: &str = "AWS_CONFIG_FILE";
pub const DEFAULT_PROFILE: &str = "default";

/// Credential strategies the adapter understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialType {
    Iam,
    File,
    Profile,
    Local,
    Unknown(String),
}

impl CredentialType {
    /// Case-sensitive match; blank input means [`CredentialType::Local`].
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "local" => CredentialType::Local,
            "iam" => CredentialType::Iam,
            "file" => CredentialType::File,
            "profile" => CredentialType::Profile,
            other => CredentialType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CredentialType::Iam => "iam",
            CredentialType::File => "file",
            CredentialType::Profile => "profile",
            CredentialType::Local => "local",
            CredentialType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit key material.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    access_key_id: String,
    secret_access_key: Zeroizing<String>,
    session_token: Option<Zeroizing<String>>,
}

impl StaticCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: Zeroizing::new(secret_access_key.into()),
            session_token: session_token.map(Zeroizing::new),
        }
    }

    /// Parse `key:secret` (long-lived) or `key:secret:sessionToken` (session).
    pub fn parse(text: &str) -> Result<Self, CredentialError> {
        let parts: Vec<&str> = text.trim().split(':').map(str::trim).collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(CredentialError::MalformedInline { parts: parts.len() });
        }
        match parts.as_slice() {
            [key, secret] => Ok(Self::new(*key, *secret, None)),
            [key, secret, token] => Ok(Self::new(*key, *secret, Some(token.to_string()))),
            _ => Err(CredentialError::MalformedInline { parts: parts.len() }),
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_ref().map(|token| token.as_str())
    }

    pub fn is_session(&self) -> bool {
        self.session_token.is_some()
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Inline credential configuration as written in the filter config.
#[derive(Clone)]
pub enum InlineCredential {
    /// `key:secret` or `key:secret:token` text.
    Text(Zeroizing<String>),
    /// Explicit fields from a credential table.
    Pair(StaticCredentials),
}

impl fmt::Debug for InlineCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InlineCredential::Text(_) => f.write_str("Text(** redacted **)"),
            InlineCredential::Pair(pair) => f.debug_tuple("Pair").field(pair).finish(),
        }
    }
}

/// Attach-time inputs to the selector.
#[derive(Debug, Clone, Default)]
pub struct CredentialFields {
    pub credential_type: String,
    pub credentials_file_path: String,
    pub profile: String,
    pub inline: Option<InlineCredential>,
}

/// The credential strategy a configuration asks for. Exactly one is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSpec {
    Local(StaticCredentials),
    File { path: PathBuf, profile: String },
    IamRole,
    Profile(String),
    Inline(StaticCredentials),
}

impl CredentialSpec {
    pub fn from_fields(fields: &CredentialFields) -> Result<Self, CredentialError> {
        match CredentialType::parse(&fields.credential_type) {
            CredentialType::Iam => Ok(CredentialSpec::IamRole),
            CredentialType::File => {
                let path = fields.credentials_file_path.trim();
                if path.is_empty() {
                    return Err(CredentialError::MissingFilePath);
                }
                let profile = match fields.profile.trim() {
                    "" => DEFAULT_PROFILE.to_string(),
                    named => named.to_string(),
                };
                Ok(CredentialSpec::File {
                    path: PathBuf::from(path),
                    profile,
                })
            }
            CredentialType::Profile => match fields.profile.trim() {
                "" => Err(CredentialError::MissingProfile),
                named => Ok(CredentialSpec::Profile(named.to_string())),
            },
            CredentialType::Local => match &fields.inline {
                Some(InlineCredential::Pair(pair)) => Ok(CredentialSpec::Inline(pair.clone())),
                Some(InlineCredential::Text(text)) => {
                    StaticCredentials::parse(text).map(CredentialSpec::Local)
                }
                None => Err(CredentialError::MissingInline),
            },
            CredentialType::Unknown(other) => Err(CredentialError::UnknownType(other)),
        }
    }
}

/// How workload identity is obtained in the current environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadIdentity {
    /// Service-account token file exchanged for a role session.
    WebIdentityToken { token_file: PathBuf, role_arn: String },
    /// Container credentials endpoint (task roles).
    Container,
    /// Instance metadata service.
    InstanceMetadata,
}

/// Resolved credential provider descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    WorkloadIdentity(WorkloadIdentity),
    ProfileFile { path: PathBuf, profile: String },
    NamedProfile { profile: String },
    Static(StaticCredentials),
    DefaultChain,
}

impl CredentialSource {
    /// Short, secret-free description for logs.
    pub fn describe(&self) -> String {
        match self {
            CredentialSource::WorkloadIdentity(WorkloadIdentity::WebIdentityToken {
                role_arn,
                ..
            }) => format!("web identity token (role {role_arn})"),
            CredentialSource::WorkloadIdentity(WorkloadIdentity::Container) => {
                "container credentials endpoint".into()
            }
            CredentialSource::WorkloadIdentity(WorkloadIdentity::InstanceMetadata) => {
                "instance metadata".into()
            }
            CredentialSource::ProfileFile { path, profile } => {
                format!("profile `{profile}` from {}", path.display())
            }
            CredentialSource::NamedProfile { profile } => format!("named profile `{profile}`"),
            CredentialSource::Static(creds) if creds.is_session() => {
                "static session credentials".into()
            }
            CredentialSource::Static(_) => "static credentials".into(),
            CredentialSource::DefaultChain => "default provider chain".into(),
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credentials file path not specified")]
    MissingFilePath,
    #[error("profile name not specified")]
    MissingProfile,
    #[error("no inline credentials configured")]
    MissingInline,
    #[error("inline credentials must be key:secret or key:secret:token (got {parts} parts)")]
    MalformedInline { parts: usize },
    #[error("cannot read credentials file {path}: {source}")]
    ProfileFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("profile `{profile}` not found in {searched:?}")]
    ProfileNotFound {
        profile: String,
        searched: Vec<PathBuf>,
    },
    #[error("unknown credential type `{0}`")]
    UnknownType(String),
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Maps credential configuration to a usable [`CredentialSource`].
pub struct CredentialSelector {
    env: EnvLookup,
    home: Option<PathBuf>,
}

impl Default for CredentialSelector {
    fn default() -> Self {
        Self {
            env: Box::new(|name| std::env::var(name).ok()),
            home: dirs::home_dir(),
        }
    }
}

impl CredentialSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector reading from a fixed set of variables instead of the process
    /// environment, with no home directory.
    pub fn with_env<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            env: Box::new(move |name| vars.get(name).cloned()),
            home: None,
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|value| !value.trim().is_empty())
    }

    /// Select a provider. Always returns a usable source.
    pub fn select(&self, fields: &CredentialFields) -> CredentialSource {
        let credential_type = CredentialType::parse(&fields.credential_type);
        let selected = CredentialSpec::from_fields(fields).and_then(|spec| self.resolve(spec));
        match selected {
            Ok(source) => {
                info!(
                    credential_type = %credential_type,
                    source = %source,
                    "credential provider selected"
                );
                source
            }
            Err(err) => {
                warn!(
                    credential_type = %credential_type,
                    error = %err,
                    "falling back to default credential provider chain"
                );
                CredentialSource::DefaultChain
            }
        }
    }

    fn resolve(&self, spec: CredentialSpec) -> Result<CredentialSource, CredentialError> {
        match spec {
            CredentialSpec::IamRole => Ok(CredentialSource::WorkloadIdentity(
                self.workload_identity(),
            )),
            CredentialSpec::File { path, profile } => {
                check_profile_file(&path, ProfileFileKind::Credentials, &profile)?;
                Ok(CredentialSource::ProfileFile { path, profile })
            }
            CredentialSpec::Profile(profile) => {
                let files = self.shared_profile_files();
                let found = files
                    .iter()
                    .any(|(kind, path)| check_profile_file(path, *kind, &profile).is_ok());
                if found {
                    Ok(CredentialSource::NamedProfile { profile })
                } else {
                    let searched = files.into_iter().map(|(_, path)| path).collect();
                    Err(CredentialError::ProfileNotFound { profile, searched })
                }
            }
            CredentialSpec::Local(creds) | CredentialSpec::Inline(creds) => {
                Ok(CredentialSource::Static(creds))
            }
        }
    }

    /// Workload identity mechanism visible in the environment, preferring a
    /// mounted service-account token, then the container endpoint, then
    /// instance metadata.
    pub fn workload_identity(&self) -> WorkloadIdentity {
        if let (Some(token_file), Some(role_arn)) = (
            self.var(WEB_IDENTITY_TOKEN_FILE_ENV),
            self.var(ROLE_ARN_ENV),
        ) {
            return WorkloadIdentity::WebIdentityToken {
                token_file: PathBuf::from(token_file),
                role_arn,
            };
        }
        if self.var(CONTAINER_RELATIVE_URI_ENV).is_some()
            || self.var(CONTAINER_FULL_URI_ENV).is_some()
        {
            return WorkloadIdentity::Container;
        }
        WorkloadIdentity::InstanceMetadata
    }

    /// Shared credentials and config files consulted for named profiles.
    pub fn shared_profile_files(&self) -> Vec<(ProfileFileKind, PathBuf)> {
        let aws_dir = self.home.as_ref().map(|home| home.join(".aws"));
        let credentials = self
            .var(SHARED_CREDENTIALS_FILE_ENV)
            .map(PathBuf::from)
            .or_else(|| aws_dir.as_ref().map(|dir| dir.join("credentials")));
        let config = self
            .var(CONFIG_FILE_ENV)
            .map(PathBuf::from)
            .or_else(|| aws_dir.as_ref().map(|dir| dir.join("config")));
        credentials
            .map(|path| (ProfileFileKind::Credentials, path))
            .into_iter()
            .chain(config.map(|path| (ProfileFileKind::Config, path)))
            .collect()
    }
}

/// Section naming rules differ between the two shared file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFileKind {
    /// `[name]` sections.
    Credentials,
    /// `[profile name]` sections, plus a bare `[default]`.
    Config,
}

/// Confirm `path` is readable and declares `profile` under the section rules
/// of `kind`.
fn check_profile_file(
    path: &Path,
    kind: ProfileFileKind,
    profile: &str,
) -> Result<(), CredentialError> {
    let data =
        fs::read_to_string(path).map_err(|source| CredentialError::ProfileFileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let declared = data
        .lines()
        .filter_map(|line| section_name(line, kind))
        .any(|name| name == profile);
    if declared {
        Ok(())
    } else {
        Err(CredentialError::ProfileNotFound {
            profile: profile.to_string(),
            searched: vec![path.to_path_buf()],
        })
    }
}

fn section_name(line: &str, kind: ProfileFileKind) -> Option<&str> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    match kind {
        ProfileFileKind::Credentials => (!inner.contains(char::is_whitespace)).then_some(inner),
        ProfileFileKind::Config => match inner.strip_prefix("profile") {
            Some(rest) if rest.starts_with(char::is_whitespace) => Some(rest.trim()),
            _ if inner == DEFAULT_PROFILE => Some(inner),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fields(credential_type: &str) -> CredentialFields {
        CredentialFields {
            credential_type: credential_type.into(),
            ..Default::default()
        }
    }

    fn profile_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn credential_type_is_case_sensitive() {
        assert_eq!(CredentialType::parse("iam"), CredentialType::Iam);
        assert_eq!(CredentialType::parse(""), CredentialType::Local);
        assert_eq!(
            CredentialType::parse("IAM"),
            CredentialType::Unknown("IAM".into())
        );
    }

    #[test]
    fn every_credential_type_yields_a_source() {
        let selector = CredentialSelector::with_env(Vec::<(String, String)>::new());
        for credential_type in ["iam", "file", "profile", "local", "", "kerberos"] {
            let source = selector.select(&fields(credential_type));
            assert!(!source.describe().is_empty(), "{credential_type}");
        }
    }

    #[test]
    fn iam_prefers_web_identity_token() {
        let selector = CredentialSelector::with_env([
            (WEB_IDENTITY_TOKEN_FILE_ENV, "/var/run/secrets/token"),
            (ROLE_ARN_ENV, "arn:aws:iam::123456789012:role/gateway"),
            (CONTAINER_RELATIVE_URI_ENV, "/v2/credentials"),
        ]);
        assert_eq!(
            selector.select(&fields("iam")),
            CredentialSource::WorkloadIdentity(WorkloadIdentity::WebIdentityToken {
                token_file: PathBuf::from("/var/run/secrets/token"),
                role_arn: "arn:aws:iam::123456789012:role/gateway".into(),
            })
        );
    }

    #[test]
    fn iam_without_token_uses_container_then_metadata() {
        let selector = CredentialSelector::with_env([(CONTAINER_FULL_URI_ENV, "http://x")]);
        assert_eq!(
            selector.select(&fields("iam")),
            CredentialSource::WorkloadIdentity(WorkloadIdentity::Container)
        );

        let selector = CredentialSelector::with_env([(ROLE_ARN_ENV, "arn:only")]);
        assert_eq!(
            selector.select(&fields("iam")),
            CredentialSource::WorkloadIdentity(WorkloadIdentity::InstanceMetadata)
        );
    }

    #[test]
    fn file_reads_named_profile() {
        let file =
            profile_file("[default]\naws_access_key_id = a\n\n[ci]\naws_access_key_id = b\n");
        let selector = CredentialSelector::with_env(Vec::<(String, String)>::new());

        let mut input = fields("file");
        input.credentials_file_path = file.path().display().to_string();
        assert_eq!(
            selector.select(&input),
            CredentialSource::ProfileFile {
                path: file.path().to_path_buf(),
                profile: "default".into(),
            }
        );

        input.profile = "ci".into();
        assert!(matches!(
            selector.select(&input),
            CredentialSource::ProfileFile { profile, .. } if profile == "ci"
        ));
    }

    #[test]
    fn file_failures_fall_back_to_default_chain() {
        let selector = CredentialSelector::with_env(Vec::<(String, String)>::new());

        assert_eq!(selector.select(&fields("file")), CredentialSource::DefaultChain);

        let mut missing = fields("file");
        missing.credentials_file_path = "/nonexistent/credentials".into();
        assert_eq!(selector.select(&missing), CredentialSource::DefaultChain);

        let file = profile_file("[other]\n");
        let mut wrong_profile = fields("file");
        wrong_profile.credentials_file_path = file.path().display().to_string();
        assert_eq!(selector.select(&wrong_profile), CredentialSource::DefaultChain);
    }

    #[test]
    fn named_profile_found_in_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let aws = dir.path().join(".aws");
        fs::create_dir_all(&aws).unwrap();
        fs::write(aws.join("config"), "[profile deploy]\nregion = eu-west-1\n").unwrap();

        let selector =
            CredentialSelector::with_env(Vec::<(String, String)>::new()).with_home(dir.path());
        let mut input = fields("profile");
        input.profile = "deploy".into();
        assert_eq!(
            selector.select(&input),
            CredentialSource::NamedProfile {
                profile: "deploy".into()
            }
        );

        input.profile = "absent".into();
        assert_eq!(selector.select(&input), CredentialSource::DefaultChain);

        input.profile = "  ".into();
        assert_eq!(selector.select(&input), CredentialSource::DefaultChain);
    }

    #[test]
    fn named_profile_honours_shared_credentials_env() {
        let file = profile_file("[ops]\n");
        let selector = CredentialSelector::with_env([(
            SHARED_CREDENTIALS_FILE_ENV,
            file.path().display().to_string(),
        )]);
        let mut input = fields("profile");
        input.profile = "ops".into();
        assert!(matches!(
            selector.select(&input),
            CredentialSource::NamedProfile { .. }
        ));
    }

    #[test]
    fn local_parses_inline_text() {
        let selector = CredentialSelector::with_env(Vec::<(String, String)>::new());

        let mut input = fields("local");
        input.inline = Some(InlineCredential::Text(Zeroizing::new("AKID:SECRET".into())));
        match selector.select(&input) {
            CredentialSource::Static(creds) => {
                assert_eq!(creds.access_key_id(), "AKID");
                assert_eq!(creds.secret_access_key(), "SECRET");
                assert!(!creds.is_session());
            }
            other => panic!("unexpected source {other:?}"),
        }

        input.inline = Some(InlineCredential::Text(Zeroizing::new("AKID:SECRET:TOKEN".into())));
        match selector.select(&input) {
            CredentialSource::Static(creds) => assert_eq!(creds.session_token(), Some("TOKEN")),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn malformed_inline_falls_back() {
        let selector = CredentialSelector::with_env(Vec::<(String, String)>::new());
        for text in ["AKID", "AKID:", "a:b:c:d", ":secret"] {
            let mut input = fields("");
            input.inline = Some(InlineCredential::Text(Zeroizing::new(text.into())));
            assert_eq!(selector.select(&input), CredentialSource::DefaultChain, "{text}");
        }
    }

    #[test]
    fn inline_pair_is_used_verbatim() {
        let selector = CredentialSelector::with_env(Vec::<(String, String)>::new());
        let pair = StaticCredentials::new("AKID", "SECRET", None);
        let mut input = fields("local");
        input.inline = Some(InlineCredential::Pair(pair.clone()));
        assert_eq!(selector.select(&input), CredentialSource::Static(pair));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = StaticCredentials::new("AKID", "very-secret", Some("tok".into()));
        let rendered = format!("{:?}", CredentialSource::Static(creds));
        assert!(rendered.contains("AKID"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("tok\""));
    }

    #[test]
    fn section_names_follow_file_kind() {
        use ProfileFileKind::{Config, Credentials};

        assert_eq!(section_name("[ci]", Credentials), Some("ci"));
        assert_eq!(section_name(" [default] ", Credentials), Some("default"));
        assert_eq!(section_name("[profile dev]", Credentials), None);
        assert_eq!(section_name("key = value", Credentials), None);

        assert_eq!(section_name("[profile dev]", Config), Some("dev"));
        assert_eq!(section_name("[profile default]", Config), Some("default"));
        assert_eq!(section_name("[default]", Config), Some("default"));
        assert_eq!(section_name("[dev]", Config), None);
        assert_eq!(section_name("[profiles]", Config), None);
    }

    #[test]
    fn profile_sections_in_the_wrong_file_kind_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let aws = dir.path().join(".aws");
        fs::create_dir_all(&aws).unwrap();
        fs::write(aws.join("credentials"), "[profile deploy]\naws_access_key_id = a\n").unwrap();
        fs::write(aws.join("config"), "[deploy]\nregion = eu-west-1\n").unwrap();

        let selector =
            CredentialSelector::with_env(Vec::<(String, String)>::new()).with_home(dir.path());
        let mut input = fields("profile");
        input.profile = "deploy".into();
        assert_eq!(selector.select(&input), CredentialSource::DefaultChain);

        let file = profile_file("[profile ci]\naws_access_key_id = b\n");
        let mut input = fields("file");
        input.credentials_file_path = file.path().display().to_string();
        input.profile = "ci".into();
        assert_eq!(selector.select(&input), CredentialSource::DefaultChain);
    }
}
