//! Typed transport configuration built from the loosely-typed
//! `clientConfiguration` entity.

use crate::cipher::{Cipher, decrypt_string};
use crate::entity::{ConfigEntity, FieldValue};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, warn};
use zeroize::Zeroizing;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 50_000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("unsupported protocol `{other}`")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scheme().to_ascii_uppercase())
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    password: Option<Zeroizing<String>>,
    pub domain: Option<String>,
    pub workstation: Option<String>,
}

impl ProxyConfig {
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|value| value.as_str())
    }

    pub fn set_password(&mut self, password: Zeroizing<String>) {
        self.password = Some(password);
    }

    pub fn is_configured(&self) -> bool {
        self.host.is_some()
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "** redacted **"))
            .field("domain", &self.domain)
            .field("workstation", &self.workstation)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketBufferHints {
    pub send: u32,
    pub receive: u32,
}

/// Transport settings for the secret store client. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub connection_timeout: Duration,
    pub socket_timeout: Duration,
    pub max_connections: u32,
    /// SDK-level retry attempts; `None` keeps the SDK default.
    pub max_error_retry: Option<u32>,
    pub protocol: Protocol,
    pub user_agent: Option<String>,
    pub proxy: ProxyConfig,
    pub socket_buffer_hints: Option<SocketBufferHints>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            socket_timeout: Duration::from_millis(DEFAULT_SOCKET_TIMEOUT_MS),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_error_retry: None,
            protocol: Protocol::default(),
            user_agent: None,
            proxy: ProxyConfig::default(),
            socket_buffer_hints: None,
        }
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "protocol={} connect_timeout={}ms socket_timeout={}ms max_connections={}",
            self.protocol,
            self.connection_timeout.as_millis(),
            self.socket_timeout.as_millis(),
            self.max_connections
        )?;
        if let Some(retries) = self.max_error_retry {
            write!(f, " max_error_retry={retries}")?;
        }
        if let Some(agent) = &self.user_agent {
            write!(f, " user_agent={agent}")?;
        }
        if let Some(host) = &self.proxy.host {
            match self.proxy.port {
                Some(port) => write!(f, " proxy={host}:{port}")?,
                None => write!(f, " proxy={host}")?,
            }
            if self.proxy.username.is_some() {
                write!(
                    f,
                    " proxy_auth={}",
                    if self.proxy.password.is_some() { "user+password" } else { "user" }
                )?;
            }
        }
        if let Some(hints) = self.socket_buffer_hints {
            write!(f, " socket_buffers={}/{}", hints.send, hints.receive)?;
        }
        Ok(())
    }
}

/// Build the transport configuration. Never fails: absent fields keep their
/// defaults and malformed ones are logged and skipped.
pub fn build_transport_config(
    entity: Option<&ConfigEntity>,
    cipher: &dyn Cipher,
) -> TransportConfig {
    let mut config = TransportConfig::default();
    let Some(entity) = entity else {
        return config;
    };

    if let Some(ms) = non_negative::<u64>(entity, "connectionTimeout") {
        config.connection_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = non_negative::<u64>(entity, "socketTimeout") {
        config.socket_timeout = Duration::from_millis(ms);
    }
    if let Some(max) = non_negative::<u32>(entity, "maxConnections") {
        config.max_connections = max;
    }
    if let Some(retries) = non_negative::<u32>(entity, "maxErrorRetry") {
        config.max_error_retry = Some(retries);
    }
    if let Some(raw) = entity.non_blank_string("protocol") {
        match raw.parse::<Protocol>() {
            Ok(protocol) => config.protocol = protocol,
            Err(err) => warn!(
                field = "protocol",
                value = %raw,
                error = %err,
                "ignoring client configuration field"
            ),
        }
    }
    config.user_agent = entity.non_blank_string("userAgent");

    config.proxy.host = entity.non_blank_string("proxyHost");
    config.proxy.port = non_negative::<u16>(entity, "proxyPort");
    config.proxy.username = entity.non_blank_string("proxyUsername");
    config.proxy.domain = entity.non_blank_string("proxyDomain");
    config.proxy.workstation = entity.non_blank_string("proxyWorkstation");
    if let Some(encrypted) = entity.non_blank_string("proxyPassword") {
        match decrypt_string(cipher, &encrypted) {
            Ok(password) => config.proxy.set_password(password),
            Err(err) => error!(
                error = %err,
                "unable to decrypt proxy password; continuing without it"
            ),
        }
    }

    let send = non_negative::<u32>(entity, "socketSendBufferSizeHint");
    let receive = non_negative::<u32>(entity, "socketReceiveBufferSizeHint");
    match (send, receive) {
        (Some(send), Some(receive)) => {
            config.socket_buffer_hints = Some(SocketBufferHints { send, receive });
        }
        (None, None) => {}
        _ => debug!("socket buffer hints need both send and receive sizes; ignoring"),
    }

    config
}

/// Unsigned integer field; negative or oversized values are malformed.
fn non_negative<T>(entity: &ConfigEntity, name: &str) -> Option<T>
where
    T: TryFrom<i64>,
{
    match entity.integer_value(name) {
        FieldValue::Absent => None,
        FieldValue::Present(value) => match T::try_from(value) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(field = name, value, "ignoring out of range client configuration field");
                None
            }
        },
        FieldValue::Malformed(raw) => {
            warn!(field = name, value = %raw, "ignoring malformed client configuration field");
            None
        }
    }
}
