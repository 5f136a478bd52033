//! Retrieval engine: validation, one fetch per attempt, fixed-delay retry of
//! transient failures and immediate stop on permanent ones.

use crate::outcome::{ErrorOutcome, OutcomeRecord, SecretResult};
use crate::store::{ClientFactory, Disposition, GetSecretRequest, GetSecretResponse, StoreError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_REGION: &str = "us-east-1";

const MAX_REGION_LEN: usize = 63;

/// A region must be usable as one DNS label of the service host name:
/// lowercase ASCII letters, digits and inner hyphens.
pub fn is_valid_region(region: &str) -> bool {
    !region.is_empty()
        && region.len() <= MAX_REGION_LEN
        && !region.starts_with('-')
        && !region.ends_with('-')
        && region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Attempt bound and delay. `max_attempts` counts the first try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, Duration::from_millis(DEFAULT_RETRY_DELAY_MS))
    }
}

impl RetryPolicy {
    /// Zero attempts still means one try.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Parse resolved field text; blank or unparsable values use the defaults.
    pub fn from_fields(max_retries: &str, retry_delay_ms: &str) -> Self {
        let max_attempts = parse_or(max_retries, "maxRetries", DEFAULT_MAX_RETRIES);
        let delay_ms = parse_or(retry_delay_ms, "retryDelay", DEFAULT_RETRY_DELAY_MS);
        Self::new(max_attempts, Duration::from_millis(delay_ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

fn parse_or<T>(raw: &str, field: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return default;
    }
    match trimmed.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(
                field,
                value = trimmed,
                default = %default,
                "invalid numeric field; using default"
            );
            default
        }
    }
}

/// Live values for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub secret_id: String,
    pub region: String,
    pub policy: RetryPolicy,
    pub version_id: Option<String>,
    pub version_stage: Option<String>,
}

impl RetrievalRequest {
    pub fn new(secret_id: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            region: DEFAULT_REGION.to_string(),
            policy: RetryPolicy::default(),
            version_id: None,
            version_stage: None,
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        let region = region.trim();
        self.region = if region.is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            region.to_string()
        };
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_version_id(mut self, version_id: &str) -> Self {
        self.version_id = non_blank(version_id);
        self
    }

    pub fn with_version_stage(mut self, version_stage: &str) -> Self {
        self.version_stage = non_blank(version_stage);
        self
    }

    fn store_request(&self) -> GetSecretRequest {
        GetSecretRequest {
            secret_id: self.secret_id.clone(),
            version_id: self.version_id.clone(),
            version_stage: self.version_stage.clone(),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Outcome plus the number of store calls it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieval {
    pub outcome: OutcomeRecord,
    pub attempts: u32,
}

enum State {
    Validating,
    Fetching,
    Retrying(StoreError),
    Done(OutcomeRecord),
}

/// Run one retrieval to completion.
///
/// Delays are tokio timers on the calling task. Cancelling `cancel` while
/// waiting between attempts ends the loop with an interrupted failure.
pub async fn retrieve(
    factory: &dyn ClientFactory,
    request: &RetrievalRequest,
    cancel: &CancellationToken,
) -> Retrieval {
    let max_attempts = request.policy.max_attempts();
    let mut attempts = 0u32;
    let mut state = State::Validating;

    loop {
        state = match state {
            State::Validating => {
                if request.secret_id.trim().is_empty() {
                    State::Done(OutcomeRecord::Failure(ErrorOutcome::secret_name_missing()))
                } else if !is_valid_region(&request.region) {
                    warn!(region = ?request.region, "rejecting malformed region");
                    State::Done(OutcomeRecord::Failure(ErrorOutcome::invalid_region(
                        &request.region,
                    )))
                } else {
                    State::Fetching
                }
            }
            State::Fetching => {
                attempts += 1;
                debug!(
                    secret_id = %request.secret_id,
                    region = %request.region,
                    attempt = attempts,
                    max_attempts,
                    "fetching secret"
                );
                match fetch_once(factory, request).await {
                    Ok(response) => {
                        State::Done(OutcomeRecord::Success(SecretResult::normalize(response)))
                    }
                    Err(err) => match err.disposition() {
                        Disposition::Permanent => {
                            warn!(
                                secret_id = %request.secret_id,
                                error = %err,
                                "permanent secret store failure"
                            );
                            State::Done(OutcomeRecord::Failure(ErrorOutcome::rejected(
                                &err,
                                &request.secret_id,
                            )))
                        }
                        Disposition::Transient if attempts >= max_attempts => {
                            warn!(
                                secret_id = %request.secret_id,
                                attempts,
                                error = %err,
                                "secret retrieval attempts exhausted"
                            );
                            State::Done(OutcomeRecord::Failure(ErrorOutcome::exhausted(
                                attempts,
                                err.detail(),
                            )))
                        }
                        Disposition::Transient => {
                            warn!(
                                secret_id = %request.secret_id,
                                attempt = attempts,
                                max_attempts,
                                error = %err,
                                "transient secret store failure; retrying"
                            );
                            State::Retrying(err)
                        }
                    },
                }
            }
            State::Retrying(last) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(secret_id = %request.secret_id, attempts, "retry interrupted");
                        State::Done(OutcomeRecord::Failure(ErrorOutcome::interrupted(
                            attempts,
                            last.detail(),
                        )))
                    }
                    _ = tokio::time::sleep(request.policy.delay()) => State::Fetching,
                }
            }
            State::Done(outcome) => return Retrieval { outcome, attempts },
        };
    }
}

async fn fetch_once(
    factory: &dyn ClientFactory,
    request: &RetrievalRequest,
) -> Result<GetSecretResponse, StoreError> {
    let client = factory.client_for(&request.region)?;
    client.get_secret_value(&request.store_request()).await
}
