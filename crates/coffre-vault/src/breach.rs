//! k-anonymous breach lookup against a Pwned Passwords style range API.
//!
//! The candidate is hashed with SHA-1 locally. Only the first five hex
//! characters of the digest ([`HashPrefix`]) are sent; the service answers
//! with every known suffix for that prefix and matching happens here.
//!
//! SHA-1 is dictated by the remote protocol and is confined to
//! [`range_query_key`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use data_encoding::HEXUPPER;
use ring::digest;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::BreachConfig;
use crate::error::VaultError;
use crate::strength::BreachStatus;

/// Public Pwned Passwords endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.pwnedpasswords.com";

/// Hex characters of the digest sent to the service.
pub const PREFIX_LEN: usize = 5;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a lookup produced no answer. Always recovered into
/// [`BreachStatus::Undetermined`] by [`BreachChecker`].
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {0}")]
    Status(u16),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("lookup cancelled")]
    Cancelled,

    #[error("malformed range response: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Query key
// ---------------------------------------------------------------------------

/// The five upper-case hex characters that leave the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashPrefix(String);

impl HashPrefix {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HashPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prefix to send plus the suffix to match locally.
pub struct RangeQuery {
    prefix: HashPrefix,
    suffix: String,
}

impl RangeQuery {
    #[must_use]
    pub const fn prefix(&self) -> &HashPrefix {
        &self.prefix
    }

    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl fmt::Debug for RangeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeQuery")
            .field("prefix", &self.prefix)
            .field("suffix", &"***")
            .finish()
    }
}

/// SHA-1 the candidate and split the upper-case hex digest 5 / 35.
#[must_use]
pub fn range_query_key(candidate: &str) -> RangeQuery {
    let digest = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, candidate.as_bytes());
    let hex = HEXUPPER.encode(digest.as_ref());
    let (prefix, suffix) = hex.split_at(PREFIX_LEN);
    RangeQuery {
        prefix: HashPrefix(prefix.to_owned()),
        suffix: suffix.to_owned(),
    }
}

/// Find `suffix` in a newline-delimited `SUFFIX:COUNT` body.
///
/// Returns the occurrence count for a match. Lines with a zero count are
/// padding and never match.
///
/// # Errors
///
/// Returns [`LookupError::Malformed`] if a non-empty line is not
/// `SUFFIX:COUNT`.
pub fn parse_range_body(body: &str, suffix: &str) -> Result<Option<u64>, LookupError> {
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (hash, count) = line
            .split_once(':')
            .ok_or_else(|| LookupError::Malformed(format!("line without count: {line:?}")))?;
        let count: u64 = count
            .trim()
            .parse()
            .map_err(|_| LookupError::Malformed(format!("bad count in line {line:?}")))?;
        if count > 0 && hash.trim().eq_ignore_ascii_case(suffix) {
            return Ok(Some(count));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Range source
// ---------------------------------------------------------------------------

/// Anything that can answer a range query. Receives nothing but the prefix.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Fetch the raw `SUFFIX:COUNT` body for `prefix`.
    async fn fetch_range(&self, prefix: &HashPrefix) -> Result<String, LookupError>;
}

/// HTTP client for `GET {endpoint}/range/{prefix}`.
#[derive(Debug, Clone)]
pub struct PwnedRangeClient {
    client: reqwest::Client,
    endpoint: String,
    add_padding: bool,
}

impl PwnedRangeClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &BreachConfig) -> Result<Self, VaultError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| VaultError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim().trim_end_matches('/').to_owned(),
            add_padding: config.add_padding,
        })
    }
}

#[async_trait]
impl RangeSource for PwnedRangeClient {
    async fn fetch_range(&self, prefix: &HashPrefix) -> Result<String, LookupError> {
        let url = format!("{}/range/{prefix}", self.endpoint);
        let mut request = self.client.get(&url);
        if self.add_padding {
            request = request.header("Add-Padding", "true");
        }

        let response = request
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();
        tracing::debug!(prefix = %prefix, status = %status, "range response received");
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

/// Bounded, cancellable, fail-open breach check.
#[derive(Clone)]
pub struct BreachChecker {
    source: Arc<dyn RangeSource>,
    timeout: Duration,
}

impl fmt::Debug for BreachChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreachChecker")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BreachChecker {
    #[must_use]
    pub fn new(source: Arc<dyn RangeSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Look up `candidate`.
    ///
    /// Never fails: any [`LookupError`] is logged and reported as
    /// [`BreachStatus::Undetermined`].
    pub async fn check(&self, candidate: &str, cancel: &CancellationToken) -> BreachStatus {
        let query = range_query_key(candidate);
        match self.lookup(&query, cancel).await {
            Ok(Some(occurrences)) => BreachStatus::Compromised { occurrences },
            Ok(None) => BreachStatus::Clear,
            Err(e) => {
                tracing::warn!(prefix = %query.prefix, error = %e, "breach lookup failed; result undetermined");
                BreachStatus::Undetermined
            }
        }
    }

    /// Run the lookup under the timeout, racing `cancel`.
    ///
    /// # Errors
    ///
    /// Returns the [`LookupError`] that stopped the lookup.
    pub async fn lookup(
        &self,
        query: &RangeQuery,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, LookupError> {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            res = tokio::time::timeout(self.timeout, self.source.fetch_range(&query.prefix)) => Some(res),
        };
        let body = match outcome {
            None => return Err(LookupError::Cancelled),
            Some(Err(_elapsed)) => return Err(LookupError::Timeout(self.timeout)),
            Some(Ok(result)) => result?,
        };
        parse_range_body(&body, &query.suffix)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
