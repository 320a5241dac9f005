//! Vault configuration, stored as plain JSON next to the record file.
//!
//! Holds nothing sensitive: breach lookup settings, generator defaults and
//! the health-report staleness threshold.

use std::fs;
use std::path::Path;
use std::time::Duration;

use coffre_crypto_core::GeneratorConfig;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

// ── Top-level configuration ────────────────────────────────────────

/// Application configuration.
///
/// Persisted to `{data_dir}/config.json`. Every field has a default, so a
/// partial file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Remote breach lookup settings.
    #[serde(default)]
    pub breach: BreachConfig,

    /// Defaults for `coffre generate`.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Records older than this many days are reported as stale.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            breach: BreachConfig::default(),
            generator: GeneratorConfig::default(),
            stale_after_days: default_stale_after_days(),
        }
    }
}

const fn default_stale_after_days() -> u32 {
    90
}

// ── Breach lookup ──────────────────────────────────────────────────

/// Settings for the k-anonymous range lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BreachConfig {
    /// When `false`, reports carry `BreachStatus::NotChecked`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Base URL; `/range/{prefix}` is appended.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Upper bound on one lookup, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Ask the service to pad responses with decoy suffixes.
    #[serde(default = "default_enabled")]
    pub add_padding: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BreachConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
            add_padding: default_enabled(),
            user_agent: default_user_agent(),
        }
    }
}

impl BreachConfig {
    /// Lookup timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

const fn default_enabled() -> bool {
    true
}
fn default_endpoint() -> String {
    crate::breach::DEFAULT_ENDPOINT.into()
}
const fn default_timeout_ms() -> u64 {
    3_000
}
fn default_user_agent() -> String {
    concat!("coffre/", env!("CARGO_PKG_VERSION")).into()
}

// ── Validation ─────────────────────────────────────────────────────

impl VaultConfig {
    /// Reject settings no component can run with.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] for an empty or non-HTTP endpoint, a
    /// zero timeout, or an unusable generator configuration.
    pub fn validate(&self) -> Result<(), VaultError> {
        let endpoint = self.breach.endpoint.trim();
        if endpoint.is_empty() {
            return Err(VaultError::Config("breach.endpoint is empty".into()));
        }
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(VaultError::Config(format!(
                "breach.endpoint must be an http(s) URL, got {endpoint}"
            )));
        }
        if self.breach.timeout_ms == 0 {
            return Err(VaultError::Config(
                "breach.timeoutMs must be greater than 0".into(),
            ));
        }
        self.generator
            .validate()
            .map_err(|e| VaultError::Config(format!("generator: {e}")))?;
        Ok(())
    }
}

// ── File I/O ───────────────────────────────────────────────────────

const CONFIG_FILE: &str = "config.json";

impl VaultConfig {
    /// Load configuration from `{data_dir}/config.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or
    /// contains invalid JSON.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        fs::read_to_string(&path).map_or_else(
            |_| Self::default(),
            |contents| {
                serde_json::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt config file");
                    Self::default()
                })
            },
        )
    }

    /// Persist configuration to `{data_dir}/config.json`.
    ///
    /// Writes to a `.tmp` sibling, restricts it to the owner, then renames.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the
    /// file system rejects the write/rename.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let tmp = data_dir.join(".config.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        crate::store::write_owner_only(&tmp, json.as_bytes())?;
        fs::rename(&tmp, &path)?;

        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────
