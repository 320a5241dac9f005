//! Secret records: sealing before storage, opening after load.
//!
//! Only the `secret` field is encrypted. Title, username and website stay in
//! plaintext so the storage collaborator can list and search them.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use coffre_crypto_core::{open, seal, CryptoError, DecryptionFailure, Envelope, KeyEpoch};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::identity::KeyRing;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// User input for a new or edited record.
#[derive(Debug)]
pub struct RecordDraft {
    pub title: String,
    pub username: String,
    pub secret: SecretString,
    pub website: Option<String>,
}

impl RecordDraft {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            username: username.into(),
            secret: SecretString::from(secret.into()),
            website: None,
        }
    }

    #[must_use]
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }
}

/// A record as the storage collaborator sees it: `secret` is an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub username: String,
    /// Printable envelope.
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl StoredRecord {
    /// Epoch recorded in the envelope header, if the envelope parses.
    #[must_use]
    pub fn key_epoch(&self) -> Option<KeyEpoch> {
        Envelope::parse(&self.secret).ok().map(|e| e.epoch())
    }
}

/// Why a record's secret could not be revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockReason {
    /// The key ring has no material for the envelope's epoch.
    UnknownKeyEpoch(KeyEpoch),
    /// The envelope is malformed, foreign, or failed authentication.
    Decryption(DecryptionFailure),
    /// Any other cryptographic failure.
    Crypto(String),
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKeyEpoch(epoch) => write!(f, "no key material for epoch {epoch}"),
            Self::Decryption(failure) => write!(f, "{failure}"),
            Self::Crypto(message) => f.write_str(message),
        }
    }
}

impl From<CryptoError> for LockReason {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption(failure) => Self::Decryption(failure),
            other => Self::Crypto(other.to_string()),
        }
    }
}

/// The secret half of an opened record.
///
/// An empty secret is `Revealed("")`; a failed decryption is always
/// `Locked`, never an empty string.
#[derive(Debug)]
pub enum RevealedSecret {
    Revealed(SecretString),
    Locked(LockReason),
}

impl RevealedSecret {
    /// The plaintext, if revealed.
    #[must_use]
    pub fn expose(&self) -> Option<&str> {
        match self {
            Self::Revealed(secret) => Some(secret.expose_secret()),
            Self::Locked(_) => None,
        }
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }
}

/// Decrypted view of a [`StoredRecord`].
#[derive(Debug)]
pub struct OpenedRecord {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub username: String,
    pub secret: RevealedSecret,
    pub website: Option<String>,
    pub created_at: u64,
}

/// Result of [`migrate_record`] and [`migrate_document`](crate::migrate_document).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Migration<T = StoredRecord> {
    /// The envelope already uses the current epoch.
    Current,
    /// Re-sealed under the current epoch; the caller persists it.
    Migrated(T),
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Seal a new record for `owner_id` under the ring's current epoch.
///
/// Assigns a fresh UUID and the current time. Metadata is trimmed; an empty
/// website becomes `None`. The secret is sealed verbatim.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if sealing fails.
pub fn seal_record(
    owner_id: &str,
    draft: &RecordDraft,
    keys: &KeyRing,
) -> Result<StoredRecord, VaultError> {
    let envelope = seal(
        draft.secret.expose_secret(),
        keys.current(),
        keys.current_epoch(),
    )?;
    let record = StoredRecord {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_owned(),
        title: draft.title.trim().to_owned(),
        username: draft.username.trim().to_owned(),
        secret: envelope.to_string(),
        website: normalize_website(draft.website.as_deref()),
        created_at: unix_millis(),
    };
    tracing::debug!(record_id = %record.id, epoch = %keys.current_epoch(), "sealed record");
    Ok(record)
}

/// Replace the contents of `existing` with `draft`, keeping its id, owner
/// and creation time. The secret gets a fresh envelope.
///
/// # Errors
///
/// Returns [`VaultError::Crypto`] if sealing fails.
pub fn reseal_record(
    existing: &StoredRecord,
    draft: &RecordDraft,
    keys: &KeyRing,
) -> Result<StoredRecord, VaultError> {
    let envelope = seal(
        draft.secret.expose_secret(),
        keys.current(),
        keys.current_epoch(),
    )?;
    Ok(StoredRecord {
        id: existing.id.clone(),
        owner_id: existing.owner_id.clone(),
        title: draft.title.trim().to_owned(),
        username: draft.username.trim().to_owned(),
        secret: envelope.to_string(),
        website: normalize_website(draft.website.as_deref()),
        created_at: existing.created_at,
    })
}

/// Decrypt `stored` with whichever material in `keys` matches its epoch.
///
/// Never fails: an unreadable secret is reported as
/// [`RevealedSecret::Locked`] with the reason.
#[must_use]
pub fn open_record(stored: &StoredRecord, keys: &KeyRing) -> OpenedRecord {
    let secret = match reveal(&stored.secret, keys) {
        Ok(secret) => RevealedSecret::Revealed(secret),
        Err(reason) => {
            tracing::warn!(record_id = %stored.id, reason = %reason, "record secret is locked");
            RevealedSecret::Locked(reason)
        }
    };
    OpenedRecord {
        id: stored.id.clone(),
        owner_id: stored.owner_id.clone(),
        title: stored.title.clone(),
        username: stored.username.clone(),
        secret,
        website: stored.website.clone(),
        created_at: stored.created_at,
    }
}

/// Re-seal `stored` under the current epoch if it was sealed under an older one.
///
/// # Errors
///
/// Returns [`VaultError::UnknownKeyEpoch`] if the ring lacks the material the
/// envelope was sealed with, or [`VaultError::Crypto`] if it does not open.
pub fn migrate_record(stored: &StoredRecord, keys: &KeyRing) -> Result<Migration, VaultError> {
    let Some(secret) = reseal_envelope(&stored.secret, keys)? else {
        return Ok(Migration::Current);
    };
    tracing::info!(
        record_id = %stored.id,
        to = %keys.current_epoch(),
        "migrated record to current key epoch"
    );
    Ok(Migration::Migrated(StoredRecord {
        secret,
        ..stored.clone()
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn reveal(encoded: &str, keys: &KeyRing) -> Result<SecretString, LockReason> {
    let envelope = Envelope::parse(encoded)?;
    let material = keys
        .material(envelope.epoch())
        .ok_or(LockReason::UnknownKeyEpoch(envelope.epoch()))?;
    Ok(open(&envelope, material)?)
}

/// Open an envelope sealed under an older epoch and seal its plaintext under
/// the current one. `None` when it is already current.
pub(crate) fn reseal_envelope(encoded: &str, keys: &KeyRing) -> Result<Option<String>, VaultError> {
    let envelope = Envelope::parse(encoded)?;
    let epoch = envelope.epoch();
    if epoch == keys.current_epoch() {
        return Ok(None);
    }

    let material = keys
        .material(epoch)
        .ok_or(VaultError::UnknownKeyEpoch(epoch))?;
    let plaintext = open(&envelope, material)?;
    let resealed = seal(plaintext.expose_secret(), keys.current(), keys.current_epoch())?;
    tracing::debug!(from = %epoch, to = %keys.current_epoch(), "resealed envelope");
    Ok(Some(resealed.to_string()))
}

fn normalize_website(website: Option<&str>) -> Option<String> {
    website
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
