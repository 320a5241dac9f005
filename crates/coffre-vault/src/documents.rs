//! Sealed documents: whole files kept next to the records.
//!
//! A document's bytes are base64-encoded and sealed as one envelope under the
//! ring's current epoch. Name, media type and size stay in plaintext for
//! listing. Plaintext copies made along the way are wiped with `zeroize`.

use std::fmt;

use coffre_crypto_core::{open, seal, Envelope, KeyEpoch};
use data_encoding::BASE64;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::VaultError;
use crate::identity::KeyRing;
use crate::records::{reseal_envelope, unix_millis, Migration};

/// Largest document [`seal_document`] accepts: 10 MiB.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Media type used when the caller does not name one.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A file about to be sealed.
pub struct DocumentDraft {
    pub name: String,
    pub media_type: String,
    pub content: Zeroizing<Vec<u8>>,
}

impl DocumentDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            content: Zeroizing::new(content),
        }
    }
}

impl fmt::Debug for DocumentDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentDraft")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.content.len())
            .finish_non_exhaustive()
    }
}

/// A document as the storage collaborator sees it: `content` is an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub media_type: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Printable envelope over the base64 of the bytes.
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl StoredDocument {
    /// Epoch recorded in the envelope header, if the envelope parses.
    #[must_use]
    pub fn key_epoch(&self) -> Option<KeyEpoch> {
        Envelope::parse(&self.content).ok().map(|e| e.epoch())
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Seal `draft` for `owner_id` under the ring's current epoch.
///
/// The name is trimmed; a blank media type becomes [`DEFAULT_MEDIA_TYPE`].
///
/// # Errors
///
/// - [`VaultError::Config`] if the name is blank or the content is larger
///   than [`MAX_DOCUMENT_BYTES`].
/// - [`VaultError::Crypto`] if sealing fails.
pub fn seal_document(
    owner_id: &str,
    draft: &DocumentDraft,
    keys: &KeyRing,
) -> Result<StoredDocument, VaultError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(VaultError::Config("document name must not be blank".into()));
    }
    if draft.content.len() > MAX_DOCUMENT_BYTES {
        return Err(VaultError::Config(format!(
            "document is {} bytes, the limit is {MAX_DOCUMENT_BYTES}",
            draft.content.len()
        )));
    }
    let media_type = match draft.media_type.trim() {
        "" => DEFAULT_MEDIA_TYPE,
        other => other,
    };

    let encoded = Zeroizing::new(BASE64.encode(&draft.content));
    let envelope = seal(&encoded, keys.current(), keys.current_epoch())?;

    let document = StoredDocument {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: owner_id.to_owned(),
        name: name.to_owned(),
        media_type: media_type.to_owned(),
        size: u64::try_from(draft.content.len()).unwrap_or(u64::MAX),
        content: envelope.to_string(),
        created_at: unix_millis(),
    };
    tracing::debug!(
        document_id = %document.id,
        size = document.size,
        epoch = %keys.current_epoch(),
        "sealed document"
    );
    Ok(document)
}

/// Decrypt the bytes of `stored`.
///
/// # Errors
///
/// - [`VaultError::UnknownKeyEpoch`] if the ring lacks the envelope's epoch.
/// - [`VaultError::Crypto`] if the envelope is malformed or fails
///   authentication.
/// - [`VaultError::Storage`] if the decrypted payload is not the base64 of
///   `size` bytes.
pub fn open_document(
    stored: &StoredDocument,
    keys: &KeyRing,
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let envelope = Envelope::parse(&stored.content)?;
    let material = keys
        .material(envelope.epoch())
        .ok_or(VaultError::UnknownKeyEpoch(envelope.epoch()))?;
    let encoded = open(&envelope, material)?;

    let bytes = Zeroizing::new(
        BASE64
            .decode(encoded.expose_secret().as_bytes())
            .map_err(|e| {
                VaultError::Storage(format!("document {} payload is not base64: {e}", stored.id))
            })?,
    );
    if u64::try_from(bytes.len()).ok() != Some(stored.size) {
        return Err(VaultError::Storage(format!(
            "document {} holds {} bytes, expected {}",
            stored.id,
            bytes.len(),
            stored.size
        )));
    }
    Ok(bytes)
}

/// Re-seal `stored` under the current epoch if it was sealed under an older one.
///
/// # Errors
///
/// Same as [`migrate_record`](crate::migrate_record).
pub fn migrate_document(
    stored: &StoredDocument,
    keys: &KeyRing,
) -> Result<Migration<StoredDocument>, VaultError> {
    let Some(content) = reseal_envelope(&stored.content, keys)? else {
        return Ok(Migration::Current);
    };
    tracing::info!(
        document_id = %stored.id,
        to = %keys.current_epoch(),
        "migrated document to current key epoch"
    );
    Ok(Migration::Migrated(StoredDocument {
        content,
        ..stored.clone()
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
