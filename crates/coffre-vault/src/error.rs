//! Vault error types for `coffre-vault`.

use coffre_crypto_core::{CryptoError, KeyEpoch};
use thiserror::Error;

/// Errors produced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic operation failed (delegated from crypto-core).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// An envelope was sealed under an epoch the key ring has no material for.
    #[error("no key material for epoch {0}")]
    UnknownKeyEpoch(KeyEpoch),

    /// Record not found by owner and ID.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// The storage backend rejected or could not read the data.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
