//! Cryptographic error types for `coffre-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (empty key material, short salt, invalid PBKDF2 parameters).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AES-256-GCM sealing failure.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// An envelope could not be opened. Never carries partial plaintext.
    #[error("decryption failed: {0}")]
    Decryption(DecryptionFailure),

    /// Caller-supplied configuration is unusable (missing key material,
    /// generator with no character class or zero length).
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Secure memory allocation failure (mlock, CSPRNG fill).
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}

/// Why an envelope could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptionFailure {
    /// Missing separator, bad base64, or segments of the wrong length.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The payload declares a format version this build does not read.
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    /// Authentication tag mismatch: wrong key material or tampered envelope.
    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    /// The authenticated plaintext is not valid UTF-8.
    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8,
}

impl From<DecryptionFailure> for CryptoError {
    fn from(failure: DecryptionFailure) -> Self {
        Self::Decryption(failure)
    }
}

impl CryptoError {
    /// Returns `true` for any failure to open an envelope.
    #[must_use]
    pub const fn is_decryption(&self) -> bool {
        matches!(self, Self::Decryption(_))
    }
}
