//! PBKDF2-HMAC-SHA256 key derivation.
//!
//! This module provides:
//! - [`KeyMaterial`]: the identity-derived secret every envelope is keyed from
//! - [`Pbkdf2Params`]: iteration count and output size
//! - [`derive_key`]: stretch key material + salt into a [`SecretBuffer`]
//!
//! # Profile
//!
//! Envelope version 1 pins `iterations = 10_000` and a 256-bit output. The
//! parameters are not stored per envelope: the version byte selects them, so a
//! decrypt always reproduces the key its encrypt used.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::memory::SecretBuffer;

/// Iteration count of the version-1 envelope profile.
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Derived key size of the version-1 envelope profile.
pub const DEFAULT_KEY_BITS: u32 = 256;

/// Minimum salt length in bytes (128 bits).
pub const MIN_SALT_LEN: usize = 16;

/// Largest output we agree to derive.
const MAX_KEY_BITS: u32 = 512;

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

/// Secret input to key derivation, derived from the authenticated identity.
///
/// There is no default and no empty value: constructing one from an empty or
/// whitespace-only string fails, so no call can silently fall back to a
/// shared key.
pub struct KeyMaterial(SecretString);

impl KeyMaterial {
    /// Wrap `material`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Configuration`] if `material` is empty or only
    /// whitespace.
    pub fn new(material: impl Into<String>) -> Result<Self, CryptoError> {
        let mut material = material.into();
        if material.trim().is_empty() {
            material.zeroize();
            return Err(CryptoError::Configuration(
                "key material is required".into(),
            ));
        }
        Ok(Self(SecretString::from(material)))
    }

    /// Borrow the material for one derivation.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for KeyMaterial {
    fn clone(&self) -> Self {
        Self(SecretString::from(self.expose().to_owned()))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(***)")
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// PBKDF2 parameter set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pbkdf2Params {
    /// HMAC-SHA256 iterations.
    pub iterations: u32,
    /// Output size in bits; a non-zero multiple of 8, at most 512.
    pub key_bits: u32,
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            key_bits: DEFAULT_KEY_BITS,
        }
    }
}

impl Pbkdf2Params {
    /// Output length in bytes.
    #[must_use]
    pub const fn key_len(&self) -> usize {
        (self.key_bits / 8) as usize
    }

    fn validate(&self) -> Result<(), CryptoError> {
        if self.iterations == 0 {
            return Err(CryptoError::KeyDerivation(
                "iteration count must be at least 1".into(),
            ));
        }
        if self.key_bits == 0 || self.key_bits % 8 != 0 || self.key_bits > MAX_KEY_BITS {
            return Err(CryptoError::KeyDerivation(format!(
                "key size must be a multiple of 8 between 8 and {MAX_KEY_BITS} bits, got {}",
                self.key_bits
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Core KDF
// ---------------------------------------------------------------------------

/// Derive `params.key_bits / 8` bytes from `material` and `salt`.
///
/// Deterministic for identical inputs. The intermediate output buffer is
/// zeroized once copied into the returned [`SecretBuffer`].
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if:
/// - `material` is empty
/// - `salt` is shorter than [`MIN_SALT_LEN`] bytes
/// - `params` has zero iterations or an unusable key size
pub fn derive_key(
    material: &[u8],
    salt: &[u8],
    params: &Pbkdf2Params,
) -> Result<SecretBuffer, CryptoError> {
    if material.is_empty() {
        return Err(CryptoError::KeyDerivation("key material is empty".into()));
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }
    params.validate()?;

    let mut output = vec![0u8; params.key_len()];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(material, salt, params.iterations, &mut output);

    let result = SecretBuffer::new(&output)
        .map_err(|e| CryptoError::KeyDerivation(format!("secure buffer allocation failed: {e}")));
    output.zeroize();
    result
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
