//! Envelope cipher: per-record key derivation + AES-256-GCM.
//!
//! This module provides:
//! - [`encrypt`] / [`decrypt`]: plaintext ⇄ printable envelope string
//! - [`seal`] / [`open`]: the same operations over a typed [`Envelope`]
//! - [`Envelope`]: immutable salt + payload container, parsed from / rendered to text
//! - [`KeyEpoch`]: which generation of key material sealed an envelope
//!
//! # Wire format
//!
//! ```text
//! BASE64(salt[16]) ':' BASE64(version[1] || epoch[4, BE] || nonce[12] || ciphertext || tag[16])
//! ```
//!
//! Every call draws a fresh salt and nonce from `OsRng`, derives a fresh key
//! with PBKDF2-HMAC-SHA256 (10 000 iterations), and drops the key before
//! returning. The version and epoch bytes are bound to the ciphertext as AAD.

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE64;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{CryptoError, DecryptionFailure};
use crate::kdf::{derive_key, KeyMaterial, Pbkdf2Params};
use crate::memory::SecretBuffer;

/// Salt length in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Current envelope format: PBKDF2-HMAC-SHA256 (10k, 256-bit) + AES-256-GCM.
pub const ENVELOPE_VERSION: u8 = 1;

/// Separates the encoded salt from the encoded payload.
pub const SEPARATOR: char = ':';

/// Authenticated header: version byte + big-endian epoch.
const HEADER_LEN: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Generation of the identity-derived key material.
///
/// Bumped whenever the inputs to the key material change (for example a new
/// verified email), so older envelopes can still be matched with the
/// material that sealed them.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct KeyEpoch(pub u32);

impl KeyEpoch {
    /// Epoch of material that has never been rotated.
    pub const INITIAL: Self = Self(0);

    /// The following epoch, or `None` on overflow.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }
}

impl fmt::Display for KeyEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One encrypted field, exactly as persisted.
///
/// Only [`seal`] and [`Envelope::parse`] create values; there are no setters.
#[must_use = "an envelope must be stored or it is lost"]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    version: u8,
    epoch: KeyEpoch,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
    tag: [u8; TAG_LEN],
}

impl Envelope {
    /// Parse the printable form.
    ///
    /// Splits on the first [`SEPARATOR`]; both halves must be standard padded
    /// base64.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Decryption` with
    /// - [`DecryptionFailure::MalformedEnvelope`] for a missing separator, bad
    ///   base64, or wrong segment lengths
    /// - [`DecryptionFailure::UnsupportedVersion`] for an unknown format version
    pub fn parse(encoded: &str) -> Result<Self, CryptoError> {
        let (salt_part, payload_part) = encoded
            .split_once(SEPARATOR)
            .ok_or_else(|| malformed("missing ':' separator"))?;

        let salt_bytes = BASE64
            .decode(salt_part.as_bytes())
            .map_err(|e| malformed(format!("salt is not base64: {e}")))?;
        let salt: [u8; SALT_LEN] = salt_bytes.as_slice().try_into().map_err(|_| {
            malformed(format!(
                "salt is {} bytes (expected {SALT_LEN})",
                salt_bytes.len()
            ))
        })?;

        let payload = BASE64
            .decode(payload_part.as_bytes())
            .map_err(|e| malformed(format!("payload is not base64: {e}")))?;

        let (&version, rest) = payload
            .split_first()
            .ok_or_else(|| malformed("payload is empty"))?;
        if version != ENVELOPE_VERSION {
            return Err(DecryptionFailure::UnsupportedVersion(version).into());
        }

        let min_rest = HEADER_LEN
            .saturating_sub(1)
            .saturating_add(NONCE_LEN)
            .saturating_add(TAG_LEN);
        if rest.len() < min_rest {
            return Err(malformed(format!(
                "payload is {} bytes (minimum {})",
                payload.len(),
                min_rest.saturating_add(1)
            )));
        }

        let (epoch_bytes, rest) = rest.split_at(HEADER_LEN.saturating_sub(1));
        let (nonce_bytes, rest) = rest.split_at(NONCE_LEN);
        let (ciphertext, tag_bytes) = rest.split_at(rest.len().saturating_sub(TAG_LEN));

        let epoch_bytes: [u8; 4] = epoch_bytes
            .try_into()
            .map_err(|_| malformed("truncated epoch"))?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| malformed("truncated nonce"))?;
        let tag: [u8; TAG_LEN] = tag_bytes
            .try_into()
            .map_err(|_| malformed("truncated tag"))?;

        Ok(Self {
            version,
            epoch: KeyEpoch(u32::from_be_bytes(epoch_bytes)),
            salt,
            nonce,
            ciphertext: ciphertext.to_vec(),
            tag,
        })
    }

    /// Format version byte.
    #[must_use]
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Key epoch the envelope was sealed under.
    #[must_use]
    pub const fn epoch(&self) -> KeyEpoch {
        self.epoch
    }

    /// The per-envelope KDF salt.
    #[must_use]
    pub const fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// Ciphertext without nonce or tag.
    #[must_use]
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    fn header(&self) -> [u8; HEADER_LEN] {
        header(self.version, self.epoch)
    }

    fn payload(&self) -> Vec<u8> {
        let capacity = HEADER_LEN
            .saturating_add(NONCE_LEN)
            .saturating_add(self.ciphertext.len())
            .saturating_add(TAG_LEN);
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.header());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}",
            BASE64.encode(&self.salt),
            BASE64.encode(&self.payload())
        )
    }
}

impl FromStr for Envelope {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Core operations
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` under `material` and return the printable envelope.
///
/// Seals under [`KeyEpoch::INITIAL`]; use [`seal`] to pick the epoch.
///
/// # Errors
///
/// See [`seal`].
pub fn encrypt(plaintext: &str, material: &KeyMaterial) -> Result<String, CryptoError> {
    Ok(seal(plaintext, material, KeyEpoch::INITIAL)?.to_string())
}

/// Parse `envelope` and decrypt it with `material`.
///
/// # Errors
///
/// Returns `CryptoError::Decryption` if the envelope is malformed, of an
/// unknown version, or fails authentication (wrong material, tampering).
pub fn decrypt(envelope: &str, material: &KeyMaterial) -> Result<SecretString, CryptoError> {
    let envelope = Envelope::parse(envelope)?;
    open(&envelope, material)
}

/// Seal `plaintext` into a new [`Envelope`] tagged with `epoch`.
///
/// # Errors
///
/// Returns:
/// - `CryptoError::SecureMemory` if the CSPRNG fails
/// - `CryptoError::KeyDerivation` if key derivation fails
/// - `CryptoError::Encryption` if AES-256-GCM sealing fails
pub fn seal(
    plaintext: &str,
    material: &KeyMaterial,
    epoch: KeyEpoch,
) -> Result<Envelope, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    fill_random(&mut salt)?;
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;

    let key = derive_key(
        material.expose().as_bytes(),
        &salt,
        &Pbkdf2Params::default(),
    )?;
    let cipher = aead_key(&key)?;
    drop(key);

    let aad = header(ENVELOPE_VERSION, epoch);
    let mut in_out = plaintext.as_bytes().to_vec();
    let Ok(tag) = cipher.seal_in_place_separate_tag(
        aead::Nonce::assume_unique_for_key(nonce),
        aead::Aad::from(&aad),
        &mut in_out,
    ) else {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM sealing failed".into(),
        ));
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    tracing::trace!(epoch = %epoch, "sealed envelope");

    Ok(Envelope {
        version: ENVELOPE_VERSION,
        epoch,
        salt,
        nonce,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// Authenticate and decrypt `envelope` with `material`.
///
/// The envelope is only borrowed; a failed open leaves it untouched and
/// returns no plaintext at all.
///
/// # Errors
///
/// Returns `CryptoError::Decryption` with
/// [`DecryptionFailure::AuthenticationFailed`] for a wrong key or tampered
/// bytes, [`DecryptionFailure::InvalidUtf8`] if the authenticated plaintext
/// is not text, and [`DecryptionFailure::UnsupportedVersion`] for a foreign
/// version byte.
pub fn open(envelope: &Envelope, material: &KeyMaterial) -> Result<SecretString, CryptoError> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(DecryptionFailure::UnsupportedVersion(envelope.version).into());
    }

    let key = derive_key(
        material.expose().as_bytes(),
        &envelope.salt,
        &Pbkdf2Params::default(),
    )?;
    let cipher = aead_key(&key)?;
    drop(key);

    let mut ct_tag = Vec::with_capacity(envelope.ciphertext.len().saturating_add(TAG_LEN));
    ct_tag.extend_from_slice(&envelope.ciphertext);
    ct_tag.extend_from_slice(&envelope.tag);

    let aad = envelope.header();
    let result = match cipher.open_in_place(
        aead::Nonce::assume_unique_for_key(envelope.nonce),
        aead::Aad::from(&aad),
        &mut ct_tag,
    ) {
        Ok(plaintext) => std::str::from_utf8(plaintext)
            .map(|text| SecretString::from(text.to_owned()))
            .map_err(|_| CryptoError::from(DecryptionFailure::InvalidUtf8)),
        Err(_) => {
            tracing::debug!(epoch = %envelope.epoch, "envelope authentication failed");
            Err(DecryptionFailure::AuthenticationFailed.into())
        }
    };
    ct_tag.zeroize();
    result
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn header(version: u8, epoch: KeyEpoch) -> [u8; HEADER_LEN] {
    let e = epoch.0.to_be_bytes();
    [version, e[0], e[1], e[2], e[3]]
}

fn aead_key(key: &SecretBuffer) -> Result<aead::LessSafeKey, CryptoError> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key.expose())
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))
}

fn malformed(reason: impl Into<String>) -> CryptoError {
    DecryptionFailure::MalformedEnvelope(reason.into()).into()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn material(s: &str) -> KeyMaterial {
        KeyMaterial::new(s).expect("material")
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let k = material("7f3a-alice@example.com");
        let envelope = encrypt("correct horse battery staple", &k).expect("encrypt");
        let plaintext = decrypt(&envelope, &k).expect("decrypt");
        assert_eq!(plaintext.expose_secret(), "correct horse battery staple");
    }

    #[test]
    fn identical_inputs_produce_different_envelopes() {
        let k = material("7f3a-alice@example.com");
        let a = encrypt("same secret", &k).expect("encrypt");
        let b = encrypt("same secret", &k).expect("encrypt");
        assert_ne!(a, b);

        let (salt_a, _) = a.split_once(SEPARATOR).expect("separator");
        let (salt_b, _) = b.split_once(SEPARATOR).expect("separator");
        assert_ne!(salt_a, salt_b, "salts must be fresh per call");
    }

    #[test]
    fn envelope_is_printable_salt_colon_payload() {
        let k = material("7f3a-alice@example.com");
        let envelope = encrypt("s3cret", &k).expect("encrypt");
        assert!(envelope.chars().all(|c| c.is_ascii_graphic()));
        assert_eq!(envelope.matches(SEPARATOR).count(), 1);

        let (salt, _) = envelope.split_once(SEPARATOR).expect("separator");
        assert_eq!(BASE64.decode(salt.as_bytes()).expect("base64").len(), SALT_LEN);
    }

    #[test]
    fn wrong_material_fails_authentication() {
        let envelope = encrypt("s3cret", &material("user-1-a@example.com")).expect("encrypt");
        let err = decrypt(&envelope, &material("user-1-b@example.com")).expect_err("wrong key");
        assert!(matches!(
            err,
            CryptoError::Decryption(DecryptionFailure::AuthenticationFailed)
        ));
    }

    #[test]
    fn not_an_envelope_is_malformed() {
        let err = decrypt("not-an-envelope", &material("k")).expect_err("malformed");
        assert!(matches!(
            err,
            CryptoError::Decryption(DecryptionFailure::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn malformed_inputs_are_rejected_without_panicking() {
        let k = material("k");
        for input in [
            "",
            ":",
            "::::",
            "AAAAAAAAAAAAAAAAAAAAAA==:",
            "AAAAAAAAAAAAAAAAAAAAAA==:AQ==",
            "not base64!:AAAA",
            "AAAA:AAAA",
        ] {
            let err = decrypt(input, &k).expect_err("should fail");
            assert!(err.is_decryption(), "input {input:?} gave {err}");
        }
    }

    #[test]
    fn legacy_cryptojs_envelope_is_rejected() {
        let legacy = "00112233445566778899aabbccddeeff:U2FsdGVkX19hYmNkZWZnaGlqa2xtbm9wcXJzdHV2";
        let err = decrypt(legacy, &material("k")).expect_err("legacy");
        assert!(err.is_decryption());
    }

    #[test]
    fn unknown_version_is_reported() {
        let k = material("k");
        let envelope = seal("x", &k, KeyEpoch::INITIAL).expect("seal");
        let mut payload = envelope.payload();
        payload[0] = 9;
        let forged = format!(
            "{}{SEPARATOR}{}",
            BASE64.encode(envelope.salt()),
            BASE64.encode(&payload)
        );
        let err = decrypt(&forged, &k).expect_err("version");
        assert!(matches!(
            err,
            CryptoError::Decryption(DecryptionFailure::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let k = material("k");
        let mut envelope = seal("tamper me", &k, KeyEpoch::INITIAL).expect("seal");
        envelope.ciphertext[0] ^= 0x01;
        let err = open(&envelope, &k).expect_err("tampered");
        assert!(matches!(
            err,
            CryptoError::Decryption(DecryptionFailure::AuthenticationFailed)
        ));
    }

    #[test]
    fn tampered_epoch_fails() {
        let k = material("k");
        let mut envelope = seal("tamper me", &k, KeyEpoch(2)).expect("seal");
        envelope.epoch = KeyEpoch(3);
        assert!(open(&envelope, &k).is_err());
    }

    #[test]
    fn tampered_salt_fails() {
        let k = material("k");
        let mut envelope = seal("tamper me", &k, KeyEpoch::INITIAL).expect("seal");
        envelope.salt[0] ^= 0xFF;
        assert!(open(&envelope, &k).is_err());
    }

    #[test]
    fn failed_open_leaves_envelope_unchanged() {
        let envelope = seal("immutable", &material("a"), KeyEpoch::INITIAL).expect("seal");
        let before = envelope.clone();
        let _ = open(&envelope, &material("b"));
        assert_eq!(envelope, before);
    }

    #[test]
    fn empty_plaintext_roundtrips_as_empty() {
        let k = material("k");
        let envelope = encrypt("", &k).expect("encrypt");
        let plaintext = decrypt(&envelope, &k).expect("empty secret is still a valid secret");
        assert_eq!(plaintext.expose_secret(), "");
    }

    #[test]
    fn unicode_plaintext_roundtrips() {
        let k = material("k");
        let envelope = encrypt("mot de passe — ключ 🔑", &k).expect("encrypt");
        assert_eq!(
            decrypt(&envelope, &k).expect("decrypt").expose_secret(),
            "mot de passe — ключ 🔑"
        );
    }

    #[test]
    fn epoch_survives_text_roundtrip() {
        let k = material("k");
        let envelope = seal("x", &k, KeyEpoch(41)).expect("seal");
        let parsed: Envelope = envelope.to_string().parse().expect("parse");
        assert_eq!(parsed.epoch(), KeyEpoch(41));
        assert_eq!(parsed.version(), ENVELOPE_VERSION);
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn ciphertext_does_not_contain_plaintext() {
        let k = material("k");
        let envelope = seal("AAAAAAAAAAAAAAAA", &k, KeyEpoch::INITIAL).expect("seal");
        assert_ne!(envelope.ciphertext(), b"AAAAAAAAAAAAAAAA");
        assert_eq!(envelope.ciphertext().len(), 16);
    }

    #[test]
    fn key_epoch_next() {
        assert_eq!(KeyEpoch::INITIAL.next(), Some(KeyEpoch(1)));
        assert_eq!(KeyEpoch(u32::MAX).next(), None);
    }
}
