//! Fixed version-1 envelope produced by an independent AES-GCM implementation.
//!
//! salt  = 00 01 .. 0f
//! epoch = 3
//! nonce = 64 65 .. 6f
//! key   = PBKDF2-HMAC-SHA256("user-42-alice@example.com", salt, 10 000, 32)
//! AAD   = 01 00 00 00 03

use coffre_crypto_core::envelope::{decrypt, Envelope, KeyEpoch};
use coffre_crypto_core::error::{CryptoError, DecryptionFailure};
use coffre_crypto_core::kdf::KeyMaterial;
use secrecy::ExposeSecret;

const VECTOR: &str = "AAECAwQFBgcICQoLDA0ODw==:AQAAAANkZWZnaGlqa2xtbm8rDMRDN4nih9p4B8HmyJhDzTOZArajDEJPXurrblchSw==";

#[test]
fn decrypts_reference_envelope() {
    let material = KeyMaterial::new("user-42-alice@example.com").expect("material");
    let plaintext = decrypt(VECTOR, &material).expect("decrypt should succeed");
    assert_eq!(plaintext.expose_secret(), "hunter2-Correct!");
}

#[test]
fn reference_envelope_fields() {
    let envelope = Envelope::parse(VECTOR).expect("parse should succeed");
    assert_eq!(envelope.version(), 1);
    assert_eq!(envelope.epoch(), KeyEpoch(3));
    assert_eq!(envelope.salt(), &core::array::from_fn::<u8, 16, _>(|i| i as u8));
    assert_eq!(envelope.ciphertext().len(), "hunter2-Correct!".len());
    assert_eq!(envelope.to_string(), VECTOR);
}

#[test]
fn reference_envelope_rejects_other_identity() {
    let material = KeyMaterial::new("user-42-mallory@example.com").expect("material");
    let err = decrypt(VECTOR, &material).expect_err("wrong identity");
    assert!(matches!(
        err,
        CryptoError::Decryption(DecryptionFailure::AuthenticationFailed)
    ));
}
