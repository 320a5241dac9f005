//! Integration tests for encrypt → store as text → parse → decrypt.

use coffre_crypto_core::envelope::{decrypt, encrypt, open, seal, Envelope, KeyEpoch};
use coffre_crypto_core::kdf::KeyMaterial;
use secrecy::ExposeSecret;

fn material(user_id: &str, email: &str) -> KeyMaterial {
    KeyMaterial::new(format!("{user_id}-{email}")).expect("material")
}

#[test]
fn roundtrip_realistic_secret() {
    let k = material("6a1f0c3e", "alice@example.com");
    let envelope = encrypt("Tr0ub4dor&3", &k).expect("encrypt should succeed");
    let decrypted = decrypt(&envelope, &k).expect("decrypt should succeed");
    assert_eq!(decrypted.expose_secret(), "Tr0ub4dor&3");
}

#[test]
fn roundtrip_large_secret() {
    let k = material("6a1f0c3e", "alice@example.com");
    let secret = "x".repeat(64 * 1024);
    let envelope = encrypt(&secret, &k).expect("encrypt should succeed");
    let decrypted = decrypt(&envelope, &k).expect("decrypt should succeed");
    assert_eq!(decrypted.expose_secret(), secret);
}

#[test]
fn envelope_survives_json_storage() {
    let k = material("6a1f0c3e", "alice@example.com");
    let envelope = encrypt("stored", &k).expect("encrypt should succeed");

    let row = serde_json::json!({ "title": "mail", "password": envelope });
    let json = serde_json::to_string(&row).expect("serialize");
    let back: serde_json::Value = serde_json::from_str(&json).expect("deserialize");
    let stored = back["password"].as_str().expect("string field");

    assert_eq!(decrypt(stored, &k).expect("decrypt").expose_secret(), "stored");
}

#[test]
fn other_user_cannot_open() {
    let alice = material("6a1f0c3e", "alice@example.com");
    let bob = material("91bd22aa", "bob@example.com");
    let envelope = encrypt("alice only", &alice).expect("encrypt should succeed");
    assert!(decrypt(&envelope, &bob).is_err());
}

#[test]
fn typed_and_text_apis_agree() {
    let k = material("6a1f0c3e", "alice@example.com");
    let sealed = seal("typed", &k, KeyEpoch(5)).expect("seal should succeed");
    let text = sealed.to_string();

    let parsed: Envelope = text.parse().expect("parse should succeed");
    assert_eq!(parsed.epoch(), KeyEpoch(5));
    assert_eq!(open(&parsed, &k).expect("open").expose_secret(), "typed");
    assert_eq!(decrypt(&text, &k).expect("decrypt").expose_secret(), "typed");
}
