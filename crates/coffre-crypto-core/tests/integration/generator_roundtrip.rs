//! Generated secrets go through the envelope cipher unchanged.

use coffre_crypto_core::envelope::{decrypt, encrypt};
use coffre_crypto_core::generator::{generate, CoveragePolicy, GeneratorConfig};
use coffre_crypto_core::kdf::KeyMaterial;
use secrecy::ExposeSecret;

#[test]
fn generated_secret_roundtrips() {
    let k = KeyMaterial::new("6a1f0c3e-alice@example.com").expect("material");
    let config = GeneratorConfig {
        length: 32,
        policy: CoveragePolicy::GuaranteedCoverage,
        ..GeneratorConfig::default()
    };
    let secret = generate(&config).expect("generate should succeed");

    let envelope = encrypt(&secret, &k).expect("encrypt should succeed");
    assert!(!envelope.contains(&secret));
    assert_eq!(decrypt(&envelope, &k).expect("decrypt").expose_secret(), secret);
}

#[test]
fn default_entropy_exceeds_one_hundred_bits() {
    let bits = GeneratorConfig::default().entropy_bits();
    assert!(bits > 100.0, "got {bits}");
}
