//! PBKDF2-HMAC-SHA256 Known-Answer Tests.
//!
//! Vectors from the RFC 6070 layout recomputed for HMAC-SHA256 (as published
//! alongside RFC 7914).

use coffre_crypto_core::kdf::{derive_key, Pbkdf2Params};
use data_encoding::HEXLOWER;

/// P = "passwordPASSWORDpassword", S = "saltSALTsaltSALTsaltSALTsaltSALTsalt",
/// c = 4096, dkLen = 40.
#[test]
fn long_password_long_salt_4096_iterations() {
    let params = Pbkdf2Params {
        iterations: 4096,
        key_bits: 320,
    };
    let key = derive_key(
        b"passwordPASSWORDpassword",
        b"saltSALTsaltSALTsaltSALTsaltSALTsalt",
        &params,
    )
    .expect("derive should succeed");

    assert_eq!(
        HEXLOWER.encode(key.expose()),
        "348c89dbcbd32b2f32d814b8116e84cf2b17347ebc1800181c4e2a1fb8dd53e1c635518c7dac47e9"
    );
}

/// P = "password", S = "salt", c = 1, dkLen = 32.
///
/// The salt is below our 16-byte minimum, so this checks the underlying
/// `pbkdf2` crate directly.
#[test]
fn short_vector_against_pbkdf2_crate() {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(b"password", b"salt", 1, &mut out);
    assert_eq!(
        HEXLOWER.encode(&out),
        "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
    );
}

/// The version-1 envelope profile: 10 000 iterations, 256-bit key.
#[test]
fn envelope_profile_vector() {
    let key = derive_key(
        b"user-42-alice@example.com",
        b"0123456789abcdef",
        &Pbkdf2Params::default(),
    )
    .expect("derive should succeed");

    assert_eq!(
        HEXLOWER.encode(key.expose()),
        "87867106628f3b8667c67f35d0e2421e79fa850f02a69b059ac522fd716beb0c"
    );
}
