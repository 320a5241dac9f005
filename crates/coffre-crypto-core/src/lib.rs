//! `coffre-crypto-core`: client-side primitives for COFFRE.
//!
//! Envelope encryption of individual secrets, PBKDF2 key derivation and
//! random secret generation. No network, no async, no storage.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;

pub mod envelope;

pub mod generator;

pub use envelope::{decrypt, encrypt, open, seal, Envelope, KeyEpoch, ENVELOPE_VERSION};
pub use error::{CryptoError, DecryptionFailure};
pub use generator::{
    generate, CharClass, CoveragePolicy, GeneratorConfig, DEFAULT_LENGTH, MAX_LENGTH,
};
pub use kdf::{derive_key, KeyMaterial, Pbkdf2Params, DEFAULT_ITERATIONS, DEFAULT_KEY_BITS};
pub use memory::{disable_core_dumps, SecretBuffer};
