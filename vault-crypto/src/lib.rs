//! Client-side cryptographic primitives for kb-vault: key derivation, AEAD
//! envelopes, and the `"KB|"`-prefixed protected string codec.
//!
//! This crate has no notion of "purpose" or account state — it derives raw
//! key bytes and seals/opens bytes under them. Purpose-scoped key lifecycle
//! and session handling live in `vault-keys`.

mod aead;
mod envelope;
mod error;
mod kdf;

pub use aead::{ct_eq, random, random_key, random_salt, zeroize, CBC_HMAC_KEY_BYTES};
pub use envelope::{decrypt, encrypt, is_protected, protect, unprotect, CipherEnvelope, Scheme, PROTECTED_PREFIX};
pub use error::CryptoError;
pub use kdf::{
    derive_key, derive_protection_key, hash_passphrase, KdfParams, ARGON2ID_MAX_ITERATIONS,
    ARGON2ID_MAX_MEMORY_KIB, ARGON2ID_MAX_PARALLELISM, ARGON2ID_MIN_ITERATIONS,
    ARGON2ID_MIN_MEMORY_KIB, ARGON2ID_MIN_PARALLELISM, PBKDF2_DEFAULT_ITERATIONS,
    PBKDF2_LEGACY_ITERATIONS, PBKDF2_MAX_ITERATIONS, PBKDF2_MIN_ITERATIONS,
};
