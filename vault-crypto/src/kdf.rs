//! Key derivation: PBKDF2-HMAC-SHA-256 and Argon2id, plus the HKDF step used
//! for purpose-scoped protection keys.

use crate::error::CryptoError;
use argon2::Argon2;
use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// PBKDF2 iteration bounds, inclusive. spec.md §4.1.
pub const PBKDF2_MIN_ITERATIONS: u32 = 600_000;
pub const PBKDF2_MAX_ITERATIONS: u32 = 2_000_000;

/// Default PBKDF2 iteration count for new accounts.
pub const PBKDF2_DEFAULT_ITERATIONS: u32 = 600_000;

/// Legacy PBKDF2 iteration count accepted on decrypt/import only.
pub const PBKDF2_LEGACY_ITERATIONS: u32 = 100_000;

/// Iterations used by `hash_passphrase`, independent of the main KDF params.
pub const AUTH_HASH_ITERATIONS: u32 = 600_000;

pub const ARGON2ID_MIN_ITERATIONS: u32 = 2;
pub const ARGON2ID_MAX_ITERATIONS: u32 = 10;
pub const ARGON2ID_MIN_MEMORY_KIB: u32 = 15 * 1024;
pub const ARGON2ID_MAX_MEMORY_KIB: u32 = 1024 * 1024;
pub const ARGON2ID_MIN_PARALLELISM: u32 = 1;
pub const ARGON2ID_MAX_PARALLELISM: u32 = 16;

/// Tagged union of the KDF families a `PersistedUser` can name.
///
/// Validated entirely at construction — `KdfOutOfRange` is returned here,
/// never from `derive_key`, per spec.md §4.1 ("rejected at construction,
/// not at use").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfParams {
    Pbkdf2Sha256 { iterations: u32 },
    Argon2id { iterations: u32, memory_kib: u32, parallelism: u32 },
}

impl KdfParams {
    /// The spec-mandated default KDF: PBKDF2-HMAC-SHA-256 at 600k iterations.
    pub fn default_pbkdf2() -> Self {
        Self::Pbkdf2Sha256 { iterations: PBKDF2_DEFAULT_ITERATIONS }
    }

    pub fn pbkdf2(iterations: u32) -> Result<Self, CryptoError> {
        if !(PBKDF2_MIN_ITERATIONS..=PBKDF2_MAX_ITERATIONS).contains(&iterations) {
            return Err(CryptoError::KdfOutOfRange);
        }
        Ok(Self::Pbkdf2Sha256 { iterations })
    }

    pub fn argon2id(iterations: u32, memory_kib: u32, parallelism: u32) -> Result<Self, CryptoError> {
        if !(ARGON2ID_MIN_ITERATIONS..=ARGON2ID_MAX_ITERATIONS).contains(&iterations)
            || !(ARGON2ID_MIN_MEMORY_KIB..=ARGON2ID_MAX_MEMORY_KIB).contains(&memory_kib)
            || !(ARGON2ID_MIN_PARALLELISM..=ARGON2ID_MAX_PARALLELISM).contains(&parallelism)
        {
            return Err(CryptoError::KdfOutOfRange);
        }
        Ok(Self::Argon2id { iterations, memory_kib, parallelism })
    }

    /// Accept a legacy PBKDF2-100k envelope for read-only import. Never
    /// returned by anything that writes a new `PersistedUser`. spec.md §9.
    pub fn legacy_pbkdf2_100k() -> Self {
        Self::Pbkdf2Sha256 { iterations: PBKDF2_LEGACY_ITERATIONS }
    }
}

/// Derive a 32-byte key from `passphrase` and `salt` using `params`.
pub fn derive_key(passphrase: &str, salt: &[u8], params: KdfParams) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let mut out = Zeroizing::new([0u8; 32]);
    match params {
        KdfParams::Pbkdf2Sha256 { iterations } => {
            pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, out.as_mut());
        }
        KdfParams::Argon2id { iterations, memory_kib, parallelism } => {
            let argon_params = argon2::Params::new(memory_kib, iterations, parallelism, Some(32))
                .map_err(|_| CryptoError::KdfOutOfRange)?;
            let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, argon_params);
            argon2
                .hash_password_into(passphrase.as_bytes(), salt, out.as_mut())
                .map_err(|_| CryptoError::DecryptFailed)?;
        }
    }
    Ok(out)
}

/// Independent authentication-hash derivation (spec.md §4.1): always
/// PBKDF2-HMAC-SHA-256 at 600k iterations, regardless of the account's own
/// KDF params, then re-hashed with SHA-256 before base64 encoding so the
/// result is never byte-identical to `derive_key`'s raw output even when
/// parameters happen to match (spec.md: "it is hashed again, not the raw
/// derived key").
pub fn hash_passphrase(passphrase: &str, salt: &[u8]) -> String {
    use sha2::Digest;
    let mut derived = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, AUTH_HASH_ITERATIONS, &mut derived);
    let rehashed = Sha256::digest(derived);
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD.encode(rehashed)
}

/// HKDF-SHA-256 with a zero salt, IKM = master key, info = UTF-8(purpose).
/// spec.md §4.3 ("Protection key derivation").
pub fn derive_protection_key(master_key: &[u8], purpose: &str) -> Zeroizing<[u8; 32]> {
    let zero_salt = [0u8; 32];
    let hk = Hkdf::<Sha256>::new(Some(&zero_salt), master_key);
    let mut out = Zeroizing::new([0u8; 32]);
    // HKDF::expand only fails when the output is too long for the hash;
    // 32 bytes out of SHA-256 can never hit that limit.
    hk.expand(purpose.as_bytes(), out.as_mut())
        .expect("32-byte HKDF-SHA-256 expand cannot fail");
    out
}
