//! The opaque, forward-compatible record handed to and from the remote
//! identity service. spec.md §6 ("Persisted user record").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vault_crypto::{CipherEnvelope, CryptoError, KdfParams};

/// On-the-wire name for a KDF family, independent of the in-memory
/// `KdfParams` representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KdfType {
    Pbkdf2Sha256,
    Argon2id,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedUser {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kdf_type: KdfType,
    pub kdf_iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kdf_memory: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kdf_parallelism: Option<u32>,
    pub kdf_salt: String,
    pub auth_hash: String,
    pub wrapped_user_key: CipherEnvelope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedUser {
    /// Reconstructs the `KdfParams` tagged union this user was set up with.
    ///
    /// Accepts the legacy 100k-iteration PBKDF2 count alongside the current
    /// `[600k, 2M]` range so that accounts created before the iteration
    /// floor was raised can still unlock; nothing in this crate ever writes
    /// a new `PersistedUser` with the legacy count.
    pub fn kdf_params(&self) -> Result<KdfParams, CryptoError> {
        match self.kdf_type {
            KdfType::Pbkdf2Sha256 if self.kdf_iterations == vault_crypto::PBKDF2_LEGACY_ITERATIONS => {
                Ok(KdfParams::legacy_pbkdf2_100k())
            }
            KdfType::Pbkdf2Sha256 => KdfParams::pbkdf2(self.kdf_iterations),
            KdfType::Argon2id => {
                let memory = self.kdf_memory.ok_or(CryptoError::KdfOutOfRange)?;
                let parallelism = self.kdf_parallelism.ok_or(CryptoError::KdfOutOfRange)?;
                KdfParams::argon2id(self.kdf_iterations, memory, parallelism)
            }
        }
    }

    pub fn salt_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        STANDARD.decode(&self.kdf_salt).map_err(|_| CryptoError::InvalidLength)
    }
}

pub(crate) fn kdf_params_to_fields(params: KdfParams) -> (KdfType, u32, Option<u32>, Option<u32>) {
    match params {
        KdfParams::Pbkdf2Sha256 { iterations } => (KdfType::Pbkdf2Sha256, iterations, None, None),
        KdfParams::Argon2id { iterations, memory_kib, parallelism } => {
            (KdfType::Argon2id, iterations, Some(memory_kib), Some(parallelism))
        }
    }
}
