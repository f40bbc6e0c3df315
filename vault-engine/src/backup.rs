//! `.kbx` backup file format: export/import with a SHA-256 integrity check
//! over the inner document. spec.md §6 ("Backup file format"), §8 scenario 6.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vault_crypto::{CipherEnvelope, Scheme};

use crate::error::EngineError;
use crate::model::{EncryptedCipher, Folder};

pub const BACKUP_VERSION_CURRENT: &str = "2.0";
pub const BACKUP_VERSION_LEGACY: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionType {
    UserKey,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub total_entries: usize,
    pub total_categories: usize,
    pub backup_type: BackupType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    pub data_hash: String,
}

/// The inner document whose hash is checked on import. This is what gets
/// encrypted into `KbxBackup::encrypted_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerDocument {
    pub version: String,
    pub ciphers: Vec<EncryptedCipher>,
    pub categories: Vec<Folder>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbxBackup {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub application: String,
    pub encryption_type: EncryptionType,
    pub kdf_type: vault_keys::KdfType,
    pub kdf_iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kdf_memory: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kdf_parallelism: Option<u32>,
    /// Empty string when `encryption_type == UserKey`, per spec.md §6.
    pub kdf_salt: String,
    pub encrypted_data: CipherEnvelope,
    pub metadata: BackupMetadata,
}

fn canonical_hash(inner: &InnerDocument) -> Result<String, EngineError> {
    let json = serde_json::to_string(inner).map_err(|_| EngineError::IntegrityCheckFailed)?;
    Ok(hex::encode(Sha256::digest(json.as_bytes())))
}

/// Encrypts `ciphers`/`folders` under `key` into a `.kbx` document.
#[allow(clippy::too_many_arguments)]
pub fn export_backup(
    ciphers: Vec<EncryptedCipher>,
    folders: Vec<Folder>,
    key: &[u8],
    encryption_type: EncryptionType,
    kdf_type: vault_keys::KdfType,
    kdf_iterations: u32,
    kdf_memory: Option<u32>,
    kdf_parallelism: Option<u32>,
    kdf_salt: Option<&[u8]>,
    backup_type: BackupType,
) -> Result<KbxBackup, EngineError> {
    let total_entries = ciphers.len();
    let total_categories = folders.len();
    let inner = InnerDocument { version: BACKUP_VERSION_CURRENT.to_string(), ciphers, categories: folders, exported_at: Utc::now() };

    let data_hash = canonical_hash(&inner)?;
    let inner_json = serde_json::to_string(&inner).map_err(|_| EngineError::IntegrityCheckFailed)?;
    let scheme = if key.len() == vault_crypto::CBC_HMAC_KEY_BYTES { Scheme::AesCbc256HmacSha256 } else { Scheme::XChaCha20Poly1305 };
    let encrypted_data = vault_crypto::encrypt(&inner_json, key, scheme)?;

    let kdf_salt_b64 = match (encryption_type, kdf_salt) {
        (EncryptionType::UserKey, _) => String::new(),
        (EncryptionType::Password, Some(salt)) => {
            use base64::{engine::general_purpose::STANDARD, Engine as _};
            STANDARD.encode(salt)
        }
        (EncryptionType::Password, None) => return Err(EngineError::NotFound),
    };

    Ok(KbxBackup {
        version: BACKUP_VERSION_CURRENT.to_string(),
        created_at: Utc::now(),
        application: "kb-vault".to_string(),
        encryption_type,
        kdf_type,
        kdf_iterations,
        kdf_memory,
        kdf_parallelism,
        kdf_salt: kdf_salt_b64,
        encrypted_data,
        metadata: BackupMetadata { total_entries, total_categories, backup_type, version_name: None, data_hash },
    })
}

/// Decrypts and verifies a `.kbx` document. Aborts with
/// `IntegrityCheckFailed` if `sha256(innerJson)` does not match
/// `metadata.data_hash`, or if the envelope fails to decrypt.
/// Version `"1.0"` is accepted for legacy import with the same shape.
pub fn import_backup(backup: &KbxBackup, key: &[u8]) -> Result<InnerDocument, EngineError> {
    if backup.version != BACKUP_VERSION_CURRENT && backup.version != BACKUP_VERSION_LEGACY {
        return Err(EngineError::IntegrityCheckFailed);
    }

    let inner_json = vault_crypto::decrypt(&backup.encrypted_data, key).map_err(|_| EngineError::IntegrityCheckFailed)?;
    let inner: InnerDocument = serde_json::from_str(&inner_json).map_err(|_| EngineError::IntegrityCheckFailed)?;

    let actual_hash = canonical_hash(&inner)?;
    if actual_hash != backup.metadata.data_hash {
        return Err(EngineError::IntegrityCheckFailed);
    }

    Ok(inner)
}
