//! Vault codec (C4): `CredentialRecord` <-> `EncryptedCipher`, and the
//! folder name protector. spec.md §4.4.

use chrono::Utc;
use vault_crypto::Scheme;

use crate::error::{BatchReport, EngineError};
use crate::model::{CipherPayload, CipherType, CredentialRecord, EncryptedCipher, Folder};

/// The scheme used for every new encryption this codec performs. XChaCha20-
/// Poly1305 is preferred per spec.md §4.4 ("The default AEAD scheme is
/// XChaCha20-Poly1305 where available").
pub const DEFAULT_SCHEME: Scheme = Scheme::XChaCha20Poly1305;

/// Encrypts a `CredentialRecord` under `user_key`, producing the persisted
/// `EncryptedCipher` form. spec.md §4.4, steps 1-5.
pub fn encrypt_record(
    record: &CredentialRecord,
    user_id: &str,
    user_key: &[u8],
) -> Result<EncryptedCipher, EngineError> {
    let name = vault_crypto::encrypt(&record.title, user_key, DEFAULT_SCHEME)?;

    let payload = CipherPayload {
        username: record.username.clone(),
        password: record.password.clone(),
        website: record.website.clone(),
        custom_fields: record.custom_fields.clone(),
        tags: record.tags.clone(),
        password_type: None,
        extra: serde_json::Map::new(),
    };
    let payload_json = serde_json::to_string(&payload)
        .map_err(|e| EngineError::CorruptRecord(crate::error::CorruptRecord {
            id: record.id.to_string(),
            reason: format!("payload serialize: {e}"),
        }))?;
    let data = vault_crypto::encrypt(&payload_json, user_key, DEFAULT_SCHEME)?;

    let notes = if record.notes.is_empty() {
        None
    } else {
        Some(vault_crypto::encrypt(&record.notes, user_key, DEFAULT_SCHEME)?)
    };

    let now = Utc::now();
    Ok(EncryptedCipher {
        id: record.id,
        user_id: user_id.to_string(),
        folder_id: record.folder_id,
        cipher_type: CipherType::Credential,
        favorite: record.favorite,
        reprompt: false,
        name,
        data,
        notes,
        key: None,
        created_at: record.created_at,
        updated_at: record.updated_at,
        revision_date: now,
        deleted_at: record.deleted_at,
    })
}

/// Decrypts an `EncryptedCipher` back into a `CredentialRecord`. A failure
/// to decrypt or to parse the decrypted JSON payload signals `CorruptRecord`
/// and is the caller's responsibility to skip in bulk contexts — this
/// function itself never partially succeeds. spec.md §4.4.
pub fn decrypt_record(cipher: &EncryptedCipher, user_key: &[u8]) -> Result<CredentialRecord, EngineError> {
    let corrupt = |reason: String| {
        EngineError::CorruptRecord(crate::error::CorruptRecord { id: cipher.id.to_string(), reason })
    };

    let title = vault_crypto::decrypt(&cipher.name, user_key).map_err(|e| corrupt(e.to_string()))?;
    let payload_json = vault_crypto::decrypt(&cipher.data, user_key).map_err(|e| corrupt(e.to_string()))?;
    let payload: CipherPayload =
        serde_json::from_str(&payload_json).map_err(|e| corrupt(format!("payload parse: {e}")))?;
    let notes = match &cipher.notes {
        Some(env) => vault_crypto::decrypt(env, user_key).map_err(|e| corrupt(e.to_string()))?,
        None => String::new(),
    };

    Ok(CredentialRecord {
        id: cipher.id,
        folder_id: cipher.folder_id,
        title,
        username: payload.username,
        password: payload.password,
        website: payload.website,
        notes,
        custom_fields: payload.custom_fields,
        tags: payload.tags,
        favorite: cipher.favorite,
        created_at: cipher.created_at,
        updated_at: cipher.updated_at,
        deleted_at: cipher.deleted_at,
    })
}

/// Protects only the `name` field of a folder. spec.md §4.4 ("Folders are
/// encoded by protecting only the `name` field").
pub fn encrypt_folder(
    id: uuid::Uuid,
    name: &str,
    user_key: &[u8],
    created_at: chrono::DateTime<Utc>,
) -> Result<Folder, EngineError> {
    let envelope = vault_crypto::encrypt(name, user_key, DEFAULT_SCHEME)?;
    Ok(Folder { id, name: envelope, created_at, updated_at: Utc::now() })
}

pub fn decrypt_folder_name(folder: &Folder, user_key: &[u8]) -> Result<String, EngineError> {
    vault_crypto::decrypt(&folder.name, user_key).map_err(|e| {
        EngineError::CorruptRecord(crate::error::CorruptRecord { id: folder.id.to_string(), reason: e.to_string() })
    })
}

/// Encrypts every record independently; failures accumulate in the returned
/// `BatchReport` rather than aborting the batch. spec.md §4.4 ("Bulk
/// variants").
pub fn encrypt_many(
    records: &[CredentialRecord],
    user_id: &str,
    user_key: &[u8],
) -> (Vec<EncryptedCipher>, BatchReport) {
    let mut ciphers = Vec::with_capacity(records.len());
    let mut report = BatchReport::default();
    for record in records {
        match encrypt_record(record, user_id, user_key) {
            Ok(cipher) => ciphers.push(cipher),
            Err(e) => report.push_failure(record.id.to_string(), e.to_string()),
        }
    }
    (ciphers, report)
}

/// Re-wraps one cipher from `old_user_key` to `new_user_key`. spec.md §4.3
/// describes `rotate_user_key` as "re-wrapping each per-record key that was
/// wrapped under the old user key"; this codec has no separate per-record
/// key (every field is encrypted directly under the user key, `key` stays
/// `None`), so the equivalent here is decrypt-then-re-encrypt of the whole
/// record, which leaves the record readable only under the new key exactly
/// as rotation requires.
pub fn rewrap_record(
    cipher: &EncryptedCipher,
    old_user_key: &[u8],
    new_user_key: &[u8],
) -> Result<EncryptedCipher, EngineError> {
    let record = decrypt_record(cipher, old_user_key)?;
    encrypt_record(&record, &cipher.user_id, new_user_key)
}

/// Bulk `rewrap_record`: a cipher that fails to decrypt under the old key is
/// left untouched in neither list and recorded as a failure, same
/// per-element accumulation discipline as `encrypt_many`/`decrypt_many`.
pub fn rewrap_many(
    ciphers: &[EncryptedCipher],
    old_user_key: &[u8],
    new_user_key: &[u8],
) -> (Vec<EncryptedCipher>, BatchReport) {
    let mut rewrapped = Vec::with_capacity(ciphers.len());
    let mut report = BatchReport::default();
    for cipher in ciphers {
        match rewrap_record(cipher, old_user_key, new_user_key) {
            Ok(c) => rewrapped.push(c),
            Err(e) => {
                tracing::warn!(cipher_id = %cipher.id, error = %e, "skipping record that failed key rotation");
                report.push_failure(cipher.id.to_string(), e.to_string());
            }
        }
    }
    (rewrapped, report)
}

pub fn decrypt_many(ciphers: &[EncryptedCipher], user_key: &[u8]) -> (Vec<CredentialRecord>, BatchReport) {
    let mut records = Vec::with_capacity(ciphers.len());
    let mut report = BatchReport::default();
    for cipher in ciphers {
        match decrypt_record(cipher, user_key) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(cipher_id = %cipher.id, error = %e, "skipping corrupt record in batch decode");
                report.push_failure(cipher.id.to_string(), e.to_string());
            }
        }
    }
    (records, report)
}

