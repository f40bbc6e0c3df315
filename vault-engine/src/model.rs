//! Domain and persisted record types. spec.md §3 ("Data model").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vault_crypto::CipherEnvelope;

/// A custom field on a credential record. `kind` is a closed enum with an
/// `Extension` escape hatch that preserves the raw type name for forward
/// compatibility with fields this engine doesn't understand yet. spec.md §9.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,
    pub kind: CustomFieldKind,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CustomFieldKind {
    Text,
    Hidden,
    Boolean,
    Linked,
    Extension(String),
}

/// A credential entry before encryption. spec.md §3 ("CredentialRecord").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub username: String,
    pub password: String,
    pub website: String,
    pub notes: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    /// `notes == ""` and `notes == None` (i.e. absent `notes` ciphertext on
    /// decode) are treated as equal, per the `fields_equal` law in spec.md §8.
    pub fn fields_equal(&self, other: &CredentialRecord) -> bool {
        let notes_equal = self.notes == other.notes
            || (self.notes.is_empty() && other.notes.is_empty());
        self.id == other.id
            && self.folder_id == other.folder_id
            && self.title == other.title
            && self.username == other.username
            && self.password == other.password
            && self.website == other.website
            && notes_equal
            && self.custom_fields == other.custom_fields
            && self.tags == other.tags
            && self.favorite == other.favorite
    }
}

/// Which domain the secret belongs to. Wire representation is numeric, per
/// spec.md §3; kept as a small closed set rather than a string tag so the
/// persisted layout matches the original service exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CipherType {
    Credential,
    Note,
    Card,
    Identity,
}

impl From<CipherType> for u8 {
    fn from(t: CipherType) -> u8 {
        match t {
            CipherType::Credential => 0,
            CipherType::Note => 1,
            CipherType::Card => 2,
            CipherType::Identity => 3,
        }
    }
}

impl TryFrom<u8> for CipherType {
    type Error = String;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Credential),
            1 => Ok(Self::Note),
            2 => Ok(Self::Card),
            3 => Ok(Self::Identity),
            other => Err(format!("unknown cipher type discriminant {other}")),
        }
    }
}

/// The persisted, encrypted form of a `CredentialRecord`. spec.md §3
/// ("EncryptedCipher").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedCipher {
    pub id: Uuid,
    pub user_id: String,
    pub folder_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub cipher_type: CipherType,
    pub favorite: bool,
    pub reprompt: bool,
    pub name: CipherEnvelope,
    pub data: CipherEnvelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<CipherEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<CipherEnvelope>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// The JSON payload bundled into `EncryptedCipher::data` before encryption.
/// Field names are stable and unknown fields are preserved via `extra` for
/// forward compatibility, per spec.md §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherPayload {
    pub username: String,
    pub password: String,
    pub website: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub password_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A folder groups ciphers; only its name is protected. spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub name: CipherEnvelope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The closed set of well-known folder ids shared across every user.
/// spec.md §3 ("Common folders have fixed well-known UUIDs").
pub mod well_known_folders {
    pub const NAMES: [&str; 8] = [
        "11111111-1111-4111-8111-111111111101",
        "11111111-1111-4111-8111-111111111102",
        "11111111-1111-4111-8111-111111111103",
        "11111111-1111-4111-8111-111111111104",
        "11111111-1111-4111-8111-111111111105",
        "11111111-1111-4111-8111-111111111106",
        "11111111-1111-4111-8111-111111111107",
        "11111111-1111-4111-8111-111111111108",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

/// A queued mutation awaiting remote replication. spec.md §3
/// ("PendingOperation"), §4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: Uuid,
    pub kind: OperationKind,
    pub record_id: Uuid,
    pub user_id: String,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub status: OperationStatus,
    /// Set each time a `drain` picks this row up; feeds `status()`'s
    /// `last_attempt_ts`. spec.md §4.6.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// The already-encrypted record this operation replicates. Never a
    /// fresh encryption — the optimistic store supplies it at enqueue time.
    pub record: EncryptedCipher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Deleted,
}

/// An `EncryptedCipher` enriched with local sync bookkeeping. spec.md §3
/// ("LocalRecord").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalRecord {
    pub cipher: EncryptedCipher,
    pub sync_status: SyncStatus,
    pub local_timestamp: DateTime<Utc>,
}

/// Metadata alongside a cached response body. spec.md §3 ("CacheEntry").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub timestamp: DateTime<Utc>,
    pub version: u32,
    pub user_id: String,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    pub metadata: CacheMetadata,
}
