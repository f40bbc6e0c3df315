//! Error taxonomy for `vault-engine`. spec.md §7.

use core::fmt;
use vault_crypto::CryptoError;
use vault_keys::KeysError;

/// A single record that failed during a bulk operation. Bulk operations
/// never abort on these — they collect them and keep going. spec.md §7
/// ("Propagation policy").
#[derive(Debug, Clone)]
pub struct CorruptRecord {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum EngineError {
    /// Caller invoked an operation requiring the user key while locked.
    VaultLocked,
    /// Wrong passphrase at unlock; never retried.
    WrongPassphrase,
    /// A specific record failed to decrypt or parse; carried per-record in
    /// bulk results, never propagated on its own.
    CorruptRecord(CorruptRecord),
    /// CBC+HMAC authentication failed for a record; subsumes `CorruptRecord`
    /// for that record.
    MacMismatch,
    Crypto(CryptoError),
    /// Sync sweep detected no connectivity; no state was mutated.
    NetworkUnavailable,
    /// 5xx response from the remote; consumes a retry.
    ServerError(u16),
    /// 4xx response from the remote; fails the operation immediately.
    ClientError(u16),
    /// Cache or backup integrity hash did not match.
    IntegrityCheckFailed,
    /// Operation addressed a pending-op/local-record id that doesn't exist.
    NotFound,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VaultLocked => write!(f, "vault is locked"),
            Self::WrongPassphrase => write!(f, "wrong passphrase"),
            Self::CorruptRecord(r) => write!(f, "corrupt record {}: {}", r.id, r.reason),
            Self::MacMismatch => write!(f, "decryption failed"),
            Self::Crypto(e) => write!(f, "{e}"),
            Self::NetworkUnavailable => write!(f, "network unavailable"),
            Self::ServerError(code) => write!(f, "server error ({code})"),
            Self::ClientError(code) => write!(f, "client error ({code})"),
            Self::IntegrityCheckFailed => write!(f, "integrity check failed"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<CryptoError> for EngineError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::MacMismatch => Self::MacMismatch,
            other => Self::Crypto(other),
        }
    }
}

impl From<KeysError> for EngineError {
    fn from(e: KeysError) -> Self {
        match e {
            KeysError::VaultLocked => Self::VaultLocked,
            KeysError::WrongPassphrase => Self::WrongPassphrase,
            KeysError::Crypto(c) => c.into(),
            KeysError::InvalidSessionState { .. } => Self::VaultLocked,
        }
    }
}

/// The outcome of a batch operation: the successes plus every per-element
/// failure, never a single error that aborts the whole batch. spec.md §7.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub failures: Vec<CorruptRecord>,
}

impl BatchReport {
    pub fn push_failure(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(CorruptRecord { id: id.into(), reason: reason.into() });
    }
}
