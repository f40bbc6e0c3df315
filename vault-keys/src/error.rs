//! Error types for `vault-keys`.

use core::fmt;
use vault_crypto::CryptoError;

/// Failure modes of the key hierarchy and session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeysError {
    /// Authentication-hash mismatch or user-key unwrap failure at unlock.
    /// Deliberately a single variant so the two checks are indistinguishable
    /// to a caller — spec.md §8 requires no observable timing/behavioral
    /// difference between them.
    WrongPassphrase,
    /// An operation needing the user key was attempted while locked.
    VaultLocked,
    /// The session is not in a state that allows the requested transition.
    InvalidSessionState { from: &'static str, attempted: &'static str },
    /// A lower-level crypto failure (KDF bounds, AEAD, envelope format).
    Crypto(CryptoError),
}

impl fmt::Display for KeysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongPassphrase => write!(f, "wrong passphrase"),
            Self::VaultLocked => write!(f, "vault is locked"),
            Self::InvalidSessionState { from, attempted } => {
                write!(f, "cannot {attempted} session from state {from}")
            }
            Self::Crypto(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for KeysError {}

impl From<CryptoError> for KeysError {
    fn from(e: CryptoError) -> Self {
        Self::Crypto(e)
    }
}
