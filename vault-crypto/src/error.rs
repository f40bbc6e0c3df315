//! Error types for `vault-crypto`.

use core::fmt;

/// Every way a crypto operation in this crate can fail.
///
/// Decrypt-path failures (`MacMismatch`, `DecryptFailed`) are kept
/// indistinguishable from each other in their `Display` text so that callers
/// cannot build a padding/MAC oracle from the error message alone; they are
/// still distinct *variants* so callers that need to log internally (never
/// show to the end user) can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// The requested AEAD/KDF scheme isn't supported (or isn't wired up yet).
    UnsupportedScheme,
    /// A key, nonce, or salt had the wrong length for the chosen scheme.
    InvalidLength,
    /// CBC+HMAC authentication failed.
    MacMismatch,
    /// AEAD decryption failed (tag mismatch, truncated ciphertext, etc).
    DecryptFailed,
    /// KDF parameters fall outside the allowed range.
    KdfOutOfRange,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedScheme => write!(f, "unsupported scheme"),
            Self::InvalidLength => write!(f, "invalid length"),
            Self::MacMismatch => write!(f, "decryption failed"),
            Self::DecryptFailed => write!(f, "decryption failed"),
            Self::KdfOutOfRange => write!(f, "kdf parameters out of range"),
        }
    }
}

impl std::error::Error for CryptoError {}
