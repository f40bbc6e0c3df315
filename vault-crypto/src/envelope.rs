//! Versioned ciphertext envelopes (C2) and the `"KB|"`-prefixed protected
//! string codec that sits on top of them.

use crate::aead;
use crate::error::CryptoError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Which AEAD construction produced a `CipherEnvelope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    AesGcm256,
    AesCbc256HmacSha256,
    XChaCha20Poly1305,
}

/// A tagged ciphertext record. Field order on the wire is fixed at
/// `{scheme, ct, iv, nonce, mac}`; absent fields are omitted rather than
/// serialized as `null`, per spec.md §3/§4.2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherEnvelope {
    pub scheme: Scheme,
    pub ct: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

impl CipherEnvelope {
    /// Canonical JSON encoding (stable field order, no whitespace).
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("CipherEnvelope serialization cannot fail")
    }

    pub fn from_canonical_json(s: &str) -> Result<Self, CryptoError> {
        let env: Self = serde_json::from_str(s).map_err(|_| CryptoError::DecryptFailed)?;
        env.validate_shape()?;
        Ok(env)
    }

    /// Checks that the required sub-fields for `scheme` are present, per the
    /// tagged-union invariant in spec.md §3 ("scheme determines which of
    /// iv/nonce/mac are required").
    fn validate_shape(&self) -> Result<(), CryptoError> {
        match self.scheme {
            Scheme::AesGcm256 => {
                if self.nonce.is_none() || self.iv.is_some() || self.mac.is_some() {
                    return Err(CryptoError::UnsupportedScheme);
                }
            }
            Scheme::XChaCha20Poly1305 => {
                if self.nonce.is_none() || self.iv.is_some() || self.mac.is_some() {
                    return Err(CryptoError::UnsupportedScheme);
                }
            }
            Scheme::AesCbc256HmacSha256 => {
                if self.iv.is_none() || self.mac.is_none() || self.nonce.is_some() {
                    return Err(CryptoError::UnsupportedScheme);
                }
            }
        }
        Ok(())
    }
}

fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn unb64(s: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD.decode(s).map_err(|_| CryptoError::DecryptFailed)
}

/// Encrypt `plaintext_utf8` under `key` using `scheme`, producing a
/// self-describing envelope. spec.md §4.1.
pub fn encrypt(plaintext_utf8: &str, key: &[u8], scheme: Scheme) -> Result<CipherEnvelope, CryptoError> {
    match scheme {
        Scheme::AesGcm256 => {
            let raw = aead::aes_gcm_encrypt(key, plaintext_utf8.as_bytes())?;
            Ok(CipherEnvelope {
                scheme,
                ct: b64(&raw.ct),
                iv: None,
                nonce: Some(b64(&raw.iv_or_nonce)),
                mac: None,
            })
        }
        Scheme::XChaCha20Poly1305 => {
            let raw = aead::xchacha_encrypt(key, plaintext_utf8.as_bytes())?;
            Ok(CipherEnvelope {
                scheme,
                ct: b64(&raw.ct),
                iv: None,
                nonce: Some(b64(&raw.iv_or_nonce)),
                mac: None,
            })
        }
        Scheme::AesCbc256HmacSha256 => {
            if key.len() != aead::CBC_HMAC_KEY_BYTES {
                return Err(CryptoError::InvalidLength);
            }
            let raw = aead::cbc_hmac_encrypt(key, plaintext_utf8.as_bytes())?;
            Ok(CipherEnvelope {
                scheme,
                ct: b64(&raw.ct),
                iv: Some(b64(&raw.iv_or_nonce)),
                nonce: None,
                mac: raw.mac.as_deref().map(b64),
            })
        }
    }
}

/// Decrypt `envelope` under `key`. Never attempts to decrypt under a
/// different scheme than the envelope declares (spec.md §4.1).
pub fn decrypt(envelope: &CipherEnvelope, key: &[u8]) -> Result<String, CryptoError> {
    envelope.validate_shape()?;
    let ct = unb64(&envelope.ct)?;

    let plaintext_bytes = match envelope.scheme {
        Scheme::AesGcm256 => {
            let nonce = unb64(envelope.nonce.as_deref().ok_or(CryptoError::InvalidLength)?)?;
            aead::aes_gcm_decrypt(key, &nonce, &ct)?
        }
        Scheme::XChaCha20Poly1305 => {
            let nonce = unb64(envelope.nonce.as_deref().ok_or(CryptoError::InvalidLength)?)?;
            aead::xchacha_decrypt(key, &nonce, &ct)?
        }
        Scheme::AesCbc256HmacSha256 => {
            if key.len() != aead::CBC_HMAC_KEY_BYTES {
                return Err(CryptoError::InvalidLength);
            }
            let iv = unb64(envelope.iv.as_deref().ok_or(CryptoError::InvalidLength)?)?;
            let mac = unb64(envelope.mac.as_deref().ok_or(CryptoError::InvalidLength)?)?;
            aead::cbc_hmac_decrypt(key, &iv, &ct, &mac)?
        }
    };

    String::from_utf8(plaintext_bytes).map_err(|_| CryptoError::DecryptFailed)
}

/// Reserved prefix marking a database field as protected. spec.md §3.
pub const PROTECTED_PREFIX: &str = "KB|";

pub fn is_protected(s: &str) -> bool {
    s.starts_with(PROTECTED_PREFIX)
}

/// `protect(s, key, scheme)`: idempotent — if `s` is already protected it is
/// returned unchanged (spec.md §4.2 idempotence law).
pub fn protect(s: &str, key: &[u8], scheme: Scheme) -> Result<String, CryptoError> {
    if is_protected(s) {
        return Ok(s.to_string());
    }
    let envelope = encrypt(s, key, scheme)?;
    Ok(format!("{PROTECTED_PREFIX}{}", envelope.canonical_json()))
}

/// `unprotect(s, key)`: pass through unprotected strings unchanged.
pub fn unprotect(s: &str, key: &[u8]) -> Result<String, CryptoError> {
    if !is_protected(s) {
        return Ok(s.to_string());
    }
    let body = &s[PROTECTED_PREFIX.len()..];
    let envelope = CipherEnvelope::from_canonical_json(body)?;
    decrypt(&envelope, key)
}
