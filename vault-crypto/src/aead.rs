//! AEAD constructions: AES-256-GCM, XChaCha20-Poly1305, AES-256-CBC+HMAC-SHA-256.

use crate::error::CryptoError;
use aes::Aes256;
use aes_gcm::{aead::Aead as _, Aes256Gcm, KeyInit as _, Nonce as GcmNonce};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chacha20poly1305::{aead::Aead as _, KeyInit as _, XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const GCM_NONCE_BYTES: usize = 12;
pub const XCHACHA_NONCE_BYTES: usize = 24;
pub const CBC_IV_BYTES: usize = 16;
pub const CBC_HMAC_KEY_BYTES: usize = 64;
pub const MAC_BYTES: usize = 32;

/// Cryptographically strong random bytes.
pub fn random(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    OsRng.fill_bytes(&mut buf);
    buf
}

pub fn random_salt() -> [u8; 16] {
    let mut buf = [0u8; 16];
    OsRng.fill_bytes(&mut buf);
    buf
}

pub fn random_key() -> [u8; 32] {
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Constant-time byte comparison.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Best-effort overwrite of a buffer before it's dropped.
pub fn zeroize(buf: &mut [u8]) {
    use zeroize::Zeroize;
    buf.zeroize();
}

/// Components produced by an encrypt call, before they're wrapped into a
/// `CipherEnvelope` by the `envelope` module.
pub struct RawCiphertext {
    pub ct: Vec<u8>,
    pub iv_or_nonce: Vec<u8>,
    pub mac: Option<Vec<u8>>,
}

pub fn aes_gcm_encrypt(key: &[u8], plaintext: &[u8]) -> Result<RawCiphertext, CryptoError> {
    if key.len() != 32 {
        return Err(CryptoError::InvalidLength);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidLength)?;
    let nonce_bytes = random(GCM_NONCE_BYTES);
    let nonce = GcmNonce::from_slice(&nonce_bytes);
    let ct = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::DecryptFailed)?;
    Ok(RawCiphertext { ct, iv_or_nonce: nonce_bytes, mac: None })
}

pub fn aes_gcm_decrypt(key: &[u8], nonce: &[u8], ct: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.len() != 32 {
        return Err(CryptoError::InvalidLength);
    }
    if nonce.len() != GCM_NONCE_BYTES {
        return Err(CryptoError::InvalidLength);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidLength)?;
    let n = GcmNonce::from_slice(nonce);
    cipher.decrypt(n, ct).map_err(|_| CryptoError::DecryptFailed)
}

pub fn xchacha_encrypt(key: &[u8], plaintext: &[u8]) -> Result<RawCiphertext, CryptoError> {
    if key.len() != 32 {
        return Err(CryptoError::InvalidLength);
    }
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::InvalidLength)?;
    let nonce_bytes = random(XCHACHA_NONCE_BYTES);
    let nonce = XNonce::from_slice(&nonce_bytes);
    let ct = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::DecryptFailed)?;
    Ok(RawCiphertext { ct, iv_or_nonce: nonce_bytes, mac: None })
}

pub fn xchacha_decrypt(key: &[u8], nonce: &[u8], ct: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.len() != 32 {
        return Err(CryptoError::InvalidLength);
    }
    if nonce.len() != XCHACHA_NONCE_BYTES {
        return Err(CryptoError::InvalidLength);
    }
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CryptoError::InvalidLength)?;
    let n = XNonce::from_slice(nonce);
    cipher.decrypt(n, ct).map_err(|_| CryptoError::DecryptFailed)
}

/// AES-256-CBC + HMAC-SHA-256, encrypt-then-MAC over `IV || ciphertext`.
/// Requires a 64-byte key: first 32 bytes for encryption, next 32 for the MAC.
pub fn cbc_hmac_encrypt(key: &[u8], plaintext: &[u8]) -> Result<RawCiphertext, CryptoError> {
    if key.len() != CBC_HMAC_KEY_BYTES {
        return Err(CryptoError::InvalidLength);
    }
    let (enc_key, mac_key) = key.split_at(32);
    let iv = random(CBC_IV_BYTES);

    let ct = Aes256CbcEnc::new(enc_key.into(), iv.as_slice().into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut mac = HmacSha256::new_from_slice(mac_key).map_err(|_| CryptoError::InvalidLength)?;
    mac.update(&iv);
    mac.update(&ct);
    let tag = mac.finalize().into_bytes().to_vec();

    Ok(RawCiphertext { ct, iv_or_nonce: iv, mac: Some(tag) })
}

/// Verifies the MAC before attempting to decrypt, and reports `MacMismatch`
/// without revealing whether the IV, ciphertext, or padding was the problem.
pub fn cbc_hmac_decrypt(key: &[u8], iv: &[u8], ct: &[u8], mac: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.len() != CBC_HMAC_KEY_BYTES {
        return Err(CryptoError::InvalidLength);
    }
    if iv.len() != CBC_IV_BYTES || mac.len() != MAC_BYTES {
        return Err(CryptoError::InvalidLength);
    }
    let (enc_key, mac_key) = key.split_at(32);

    let mut expected = HmacSha256::new_from_slice(mac_key).map_err(|_| CryptoError::InvalidLength)?;
    expected.update(iv);
    expected.update(ct);
    let expected_tag = expected.finalize().into_bytes();
    if !ct_eq(&expected_tag, mac) {
        return Err(CryptoError::MacMismatch);
    }

    Aes256CbcDec::new(enc_key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ct)
        .map_err(|_| CryptoError::DecryptFailed)
}
