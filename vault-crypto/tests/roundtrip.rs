use vault_crypto::{
    decrypt, derive_key, derive_protection_key, encrypt, hash_passphrase, is_protected, protect,
    unprotect, random, random_salt, CryptoError, KdfParams, Scheme, CBC_HMAC_KEY_BYTES,
};

fn cbc_key() -> Vec<u8> {
    random(CBC_HMAC_KEY_BYTES)
}

#[test]
fn aes_gcm_roundtrip() {
    let key = random(32);
    let env = encrypt("hunter2", &key, Scheme::AesGcm256).unwrap();
    assert_eq!(decrypt(&env, &key).unwrap(), "hunter2");
}

#[test]
fn xchacha_roundtrip() {
    let key = random(32);
    let env = encrypt("correct horse battery staple", &key, Scheme::XChaCha20Poly1305).unwrap();
    assert_eq!(decrypt(&env, &key).unwrap(), "correct horse battery staple");
}

#[test]
fn cbc_hmac_roundtrip() {
    let key = cbc_key();
    let env = encrypt("swordfish", &key, Scheme::AesCbc256HmacSha256).unwrap();
    assert_eq!(decrypt(&env, &key).unwrap(), "swordfish");
}

#[test]
fn cbc_hmac_rejects_short_key() {
    let key = random(32);
    let err = encrypt("swordfish", &key, Scheme::AesCbc256HmacSha256).unwrap_err();
    assert_eq!(err, CryptoError::InvalidLength);
}

#[test]
fn cbc_hmac_bit_flip_in_ciphertext_is_mac_mismatch() {
    let key = cbc_key();
    let mut env = encrypt("tamper me", &key, Scheme::AesCbc256HmacSha256).unwrap();
    let mut raw = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &env.ct).unwrap();
    raw[0] ^= 0x01;
    env.ct = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &raw);
    let err = decrypt(&env, &key).unwrap_err();
    assert_eq!(err, CryptoError::MacMismatch);
}

#[test]
fn wrong_key_fails_to_decrypt_gcm() {
    let key = random(32);
    let other = random(32);
    let env = encrypt("secret", &key, Scheme::AesGcm256).unwrap();
    assert!(decrypt(&env, &other).is_err());
}

#[test]
fn protect_is_idempotent() {
    let key = random(32);
    let once = protect("plain value", &key, Scheme::AesGcm256).unwrap();
    let twice = protect(&once, &key, Scheme::AesGcm256).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn protect_unprotect_roundtrip() {
    let key = random(32);
    let protected = protect("my note", &key, Scheme::XChaCha20Poly1305).unwrap();
    assert!(is_protected(&protected));
    assert!(protected.starts_with("KB|"));
    assert_eq!(unprotect(&protected, &key).unwrap(), "my note");
}

#[test]
fn unprotect_passes_through_plain_strings() {
    let key = random(32);
    assert_eq!(unprotect("not protected", &key).unwrap(), "not protected");
}

#[test]
fn kdf_rejects_out_of_range_pbkdf2_iterations() {
    assert!(KdfParams::pbkdf2(1_000).is_err());
    assert!(KdfParams::pbkdf2(600_000).is_ok());
    assert!(KdfParams::pbkdf2(3_000_000).is_err());
}

#[test]
fn kdf_rejects_out_of_range_argon2_params() {
    assert!(KdfParams::argon2id(1, 65_536, 4).is_err());
    assert!(KdfParams::argon2id(3, 1024, 4).is_err());
    assert!(KdfParams::argon2id(3, 65_536, 32).is_err());
    assert!(KdfParams::argon2id(3, 65_536, 4).is_ok());
}

#[test]
fn derive_key_is_deterministic_for_same_inputs() {
    let salt = random_salt();
    let params = KdfParams::default_pbkdf2();
    let a = derive_key("passphrase", &salt, params).unwrap();
    let b = derive_key("passphrase", &salt, params).unwrap();
    assert_eq!(*a, *b);
}

#[test]
fn hash_passphrase_is_deterministic() {
    let salt = random_salt();
    assert_eq!(hash_passphrase("p", &salt), hash_passphrase("p", &salt));
}

#[test]
fn hash_passphrase_differs_from_derive_key_even_with_matching_params() {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    let salt = random_salt();
    let params = KdfParams::default_pbkdf2();
    let derived = derive_key("passphrase", &salt, params).unwrap();
    let hashed = hash_passphrase("passphrase", &salt);
    assert_ne!(STANDARD.encode(*derived), hashed);
}

#[test]
fn distinct_purposes_derive_distinct_protection_keys() {
    let master = random(32);
    let a = derive_protection_key(&master, "vault-items");
    let b = derive_protection_key(&master, "vault-attachments");
    assert_ne!(*a, *b);
}
