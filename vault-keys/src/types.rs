//! The three key types of the hierarchy: master, user, and purpose-scoped
//! protection keys. spec.md §3 ("Entities").

use std::collections::HashMap;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Derived from the user's passphrase. 32 bytes, never persisted.
#[derive(ZeroizeOnDrop)]
pub struct MasterKey(pub(crate) [u8; 32]);

impl MasterKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Randomly generated once at account setup. Persisted only wrapped under
/// the master key. 32 bytes, or 64 for the CBC+HMAC construction.
#[derive(ZeroizeOnDrop)]
pub struct UserKey(pub(crate) Vec<u8>);

impl UserKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A purpose-scoped key derived from the master key via HKDF. Never
/// persisted; materialized lazily and cached for the session's lifetime.
#[derive(Clone, ZeroizeOnDrop)]
pub struct ProtectionKey(pub(crate) [u8; 32]);

impl ProtectionKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Purpose tags used as HKDF `info`. spec.md §3 lists these as the minimum
/// set a conforming engine must support.
pub mod purpose {
    pub const USER_AUTH: &str = "user_auth";
    pub const USER_KEYS: &str = "user_keys";
    pub const CIPHER_DATA: &str = "cipher_data";
    pub const CIPHER_KEYS: &str = "cipher_keys";
    pub const FOLDER_DATA: &str = "folder_data";
}

/// Per-purpose cache of derived protection keys, owned by the `Session`.
#[derive(Default)]
pub(crate) struct ProtectionKeyCache {
    keys: HashMap<String, ProtectionKey>,
}

impl ProtectionKeyCache {
    pub(crate) fn get_or_derive(&mut self, master: &MasterKey, purpose: &str) -> ProtectionKey {
        if let Some(k) = self.keys.get(purpose) {
            return k.clone();
        }
        let derived = vault_crypto::derive_protection_key(master.as_bytes(), purpose);
        let key = ProtectionKey(*derived);
        self.keys.insert(purpose.to_string(), key.clone());
        key
    }

    pub(crate) fn clear(&mut self) {
        for (_, mut k) in self.keys.drain() {
            k.0.zeroize();
        }
    }
}
