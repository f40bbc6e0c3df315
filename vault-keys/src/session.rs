//! The `Session` state machine: `Locked -> Unlocking -> Unlocked -> Locked`,
//! with `Unlocked -> Expired -> Locked` on idle timeout. spec.md §4.3, §4.9.

use chrono::{DateTime, Utc};
use zeroize::Zeroize;

use crate::error::KeysError;
use crate::persisted::{kdf_params_to_fields, PersistedUser};
use crate::types::{purpose, MasterKey, ProtectionKey, ProtectionKeyCache, UserKey};
use vault_crypto::{self as crypto, CipherEnvelope, KdfParams, Scheme};

/// Bounds on `session_timeout_minutes` from spec.md §6.
pub const MIN_SESSION_TIMEOUT_MINUTES: u32 = 1;
pub const MAX_SESSION_TIMEOUT_MINUTES: u32 = 1440;
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Locked,
    Unlocking,
    Unlocked,
    Expired,
}

impl SessionStatus {
    fn name(self) -> &'static str {
        match self {
            Self::Locked => "Locked",
            Self::Unlocking => "Unlocking",
            Self::Unlocked => "Unlocked",
            Self::Expired => "Expired",
        }
    }
}

/// Result of `rotate_user_key`: the caller (vault-engine) uses the old and
/// new raw key bytes to re-wrap whatever per-record keys exist; this crate
/// has no notion of records, so it hands both keys back and zeroizes its
/// own copy of the old one.
pub struct RotatedUserKey {
    pub old_user_key: Vec<u8>,
    pub new_user_key: Vec<u8>,
}

impl Drop for RotatedUserKey {
    fn drop(&mut self) {
        self.old_user_key.zeroize();
        self.new_user_key.zeroize();
    }
}

/// Owns the live master key, user key, and per-purpose protection keys for
/// as long as the vault is unlocked. spec.md §3 ("Ownership"), §4.9.
pub struct Session {
    status: SessionStatus,
    master_key: Option<MasterKey>,
    user_key: Option<UserKey>,
    protection_keys: ProtectionKeyCache,
    last_activity: DateTime<Utc>,
}

impl Session {
    fn locked() -> Self {
        Self {
            status: SessionStatus::Locked,
            master_key: None,
            user_key: None,
            protection_keys: ProtectionKeyCache::default(),
            last_activity: Utc::now(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_unlocked(&self) -> bool {
        self.status == SessionStatus::Unlocked
    }

    /// Creates a brand-new account: generates salt, derives the master key,
    /// computes the independent auth hash, generates a random user key, and
    /// wraps it under the master key. spec.md §4.3.
    pub fn create_account(
        email: &str,
        passphrase: &str,
        kdf_params: KdfParams,
    ) -> Result<(PersistedUser, Session), KeysError> {
        let salt = crypto::random_salt();
        let master_bytes = crypto::derive_key(passphrase, &salt, kdf_params)?;
        let auth_hash = crypto::hash_passphrase(passphrase, &salt);

        let user_key_bytes = crypto::random_key().to_vec();
        let wrapped_user_key = wrap_user_key(&user_key_bytes, &master_bytes[..])?;

        let (kdf_type, kdf_iterations, kdf_memory, kdf_parallelism) = kdf_params_to_fields(kdf_params);
        let now = Utc::now();
        let persisted = PersistedUser {
            id: uuid_v4_like(),
            email: email.to_string(),
            name: None,
            kdf_type,
            kdf_iterations,
            kdf_memory,
            kdf_parallelism,
            kdf_salt: encode_b64(&salt),
            auth_hash,
            wrapped_user_key,
            created_at: now,
            updated_at: now,
        };

        let session = Session {
            status: SessionStatus::Unlocked,
            master_key: Some(MasterKey(*master_bytes)),
            user_key: Some(UserKey(user_key_bytes)),
            protection_keys: ProtectionKeyCache::default(),
            last_activity: now,
        };

        tracing::info!(user_id = %persisted.id, "account created");
        Ok((persisted, session))
    }

    /// Re-derives the master key from `passphrase` and the persisted KDF
    /// parameters, verifies the auth hash in constant time, and unwraps the
    /// user key. Any failure — hash mismatch or unwrap failure — surfaces
    /// as the single `WrongPassphrase` variant; the master key bytes are
    /// zeroized before returning on any failure path. spec.md §4.3, §8.
    pub fn unlock(passphrase: &str, user: &PersistedUser) -> Result<Session, KeysError> {
        let mut session = Session::locked();
        session.status = SessionStatus::Unlocking;

        let kdf_params = user.kdf_params().map_err(|_| KeysError::WrongPassphrase)?;
        let salt = user.salt_bytes().map_err(|_| KeysError::WrongPassphrase)?;

        let mut master_bytes = crypto::derive_key(passphrase, &salt, kdf_params)
            .map_err(|_| KeysError::WrongPassphrase)?;

        let candidate_hash = crypto::hash_passphrase(passphrase, &salt);
        let hash_ok = crypto::ct_eq(candidate_hash.as_bytes(), user.auth_hash.as_bytes());

        // Always attempt the unwrap, even when the hash already failed, so
        // that "hash mismatch" and "unwrap mismatch" take the same code path
        // and cost the same time — neither is observably distinguishable
        // from the other (spec.md §8).
        let unwrap_result = unwrap_user_key(&user.wrapped_user_key, &master_bytes[..]);

        let user_key_bytes = match (hash_ok, unwrap_result) {
            (true, Some(bytes)) => bytes,
            (_, _) => {
                master_bytes.zeroize();
                session.status = SessionStatus::Locked;
                tracing::warn!(user_id = %user.id, "unlock rejected");
                return Err(KeysError::WrongPassphrase);
            }
        };

        session.master_key = Some(MasterKey(*master_bytes));
        session.user_key = Some(UserKey(user_key_bytes));
        session.status = SessionStatus::Unlocked;
        session.last_activity = Utc::now();
        tracing::info!(user_id = %user.id, "session unlocked");
        Ok(session)
    }

    /// Zeroizes all live key material and returns the session to `Locked`.
    /// Safe to call from `Unlocked` or `Expired`; a no-op from `Locked`.
    pub fn lock(&mut self) {
        if self.status == SessionStatus::Locked {
            return;
        }
        if let Some(mut mk) = self.master_key.take() {
            mk.0.zeroize();
        }
        if let Some(mut uk) = self.user_key.take() {
            uk.0.zeroize();
        }
        self.protection_keys.clear();
        self.status = SessionStatus::Locked;
        tracing::debug!("session locked, key material zeroized");
    }

    /// Records activity, pushing back the idle deadline.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Checks whether the session has been idle longer than
    /// `timeout_minutes` and, if so, transitions `Unlocked -> Expired ->
    /// Locked` and zeroizes key material. Returns `true` if the session is
    /// (now) locked as a result of this call.
    pub fn check_idle(&mut self, timeout_minutes: u32) -> bool {
        if self.status != SessionStatus::Unlocked {
            return self.status == SessionStatus::Locked;
        }
        let timeout_minutes = timeout_minutes.clamp(MIN_SESSION_TIMEOUT_MINUTES, MAX_SESSION_TIMEOUT_MINUTES);
        let elapsed = Utc::now().signed_duration_since(self.last_activity);
        if elapsed.num_minutes() >= i64::from(timeout_minutes) {
            self.status = SessionStatus::Expired;
            self.lock();
            true
        } else {
            false
        }
    }

    /// Borrows the live user key. Returns `VaultLocked` if not unlocked.
    pub fn user_key(&mut self) -> Result<&[u8], KeysError> {
        self.touch();
        self.user_key.as_ref().map(|k| k.as_bytes()).ok_or(KeysError::VaultLocked)
    }

    /// Derives (or returns the cached) protection key for `purpose`.
    pub fn protection_key(&mut self, purpose: &str) -> Result<ProtectionKey, KeysError> {
        self.touch();
        let master = self.master_key.as_ref().ok_or(KeysError::VaultLocked)?;
        Ok(self.protection_keys.get_or_derive(master, purpose))
    }

    /// Re-derives the master key under a fresh salt from `new_passphrase`
    /// and rewraps the (unchanged) user key under it. The session must
    /// already be unlocked; `old_passphrase` is verified against `user`
    /// exactly as in `unlock` before anything is changed.
    pub fn rotate_passphrase(
        &mut self,
        old_passphrase: &str,
        new_passphrase: &str,
        user: &PersistedUser,
        new_kdf_params: KdfParams,
    ) -> Result<PersistedUser, KeysError> {
        if !self.is_unlocked() {
            return Err(KeysError::InvalidSessionState { from: self.status.name(), attempted: "rotate_passphrase" });
        }
        // Verify the caller actually knows the current passphrase before
        // accepting a new one.
        let _verified = Session::unlock(old_passphrase, user)?;

        let new_salt = crypto::random_salt();
        let new_master = crypto::derive_key(new_passphrase, &new_salt, new_kdf_params)?;
        let new_auth_hash = crypto::hash_passphrase(new_passphrase, &new_salt);

        let user_key_bytes = self.user_key.as_ref().ok_or(KeysError::VaultLocked)?.as_bytes().to_vec();
        let rewrapped = wrap_user_key(&user_key_bytes, &new_master[..])?;

        let (kdf_type, kdf_iterations, kdf_memory, kdf_parallelism) = kdf_params_to_fields(new_kdf_params);

        let mut updated = user.clone();
        updated.kdf_type = kdf_type;
        updated.kdf_iterations = kdf_iterations;
        updated.kdf_memory = kdf_memory;
        updated.kdf_parallelism = kdf_parallelism;
        updated.kdf_salt = encode_b64(&new_salt);
        updated.auth_hash = new_auth_hash;
        updated.wrapped_user_key = rewrapped;
        updated.updated_at = Utc::now();

        if let Some(mk) = self.master_key.as_mut() {
            mk.0.zeroize();
            mk.0 = *new_master;
        }
        self.protection_keys.clear();

        Ok(updated)
    }

    /// Generates a new random user key and swaps it in as the session's
    /// live user key. Returns both old and new raw bytes so the caller can
    /// re-wrap any per-record keys; `vault-keys` itself tracks no records.
    pub fn rotate_user_key(&mut self) -> Result<RotatedUserKey, KeysError> {
        if !self.is_unlocked() {
            return Err(KeysError::InvalidSessionState { from: self.status.name(), attempted: "rotate_user_key" });
        }
        let old_user_key = self.user_key.as_ref().ok_or(KeysError::VaultLocked)?.as_bytes().to_vec();
        let new_user_key = crypto::random_key().to_vec();
        self.user_key = Some(UserKey(new_user_key.clone()));
        Ok(RotatedUserKey { old_user_key, new_user_key })
    }
}

fn encode_b64(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD.encode(bytes)
}

/// Wraps raw user-key bytes as a `CipherEnvelope` under the master key: the
/// "plaintext" the envelope carries is the hex encoding of the key bytes,
/// since `vault_crypto::encrypt` operates on UTF-8 strings.
fn wrap_user_key(user_key_bytes: &[u8], master_key: &[u8]) -> Result<CipherEnvelope, KeysError> {
    let hex_key = hex::encode(user_key_bytes);
    Ok(crypto::encrypt(&hex_key, master_key, Scheme::AesGcm256)?)
}

fn unwrap_user_key(wrapped: &CipherEnvelope, master_key: &[u8]) -> Option<Vec<u8>> {
    let hex_key = crypto::decrypt(wrapped, master_key).ok()?;
    hex::decode(hex_key).ok()
}

/// A UUIDv4-shaped identifier without pulling in the `uuid` crate's RNG
/// feature set for a single call site; bytes come from the same CSPRNG
/// path as every other random value in this crate.
fn uuid_v4_like() -> String {
    let mut bytes = crypto::random(16);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let hex = hex::encode(&bytes);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[cfg(test)]
mod purpose_smoke {
    use super::*;

    #[test]
    fn create_and_unlock_roundtrip() {
        let (persisted, mut session) =
            Session::create_account("alice@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
                .unwrap();
        assert!(session.is_unlocked());
        let key_copy = session.user_key().unwrap().to_vec();
        session.lock();
        assert_eq!(session.status(), SessionStatus::Locked);

        let mut unlocked = Session::unlock("Corr3ct!HorseBattery#2024", &persisted).unwrap();
        assert_eq!(unlocked.user_key().unwrap(), key_copy.as_slice());
    }

    #[test]
    fn wrong_passphrase_is_rejected() {
        let (persisted, _session) =
            Session::create_account("bob@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
                .unwrap();
        let err = Session::unlock("wrong", &persisted).unwrap_err();
        assert_eq!(err, KeysError::WrongPassphrase);
    }

    #[test]
    fn idle_timeout_expires_and_locks() {
        let (_persisted, mut session) =
            Session::create_account("heidi@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
                .unwrap();
        // Backdate activity well past any valid timeout bound.
        session.last_activity = Utc::now() - chrono::Duration::minutes(MAX_SESSION_TIMEOUT_MINUTES as i64 + 1);
        assert!(session.check_idle(DEFAULT_SESSION_TIMEOUT_MINUTES));
        assert_eq!(session.status(), SessionStatus::Locked);
    }

    #[test]
    fn distinct_purposes_are_cached_independently() {
        let (_persisted, mut session) =
            Session::create_account("carol@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
                .unwrap();
        let a = session.protection_key(purpose::CIPHER_DATA).unwrap();
        let b = session.protection_key(purpose::CIPHER_KEYS).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
        let a_again = session.protection_key(purpose::CIPHER_DATA).unwrap();
        assert_eq!(a.as_bytes(), a_again.as_bytes());
    }
}
