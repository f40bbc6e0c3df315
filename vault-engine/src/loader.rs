//! Progressive loader (C8): local optimistic store -> encrypted cache ->
//! remote fallback, decrypting in cooperative batches. spec.md §4.8.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cache::{fingerprint, ResponseCache};
use crate::codec;
use crate::error::{BatchReport, EngineError};
use crate::model::{CredentialRecord, EncryptedCipher};
use crate::remote::RemoteApi;
use crate::store::OptimisticStore;

pub struct LoadResult {
    pub entries: Vec<CredentialRecord>,
    pub from_cache: bool,
    pub total: usize,
    pub has_more: bool,
    pub report: BatchReport,
}

/// Tracks which `userId`s have a background refresh in flight so concurrent
/// callers coalesce onto the same refresh. spec.md §4.8, §5.
#[derive(Default)]
pub struct RefreshCoordinator {
    in_flight: Mutex<HashSet<String>>,
}

impl RefreshCoordinator {
    /// Returns `true` if this call won the race to start a refresh for
    /// `user_id`; the loser should not start a second one.
    async fn try_start(&self, user_id: &str) -> bool {
        self.in_flight.lock().await.insert(user_id.to_string())
    }

    async fn finish(&self, user_id: &str) {
        self.in_flight.lock().await.remove(user_id);
    }
}

pub struct ProgressiveLoader<'a> {
    store: &'a OptimisticStore<'a>,
    cache: Arc<ResponseCache>,
    remote: Arc<dyn RemoteApi>,
    refresh: Arc<RefreshCoordinator>,
    decrypt_batch_size: usize,
}

impl<'a> ProgressiveLoader<'a> {
    pub fn new(
        store: &'a OptimisticStore<'a>,
        cache: Arc<ResponseCache>,
        remote: Arc<dyn RemoteApi>,
        decrypt_batch_size: usize,
    ) -> Self {
        Self { store, cache, remote, refresh: Arc::new(RefreshCoordinator::default()), decrypt_batch_size }
    }

    /// spec.md §4.8, steps 1-4. `is_locked` is polled before the initial
    /// fetch and between every decrypt batch so a concurrent `lock()`
    /// aborts the load with `VaultLocked` at the next suspension point
    /// (spec.md §5). Entries already decrypted before that point are
    /// discarded along with the rest of the call, matching "aborts ... with
    /// VaultLocked" rather than returning a partial success.
    pub async fn load(
        &self,
        user_id: &str,
        user_key_if_unlocked: Option<&[u8]>,
        is_locked: &(dyn Fn() -> bool + Sync),
    ) -> Result<LoadResult, EngineError> {
        let Some(user_key) = user_key_if_unlocked else {
            return Ok(LoadResult { entries: vec![], from_cache: false, total: 0, has_more: false, report: BatchReport::default() });
        };
        if is_locked() {
            return Err(EngineError::VaultLocked);
        }

        if !self.store.is_empty_for_user(user_id).await {
            let (records, report) = self.store.list(user_id, user_key).await;
            self.spawn_background_refresh(user_id.to_string());
            let total = records.len();
            return Ok(LoadResult { entries: records, from_cache: false, total, has_more: false, report });
        }

        let key = fingerprint("passwords/load", user_id, &serde_json::json!({}));
        if let Some(cached) = self.cache.get(&key, user_id).await {
            self.spawn_background_refresh(user_id.to_string());
            return self.decrypt_progressively(cached, user_key, true, is_locked).await;
        }

        let ciphers = self.remote.load(user_id).await?;
        let data = serde_json::to_value(&ciphers).unwrap_or(serde_json::Value::Null);
        self.cache.put(&key, data.clone(), user_id).await;
        self.decrypt_progressively(data, user_key, false, is_locked).await
    }

    /// Invalidates the cached entry for `user_id` and re-runs the remote
    /// fallback path. spec.md §4.8, step 5.
    pub async fn force_refresh(
        &self,
        user_id: &str,
        user_key: &[u8],
        is_locked: &(dyn Fn() -> bool + Sync),
    ) -> Result<LoadResult, EngineError> {
        let key = fingerprint("passwords/load", user_id, &serde_json::json!({}));
        self.cache.invalidate(&key).await;
        let ciphers = self.remote.load(user_id).await?;
        let data = serde_json::to_value(&ciphers).unwrap_or(serde_json::Value::Null);
        self.cache.put(&key, data.clone(), user_id).await;
        self.decrypt_progressively(data, user_key, false, is_locked).await
    }

    async fn decrypt_progressively(
        &self,
        cached_value: serde_json::Value,
        user_key: &[u8],
        from_cache: bool,
        is_locked: &(dyn Fn() -> bool + Sync),
    ) -> Result<LoadResult, EngineError> {
        let ciphers: Vec<EncryptedCipher> = serde_json::from_value(cached_value).unwrap_or_default();
        let total = ciphers.len();
        let mut entries = Vec::with_capacity(total);
        let mut report = BatchReport::default();

        for batch in ciphers.chunks(self.decrypt_batch_size.max(1)) {
            if is_locked() {
                return Err(EngineError::VaultLocked);
            }
            let (decoded, batch_report) = codec::decrypt_many(batch, user_key);
            entries.extend(decoded);
            report.failures.extend(batch_report.failures);
            // Cooperative yield between batches, per spec.md §5.
            tokio::task::yield_now().await;
        }

        Ok(LoadResult { entries, from_cache, total, has_more: false, report })
    }

    /// Fires a single-flight background refresh for `user_id`. Errors are
    /// logged, not propagated — this runs detached from the caller.
    fn spawn_background_refresh(&self, user_id: String) {
        let remote = self.remote.clone();
        let cache = self.cache.clone();
        let refresh = self.refresh.clone();
        tokio::spawn(async move {
            if !refresh.try_start(&user_id).await {
                return;
            }
            let key = fingerprint("passwords/load", &user_id, &serde_json::json!({}));
            match remote.load(&user_id).await {
                Ok(ciphers) => {
                    let count = ciphers.len();
                    let data = serde_json::to_value(&ciphers).unwrap_or(serde_json::Value::Null);
                    cache.put(&key, data, &user_id).await;
                    if count > 0 {
                        tracing::info!(user_id = %user_id, count, "passwords_refreshed");
                    }
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "background refresh failed");
                }
            }
            refresh.finish(&user_id).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CredentialRecord;
    use crate::queue::PendingOpsQueue;
    use crate::remote::MockRemoteApi;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;
    use vault_crypto::KdfParams;
    use vault_keys::Session;

    fn record(title: &str) -> CredentialRecord {
        CredentialRecord {
            id: Uuid::new_v4(),
            folder_id: None,
            title: title.to_string(),
            username: "alice".to_string(),
            password: "S3cret!".to_string(),
            website: "https://example.com".to_string(),
            notes: String::new(),
            custom_fields: vec![],
            tags: vec![],
            favorite: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn load_falls_back_to_remote_and_populates_the_cache() {
        let (_user, mut session) =
            Session::create_account("loader@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
                .unwrap();
        let user_key = session.user_key().unwrap().to_vec();

        let remote = Arc::new(MockRemoteApi::default());
        let cipher = codec::encrypt_record(&record("Gmail"), "user-1", &user_key).unwrap();
        remote.save("user-1", &cipher, false).await.unwrap();

        let queue = PendingOpsQueue::new(3);
        let store = OptimisticStore::new(&queue);
        let cache = Arc::new(ResponseCache::new(std::time::Duration::from_secs(300), 100));
        let loader = ProgressiveLoader::new(&store, cache.clone(), remote, 10);

        let result = loader.load("user-1", Some(&user_key), &|| false).await.unwrap();
        assert_eq!(result.entries.len(), 1);
        assert!(!result.from_cache);

        let key = fingerprint("passwords/load", "user-1", &serde_json::json!({}));
        assert!(cache.get(&key, "user-1").await.is_some());
    }

    #[tokio::test]
    async fn locked_session_yields_empty_result_without_touching_remote_or_cache() {
        let remote = Arc::new(MockRemoteApi::default());
        let queue = PendingOpsQueue::new(3);
        let store = OptimisticStore::new(&queue);
        let cache = Arc::new(ResponseCache::new(std::time::Duration::from_secs(300), 100));
        let loader = ProgressiveLoader::new(&store, cache, remote, 10);

        let result = loader.load("user-1", None, &|| false).await.unwrap();
        assert!(result.entries.is_empty());
        assert!(!result.from_cache);
    }

    #[tokio::test]
    async fn lock_during_in_flight_decrypt_batch_aborts_with_vault_locked() {
        let (_user, mut session) = Session::create_account(
            "loader-lock@example.com",
            "Corr3ct!HorseBattery#2024",
            KdfParams::default_pbkdf2(),
        )
        .unwrap();
        let user_key = session.user_key().unwrap().to_vec();

        let remote = Arc::new(MockRemoteApi::default());
        for i in 0..25 {
            let cipher = codec::encrypt_record(&record(&format!("Entry {i}")), "user-1", &user_key).unwrap();
            remote.save("user-1", &cipher, false).await.unwrap();
        }

        let queue = PendingOpsQueue::new(3);
        let store = OptimisticStore::new(&queue);
        let cache = Arc::new(ResponseCache::new(std::time::Duration::from_secs(300), 100));
        // decrypt_batch_size=10 over 25 ciphers makes 3 batches; flip "locked"
        // after the first batch so the second one observes it at the next
        // suspension point, per spec.md §5.
        let loader = ProgressiveLoader::new(&store, cache, remote, 10);

        // First call is `load`'s own entry check, second is the first batch's
        // suspension point; only the third (second batch) reports locked.
        let calls = AtomicUsize::new(0);
        let is_locked = move || calls.fetch_add(1, Ordering::SeqCst) >= 2;

        let result = loader.load("user-1", Some(&user_key), &is_locked).await;
        assert!(matches!(result, Err(EngineError::VaultLocked)));
    }
}
