//! Encrypted response cache (C5): TTL, integrity hash, per-user isolation.
//! spec.md §4.5.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::model::{CacheEntry, CacheMetadata};

/// Deterministic identifier for a cacheable request. spec.md §4.5.
pub fn fingerprint(endpoint: &str, user_id: &str, params: &serde_json::Value) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    let params_json = serde_json::to_string(params).unwrap_or_default();
    format!("{endpoint}:{user_id}:{}", STANDARD.encode(params_json))
}

fn hash_of(data: &serde_json::Value) -> String {
    let canonical = serde_json::to_string(data).unwrap_or_default();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// The cache NEVER holds plaintext; everything stored here is exactly what
/// the remote returned. spec.md §4.5.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
    evictions: std::sync::atomic::AtomicU64,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
            evictions: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Writes `data`, then evicts anything older than the TTL. The write
    /// itself is last-writer-wins and atomic: readers never observe a
    /// partially-formed entry. spec.md §4.5, §5.
    pub async fn put(&self, key: &str, data: serde_json::Value, user_id: &str) {
        let hash = hash_of(&data);
        let entry = CacheEntry {
            data,
            metadata: CacheMetadata { timestamp: Utc::now(), version: 1, user_id: user_id.to_string(), hash },
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
        self.evict_stale_locked(&mut entries);
    }

    /// Miss + evict on absence, user-id mismatch, staleness, or a tampered
    /// hash. spec.md §4.5.
    pub async fn get(&self, key: &str, user_id: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get(key) else {
            self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return None;
        };

        let age = Utc::now().signed_duration_since(entry.metadata.timestamp);
        let stale = age.to_std().map(|d| d > self.ttl).unwrap_or(true);
        let wrong_user = entry.metadata.user_id != user_id;
        let tampered = hash_of(&entry.data) != entry.metadata.hash;

        if stale || wrong_user || tampered {
            entries.remove(key);
            self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.evictions.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return None;
        }

        self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Some(entry.data.clone())
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    pub async fn invalidate_user(&self, user_id: &str) {
        self.entries.write().await.retain(|_, v| v.metadata.user_id != user_id);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
            evictions: self.evictions.load(std::sync::atomic::Ordering::Relaxed),
            entries: entries.len(),
        }
    }

    fn evict_stale_locked(&self, entries: &mut HashMap<String, CacheEntry>) {
        let ttl = self.ttl;
        let before = entries.len();
        entries.retain(|_, v| {
            Utc::now()
                .signed_duration_since(v.metadata.timestamp)
                .to_std()
                .map(|d| d <= ttl)
                .unwrap_or(false)
        });
        let evicted = before.saturating_sub(entries.len());
        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, std::sync::atomic::Ordering::Relaxed);
        }
        if entries.len() > self.max_entries {
            let overflow = entries.len() - self.max_entries;
            let mut by_age: Vec<(String, chrono::DateTime<Utc>)> =
                entries.iter().map(|(k, v)| (k.clone(), v.metadata.timestamp)).collect();
            by_age.sort_by_key(|(_, ts)| *ts);
            for (k, _) in by_age.into_iter().take(overflow) {
                entries.remove(&k);
                self.evictions.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// spec.md §8 scenario 5: mutate one byte of the stored body directly
    /// (bypassing `put`, which would just recompute a matching hash) and
    /// confirm the next `get` reports a miss and evicts the entry.
    #[tokio::test]
    async fn tampered_stored_byte_is_detected_and_evicted() {
        let cache = ResponseCache::new(Duration::from_secs(300), 100);
        let key = fingerprint("passwords/load", "user-1", &serde_json::json!({}));
        cache.put(&key, serde_json::json!({"ciphers": [1, 2, 3]}), "user-1").await;
        assert!(cache.get(&key, "user-1").await.is_some());

        {
            let mut entries = cache.entries.write().await;
            let entry = entries.get_mut(&key).unwrap();
            entry.data = serde_json::json!({"ciphers": [1, 2, 9]});
        }

        assert!(cache.get(&key, "user-1").await.is_none());
        assert!(cache.entries.read().await.get(&key).is_none());
    }

    #[tokio::test]
    async fn wrong_user_id_is_a_miss_and_evicts() {
        let cache = ResponseCache::new(Duration::from_secs(300), 100);
        let key = fingerprint("passwords/load", "user-1", &serde_json::json!({}));
        cache.put(&key, serde_json::json!({"ciphers": []}), "user-1").await;
        assert!(cache.get(&key, "someone-else").await.is_none());
        assert!(cache.get(&key, "user-1").await.is_none());
    }
}
