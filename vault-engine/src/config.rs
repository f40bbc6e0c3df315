//! Runtime configuration. spec.md §6 ("Configuration keys").
//!
//! Mirrors the `CITADEL_*` environment-variable pattern in the teacher's
//! `citadel-api/src/main.rs`: every key has a documented default and can be
//! overridden by an env var of the same shouting-case name prefixed `KB_`.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Idle lock timeout, minutes. Bounds: [1, 1440]. Default 60.
    pub session_timeout_minutes: u32,
    /// How long a copied secret stays on the clipboard before the UI clears
    /// it. The engine only carries the value; clearing itself is UI-owned.
    pub clear_clipboard_seconds: u32,
    pub lock_on_idle: bool,
    /// Cache entry TTL, milliseconds. Default 300_000 (5 minutes).
    pub cache_max_age_ms: u64,
    pub cache_max_entries: usize,
    /// Delay between background sync sweeps, milliseconds. Default 5000.
    pub sync_interval_ms: u64,
    pub sync_batch_size: usize,
    pub sync_max_retries: u32,
    pub decrypt_batch_size: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: 60,
            clear_clipboard_seconds: 30,
            lock_on_idle: true,
            cache_max_age_ms: 300_000,
            cache_max_entries: 1000,
            sync_interval_ms: 5000,
            sync_batch_size: 10,
            sync_max_retries: 3,
            decrypt_batch_size: 10,
        }
    }
}

impl VaultConfig {
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_millis(self.cache_max_age_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Builds a config from defaults overridden by `KB_*` environment
    /// variables, logging which keys were overridden.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_u32("KB_SESSION_TIMEOUT_MINUTES") {
            cfg.session_timeout_minutes = v.clamp(1, 1440);
        }
        if let Some(v) = env_u32("KB_CLEAR_CLIPBOARD_SECONDS") {
            cfg.clear_clipboard_seconds = v;
        }
        if let Some(v) = env_bool("KB_LOCK_ON_IDLE") {
            cfg.lock_on_idle = v;
        }
        if let Some(v) = env_u64("KB_CACHE_MAX_AGE_MS") {
            cfg.cache_max_age_ms = v;
        }
        if let Some(v) = env_usize("KB_CACHE_MAX_ENTRIES") {
            cfg.cache_max_entries = v;
        }
        if let Some(v) = env_u64("KB_SYNC_INTERVAL_MS") {
            cfg.sync_interval_ms = v;
        }
        if let Some(v) = env_usize("KB_SYNC_BATCH_SIZE") {
            cfg.sync_batch_size = v;
        }
        if let Some(v) = env_u32("KB_SYNC_MAX_RETRIES") {
            cfg.sync_max_retries = v;
        }
        if let Some(v) = env_usize("KB_DECRYPT_BATCH_SIZE") {
            cfg.decrypt_batch_size = v;
        }

        tracing::debug!(?cfg, "resolved vault configuration");
        cfg
    }
}

fn env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|v| match v.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    })
}
