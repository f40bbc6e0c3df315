//! Vault codec, offline cache, pending-ops queue, optimistic store,
//! progressive loader, remote client, and backup format for kb-vault.
//!
//! Built on top of `vault-crypto` (primitives) and `vault-keys` (session
//! lifecycle); this crate has no notion of passphrases, only of an already
//! unlocked user key borrowed for the duration of one operation.

pub mod backup;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod queue;
pub mod remote;
pub mod store;
pub mod sync;

pub use config::VaultConfig;
pub use error::{BatchReport, CorruptRecord, EngineError};
pub use sync::SweepReport;
