//! Optimistic store (C7): local record store with ciphertext at rest,
//! transactionally paired with the pending-ops queue. spec.md §4.7.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::codec;
use crate::error::{BatchReport, EngineError};
use crate::model::{CredentialRecord, LocalRecord, OperationKind, SyncStatus};
use crate::queue::PendingOpsQueue;

/// Rows are keyed by `(id, userId)`; the queue is a separate component the
/// store writes through to on every mutation. spec.md §4.7 ("Invariant: the
/// store NEVER persists plaintext").
pub struct OptimisticStore<'q> {
    rows: RwLock<HashMap<(Uuid, String), LocalRecord>>,
    queue: &'q PendingOpsQueue,
}

impl<'q> OptimisticStore<'q> {
    pub fn new(queue: &'q PendingOpsQueue) -> Self {
        Self { rows: RwLock::new(HashMap::new()), queue }
    }

    /// Encrypts `record`, writes it to the store as `pending`, and enqueues
    /// a matching create operation. Both writes happen before this function
    /// returns, modeling the "commit together" requirement of spec.md §5.
    pub async fn create(
        &self,
        record: &CredentialRecord,
        user_id: &str,
        user_key: &[u8],
    ) -> Result<(), EngineError> {
        self.write_through(record, user_id, user_key, OperationKind::Create).await
    }

    pub async fn update(
        &self,
        record: &CredentialRecord,
        user_id: &str,
        user_key: &[u8],
    ) -> Result<(), EngineError> {
        self.write_through(record, user_id, user_key, OperationKind::Update).await
    }

    async fn write_through(
        &self,
        record: &CredentialRecord,
        user_id: &str,
        user_key: &[u8],
        kind: OperationKind,
    ) -> Result<(), EngineError> {
        let cipher = codec::encrypt_record(record, user_id, user_key)?;
        let now = Utc::now();
        let local = LocalRecord { cipher: cipher.clone(), sync_status: SyncStatus::Pending, local_timestamp: now };

        self.rows.write().await.insert((record.id, user_id.to_string()), local);
        self.queue.enqueue(kind, cipher, user_id, now).await;
        Ok(())
    }

    /// Stamps the row `deleted` (a tombstone kept until the server delete is
    /// confirmed) and enqueues a delete operation. spec.md §4.7.
    pub async fn delete(&self, id: Uuid, user_id: &str) -> Result<(), EngineError> {
        let mut rows = self.rows.write().await;
        let key = (id, user_id.to_string());
        let Some(row) = rows.get_mut(&key) else {
            return Err(EngineError::NotFound);
        };
        row.sync_status = SyncStatus::Deleted;
        row.local_timestamp = Utc::now();
        let cipher = row.cipher.clone();
        let local_timestamp = row.local_timestamp;
        drop(rows);
        self.queue.enqueue(OperationKind::Delete, cipher, user_id, local_timestamp).await;
        Ok(())
    }

    /// Decrypts every non-deleted row for `user_id`; rows that fail to
    /// decrypt are skipped and counted in the returned `BatchReport`.
    /// spec.md §4.7.
    pub async fn list(&self, user_id: &str, user_key: &[u8]) -> (Vec<CredentialRecord>, BatchReport) {
        let rows = self.rows.read().await;
        let mut records = Vec::new();
        let mut report = BatchReport::default();
        for (_, row) in rows.iter().filter(|((_, uid), _)| uid == user_id) {
            if row.sync_status == SyncStatus::Deleted {
                continue;
            }
            match codec::decrypt_record(&row.cipher, user_key) {
                Ok(record) => records.push(record),
                Err(e) => report.push_failure(row.cipher.id.to_string(), e.to_string()),
            }
        }
        (records, report)
    }

    /// Re-wraps every row for `user_id` from `old_user_key` to
    /// `new_user_key` and enqueues an update for each so the rotation
    /// reaches the remote on the next sweep. spec.md §4.3
    /// ("re-wrapped per-record keys"); a row that fails to decrypt under
    /// `old_user_key` is left as-is and reported, never silently dropped.
    pub async fn rotate_user_key(
        &self,
        user_id: &str,
        old_user_key: &[u8],
        new_user_key: &[u8],
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut rows = self.rows.write().await;
        let mut updated = Vec::new();
        for ((id, uid), row) in rows.iter_mut() {
            if uid != user_id {
                continue;
            }
            match codec::rewrap_record(&row.cipher, old_user_key, new_user_key) {
                Ok(rewrapped) => {
                    row.cipher = rewrapped.clone();
                    row.sync_status = SyncStatus::Pending;
                    row.local_timestamp = Utc::now();
                    updated.push((*id, rewrapped, row.local_timestamp));
                }
                Err(e) => {
                    tracing::warn!(record_id = %id, error = %e, "record not re-wrapped during key rotation");
                    report.push_failure(id.to_string(), e.to_string());
                }
            }
        }
        drop(rows);
        for (_, cipher, local_timestamp) in updated {
            self.queue.enqueue(OperationKind::Update, cipher, user_id, local_timestamp).await;
        }
        report
    }

    pub async fn mark_synced(&self, id: Uuid, user_id: &str) {
        if let Some(row) = self.rows.write().await.get_mut(&(id, user_id.to_string())) {
            row.sync_status = SyncStatus::Synced;
        }
    }

    pub async fn is_empty_for_user(&self, user_id: &str) -> bool {
        !self.rows.read().await.keys().any(|(_, uid)| uid == user_id)
    }
}
