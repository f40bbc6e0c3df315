//! Pending operations queue (C6): durable retry/backoff state machine for
//! create/update/delete mutations awaiting remote replication. spec.md §4.6.

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::{OperationKind, OperationStatus, PendingOperation};

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueStatus {
    pub pending_count: usize,
    pub failed_count: usize,
    pub last_attempt_ts: Option<chrono::DateTime<Utc>>,
}

/// In-process durable queue. Durability against process restart is the
/// caller's responsibility (persist `rows` via whatever storage backend is
/// wired in — see `vault-engine::store` for the paired optimistic store,
/// which commits alongside this queue transactionally).
pub struct PendingOpsQueue {
    rows: Mutex<Vec<PendingOperation>>,
    max_retries: u32,
}

impl PendingOpsQueue {
    pub fn new(max_retries: u32) -> Self {
        Self { rows: Mutex::new(Vec::new()), max_retries }
    }

    /// Idempotent over `(kind, recordId, localTimestamp)`: re-enqueueing the
    /// same logical mutation at the same local timestamp is a no-op.
    /// spec.md §4.6.
    pub async fn enqueue(
        &self,
        kind: OperationKind,
        record: crate::model::EncryptedCipher,
        user_id: &str,
        local_timestamp: chrono::DateTime<Utc>,
    ) -> Uuid {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = rows
            .iter()
            .find(|r| r.kind == kind && r.record_id == record.id && r.enqueued_at == local_timestamp)
        {
            return existing.id;
        }
        let op = PendingOperation {
            id: Uuid::new_v4(),
            kind,
            record_id: record.id,
            user_id: user_id.to_string(),
            enqueued_at: local_timestamp,
            retry_count: 0,
            max_retries: self.max_retries,
            status: OperationStatus::Pending,
            last_attempt_at: None,
            record,
        };
        let id = op.id;
        tracing::debug!(op_id = %id, ?kind, record_id = %op.record_id, "enqueued pending operation");
        rows.push(op);
        id
    }

    /// Returns up to `batch_size` pending rows for `user_id`, in enqueue
    /// order, and atomically marks them `syncing`. Concurrent drains never
    /// pick the same row because the status transition happens under the
    /// same lock that reads it. spec.md §4.6, §5.
    pub async fn drain(&self, user_id: &str, batch_size: usize) -> Vec<PendingOperation> {
        let mut rows = self.rows.lock().await;
        let mut picked = Vec::with_capacity(batch_size);
        for row in rows.iter_mut() {
            if picked.len() >= batch_size {
                break;
            }
            if row.user_id == user_id && row.status == OperationStatus::Pending {
                row.status = OperationStatus::Syncing;
                row.last_attempt_at = Some(Utc::now());
                picked.push(row.clone());
            }
        }
        picked
    }

    /// Successful replication: the row is removed entirely.
    pub async fn complete(&self, op_id: Uuid) {
        let mut rows = self.rows.lock().await;
        rows.retain(|r| r.id != op_id);
    }

    /// Replication failed. A 4xx client error fails immediately without
    /// consuming a retry; anything else increments `retryCount` and, once
    /// exhausted, transitions to `failed`. spec.md §4.6.
    pub async fn fail(&self, op_id: Uuid, is_client_error: bool) {
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.iter_mut().find(|r| r.id == op_id) {
            if is_client_error {
                row.status = OperationStatus::Failed;
                return;
            }
            row.retry_count += 1;
            if row.retry_count >= row.max_retries {
                row.status = OperationStatus::Failed;
            } else {
                row.status = OperationStatus::Pending;
            }
        }
    }

    pub async fn status(&self, user_id: &str) -> QueueStatus {
        let rows = self.rows.lock().await;
        let mut out = QueueStatus::default();
        for row in rows.iter().filter(|r| r.user_id == user_id) {
            match row.status {
                OperationStatus::Pending | OperationStatus::Syncing => out.pending_count += 1,
                OperationStatus::Failed => out.failed_count += 1,
                OperationStatus::Synced => {}
            }
            out.last_attempt_ts = match (out.last_attempt_ts, row.last_attempt_at) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, None) => a,
                (None, b) => b,
            };
        }
        out
    }

    /// A sweep that was cancelled partway through leaves rows `syncing`;
    /// the next sweep must treat them the same as `pending` so they get
    /// redrained. spec.md §5 ("Cancellation semantics"). Server-side create
    /// is idempotent by `(userId, id)`, so redraining a row already applied
    /// remotely is safe.
    pub async fn requeue_stuck_syncing(&self, user_id: &str) {
        let mut rows = self.rows.lock().await;
        for row in rows.iter_mut() {
            if row.user_id == user_id && row.status == OperationStatus::Syncing {
                row.status = OperationStatus::Pending;
            }
        }
    }
}
