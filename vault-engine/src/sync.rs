//! Sync sweep (C6 orchestration): drains a batch of pending operations and
//! replicates them against the remote, classifying failures per spec.md
//! §4.6/§7. This is the piece that actually runs the queue's state machine
//! against a `RemoteApi`; `queue.rs` only owns the rows and their
//! transitions.

use crate::error::EngineError;
use crate::model::OperationKind;
use crate::queue::PendingOpsQueue;
use crate::remote::RemoteApi;
use crate::store::OptimisticStore;

/// Outcome of one sweep. `skipped_offline` means the sweep detected no
/// connectivity partway through and backed out every row it had started
/// draining, leaving the queue exactly as it found it. spec.md §4.6
/// ("offline detection short-circuits a sweep without mutating any row").
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepReport {
    pub synced: usize,
    pub failed: usize,
    pub skipped_offline: bool,
}

/// Drains up to `batch_size` pending operations for `user_id` and applies
/// each to `remote` in enqueue order, per spec.md §4.6/§5. A `Create`/
/// `Update` maps to `RemoteApi::save`; `Delete` maps to `RemoteApi::delete`.
///
/// On the first `NetworkUnavailable` this sweep encounters, every row it
/// drained (including the one that just failed) is requeued back to
/// `pending` via `requeue_stuck_syncing` and the sweep stops — no retry is
/// consumed and no row is left in a different state than before the sweep
/// started, since `RemoteApi` implementations have no separate "are we
/// online" probe to check before draining anything.
pub async fn sweep(
    queue: &PendingOpsQueue,
    store: &OptimisticStore<'_>,
    remote: &dyn RemoteApi,
    user_id: &str,
    batch_size: usize,
) -> SweepReport {
    let mut report = SweepReport::default();
    // A prior sweep cancelled mid-drain leaves rows `syncing`; treat them as
    // `pending` again before this sweep drains, per spec.md §5.
    queue.requeue_stuck_syncing(user_id).await;
    let ops = queue.drain(user_id, batch_size).await;
    if ops.is_empty() {
        return report;
    }

    for op in &ops {
        let outcome = match op.kind {
            OperationKind::Delete => remote.delete(user_id, &op.record_id.to_string()).await,
            OperationKind::Create => remote.save(user_id, &op.record, false).await.map(|_| ()),
            OperationKind::Update => remote.save(user_id, &op.record, true).await.map(|_| ()),
        };

        match outcome {
            Ok(()) => {
                queue.complete(op.id).await;
                store.mark_synced(op.record_id, user_id).await;
                report.synced += 1;
                tracing::info!(op_id = %op.id, record_id = %op.record_id, "synced pending operation");
            }
            Err(EngineError::NetworkUnavailable) => {
                queue.requeue_stuck_syncing(user_id).await;
                report.skipped_offline = true;
                tracing::debug!(user_id, "sweep stopped: offline");
                return report;
            }
            Err(EngineError::ClientError(code)) => {
                queue.fail(op.id, true).await;
                report.failed += 1;
                tracing::warn!(op_id = %op.id, code, "operation rejected by server, giving up");
            }
            Err(e) => {
                queue.fail(op.id, false).await;
                report.failed += 1;
                tracing::warn!(op_id = %op.id, error = %e, "sync attempt failed, will retry");
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::model::CredentialRecord;
    use crate::remote::MockRemoteApi;
    use chrono::Utc;
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
    async fn sweep_syncs_pending_ops_and_marks_them_synced() {
        let (_user, mut session) =
            Session::create_account("sweep@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
                .unwrap();
        let user_key = session.user_key().unwrap().to_vec();

        let queue = PendingOpsQueue::new(3);
        let store = OptimisticStore::new(&queue);
        let remote = MockRemoteApi::default();

        let r = record("Gmail");
        store.create(&r, "user-1", &user_key).await.unwrap();

        let report = sweep(&queue, &store, &remote, "user-1", 10).await;
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 0);
        assert!(!report.skipped_offline);

        let status = queue.status("user-1").await;
        assert_eq!(status.pending_count, 0);
        assert!(status.last_attempt_ts.is_some());
    }

    #[tokio::test]
    async fn sweep_stops_and_requeues_on_offline_without_consuming_a_retry() {
        let (_user, mut session) =
            Session::create_account("sweep-offline@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
                .unwrap();
        let user_key = session.user_key().unwrap().to_vec();

        let queue = PendingOpsQueue::new(3);
        let store = OptimisticStore::new(&queue);
        let remote = MockRemoteApi::default();
        remote.set_offline(true);

        let r = record("Offline Entry");
        store.create(&r, "user-1", &user_key).await.unwrap();

        let report = sweep(&queue, &store, &remote, "user-1", 10).await;
        assert!(report.skipped_offline);
        assert_eq!(report.synced, 0);

        let status = queue.status("user-1").await;
        assert_eq!(status.pending_count, 1);
        assert_eq!(status.failed_count, 0);

        remote.set_offline(false);
        let second = sweep(&queue, &store, &remote, "user-1", 10).await;
        assert_eq!(second.synced, 1);
    }

    #[tokio::test]
    async fn sweep_redrains_rows_orphaned_syncing_by_a_prior_cancelled_sweep() {
        let (_user, mut session) =
            Session::create_account("sweep-orphan@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
                .unwrap();
        let user_key = session.user_key().unwrap().to_vec();

        let queue = PendingOpsQueue::new(3);
        let store = OptimisticStore::new(&queue);
        let remote = MockRemoteApi::default();

        let r = record("Orphaned");
        store.create(&r, "user-1", &user_key).await.unwrap();

        // Simulate a sweep that drained this row and was then cancelled
        // before completing or failing it: the row is left `syncing`.
        let drained = queue.drain("user-1", 10).await;
        assert_eq!(drained.len(), 1);
        let status = queue.status("user-1").await;
        assert_eq!(status.pending_count, 1); // syncing counts as pending in status()
        assert_eq!(status.failed_count, 0);

        // A later sweep must treat the orphaned row as pending again and
        // redrain it, per spec.md §5.
        let report = sweep(&queue, &store, &remote, "user-1", 10).await;
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 0);

        let status = queue.status("user-1").await;
        assert_eq!(status.pending_count, 0);
    }

    #[tokio::test]
    async fn sweep_fails_fast_on_not_found_delete_treated_as_success() {
        let (_user, mut session) =
            Session::create_account("sweep-delete@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
                .unwrap();
        let user_key = session.user_key().unwrap().to_vec();

        let queue = PendingOpsQueue::new(3);
        let store = OptimisticStore::new(&queue);
        let remote = MockRemoteApi::default();

        let r = record("To Delete");
        let cipher = codec::encrypt_record(&r, "user-1", &user_key).unwrap();
        queue.enqueue(OperationKind::Delete, cipher, "user-1", Utc::now()).await;

        let report = sweep(&queue, &store, &remote, "user-1", 10).await;
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 0);
    }
}
