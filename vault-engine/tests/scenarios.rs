use chrono::Utc;
use uuid::Uuid;

use vault_engine::backup::{self, BackupType, EncryptionType};
use vault_engine::codec;
use vault_engine::model::CredentialRecord;
use vault_engine::queue::PendingOpsQueue;
use vault_engine::remote::{MockRemoteApi, RemoteApi};
use vault_engine::store::OptimisticStore;
use vault_keys::{KdfType, Session};
use vault_crypto::KdfParams;

fn gmail_record() -> CredentialRecord {
    CredentialRecord {
        id: "00000000-0000-4000-8000-000000000009".parse().unwrap(),
        folder_id: None,
        title: "Gmail".to_string(),
        username: "alice".to_string(),
        password: "S3cret!".to_string(),
        website: "https://mail.google.com".to_string(),
        notes: String::new(),
        custom_fields: vec![],
        tags: vec!["work".to_string()],
        favorite: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    }
}

#[test]
fn round_trip_record_through_vault_codec() {
    let (_user, mut session) =
        Session::create_account("alice@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
            .unwrap();
    let user_key = session.user_key().unwrap().to_vec();

    let record = gmail_record();
    let cipher = codec::encrypt_record(&record, "user-1", &user_key).unwrap();
    let decoded = codec::decrypt_record(&cipher, &user_key).unwrap();

    assert!(decoded.fields_equal(&record));
}

#[tokio::test]
async fn offline_write_then_sync_applies_in_enqueue_order() {
    let (_user, mut session) =
        Session::create_account("online@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
            .unwrap();
    let user_key = session.user_key().unwrap().to_vec();

    let queue = PendingOpsQueue::new(3);
    let store = OptimisticStore::new(&queue);
    let remote = MockRemoteApi::default();
    remote.set_offline(true);

    let mut records = Vec::new();
    for title in ["A", "B", "C"] {
        let mut r = gmail_record();
        r.id = Uuid::new_v4();
        r.title = title.to_string();
        store.create(&r, "user-1", &user_key).await.unwrap();
        records.push(r);
    }

    let (listed, report) = store.list("user-1", &user_key).await;
    assert_eq!(listed.len(), 3);
    assert!(report.failures.is_empty());

    remote.set_offline(false);
    let drained = queue.drain("user-1", 10).await;
    assert_eq!(drained.len(), 3);
    // Enqueue order must be preserved.
    assert_eq!(drained[0].record_id, records[0].id);
    assert_eq!(drained[1].record_id, records[1].id);
    assert_eq!(drained[2].record_id, records[2].id);

    for op in &drained {
        remote.save("user-1", &op.record, false).await.unwrap();
        queue.complete(op.id).await;
        store.mark_synced(op.record_id, "user-1").await;
    }

    let saved_order = remote.received_saves.lock().await.clone();
    assert_eq!(saved_order, vec![records[0].id, records[1].id, records[2].id]);
}

#[tokio::test]
async fn rotate_user_key_rewraps_stored_records_and_requeues_updates() {
    let (_user, mut session) =
        Session::create_account("rotate@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
            .unwrap();
    let old_user_key = session.user_key().unwrap().to_vec();

    let queue = PendingOpsQueue::new(3);
    let store = OptimisticStore::new(&queue);
    let remote = MockRemoteApi::default();

    let record = gmail_record();
    store.create(&record, "user-1", &old_user_key).await.unwrap();

    // Sync the original ciphertext so the queue is empty before rotation.
    let drained = queue.drain("user-1", 10).await;
    for op in &drained {
        remote.save("user-1", &op.record, false).await.unwrap();
        queue.complete(op.id).await;
        store.mark_synced(op.record_id, "user-1").await;
    }
    assert_eq!(queue.status("user-1").await.pending_count, 0);

    let rotated = session.rotate_user_key().unwrap();
    let new_user_key = rotated.new_user_key.clone();

    let report = store.rotate_user_key("user-1", &old_user_key, &new_user_key).await;
    assert!(report.failures.is_empty());

    // The old key no longer opens anything; the new key does.
    let (_, old_report) = store.list("user-1", &old_user_key).await;
    assert_eq!(old_report.failures.len(), 1);
    let (records, new_report) = store.list("user-1", &new_user_key).await;
    assert!(new_report.failures.is_empty());
    assert!(records[0].fields_equal(&record));

    // Rotation enqueued an update so the remote picks up the re-wrapped cipher.
    let status = queue.status("user-1").await;
    assert_eq!(status.pending_count, 1);
}

#[tokio::test]
async fn pending_op_exhausts_retries_and_is_skipped_by_next_drain() {
    let queue = PendingOpsQueue::new(3);
    let record = gmail_record();
    let (_user, mut session) =
        Session::create_account("retry@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
            .unwrap();
    let user_key = session.user_key().unwrap().to_vec();
    let cipher = codec::encrypt_record(&record, "user-1", &user_key).unwrap();

    let id = queue.enqueue(vault_engine::model::OperationKind::Create, cipher, "user-1", Utc::now()).await;

    for _ in 0..3 {
        let drained = queue.drain("user-1", 10).await;
        assert_eq!(drained.len(), 1);
        queue.fail(id, false).await;
    }

    let status = queue.status("user-1").await;
    assert_eq!(status.failed_count, 1);
    assert_eq!(status.pending_count, 0);

    let drained_again = queue.drain("user-1", 10).await;
    assert!(drained_again.is_empty());
}

#[tokio::test]
async fn client_error_fails_immediately_without_consuming_a_retry() {
    let queue = PendingOpsQueue::new(3);
    let record = gmail_record();
    let (_user, mut session) =
        Session::create_account("client-err@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
            .unwrap();
    let user_key = session.user_key().unwrap().to_vec();
    let cipher = codec::encrypt_record(&record, "user-1", &user_key).unwrap();
    let id = queue.enqueue(vault_engine::model::OperationKind::Create, cipher, "user-1", Utc::now()).await;

    queue.drain("user-1", 10).await;
    queue.fail(id, true).await;

    let status = queue.status("user-1").await;
    assert_eq!(status.failed_count, 1);
}

#[tokio::test]
async fn cache_wrong_user_id_evicts_and_reports_miss() {
    // The byte-tamper variant of this scenario (spec.md §8 scenario 5) lives
    // as an internal unit test in `cache.rs` — it needs to mutate a stored
    // entry directly, which isn't reachable through this crate's public API.
    let cache = vault_engine::cache::ResponseCache::new(std::time::Duration::from_secs(300), 100);
    let key = vault_engine::cache::fingerprint("passwords/load", "user-1", &serde_json::json!({}));
    cache.put(&key, serde_json::json!({"ciphers": []}), "user-1").await;

    assert!(cache.get(&key, "user-1").await.is_some());
    assert!(cache.get(&key, "someone-else").await.is_none());
    assert!(cache.get(&key, "user-1").await.is_none());
}

#[test]
fn backup_export_import_round_trip() {
    let (_user, mut session) =
        Session::create_account("backup@example.com", "Exp0rt!", KdfParams::default_pbkdf2()).unwrap();
    let user_key = session.user_key().unwrap().to_vec();

    let mut ciphers = Vec::new();
    for i in 0..7 {
        let mut r = gmail_record();
        r.id = Uuid::new_v4();
        r.title = format!("Entry {i}");
        ciphers.push(codec::encrypt_record(&r, "user-1", &user_key).unwrap());
    }
    let folders = vec![
        codec::encrypt_folder(Uuid::new_v4(), "Personal", &user_key, Utc::now()).unwrap(),
        codec::encrypt_folder(Uuid::new_v4(), "Work", &user_key, Utc::now()).unwrap(),
    ];

    let kbx = backup::export_backup(
        ciphers.clone(),
        folders.clone(),
        &user_key,
        EncryptionType::UserKey,
        KdfType::Pbkdf2Sha256,
        600_000,
        None,
        None,
        None,
        BackupType::Manual,
    )
    .unwrap();

    let restored = backup::import_backup(&kbx, &user_key).unwrap();
    assert_eq!(restored.ciphers.len(), 7);
    assert_eq!(restored.categories.len(), 2);

    let mut tampered = kbx.clone();
    tampered.encrypted_data.ct.push('A');
    let err = backup::import_backup(&tampered, &user_key).unwrap_err();
    assert!(matches!(err, vault_engine::EngineError::IntegrityCheckFailed));
}
