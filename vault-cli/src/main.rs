//! kb-vault CLI demonstrator v0.1.0
//!
//! Exercises the engine end-to-end against an in-memory mock remote:
//! account creation, unlock, add/list, export/import.
//!
//! Configuration (environment variables):
//!   KB_LOG_FORMAT              - "json" for structured logging, "pretty" for dev
//!   KB_SESSION_TIMEOUT_MINUTES - idle lock timeout (default: 60)
//!   KB_SYNC_BATCH_SIZE         - pending-op drain batch size (default: 10)
//!   KB_DECRYPT_BATCH_SIZE      - progressive-decrypt batch size (default: 10)

use chrono::Utc;
use uuid::Uuid;

use vault_crypto::KdfParams;
use vault_engine::codec;
use vault_engine::model::CredentialRecord;
use vault_engine::queue::PendingOpsQueue;
use vault_engine::remote::MockRemoteApi;
use vault_engine::store::OptimisticStore;
use vault_engine::VaultConfig;
use vault_keys::Session;

fn init_logging() {
    let log_format = std::env::var("KB_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kb_vault=info".into());
    if log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).with_target(true).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let config = VaultConfig::from_env();
    tracing::info!(?config, "kb-vault CLI starting");

    let (persisted_user, mut session) =
        Session::create_account("demo@example.com", "Corr3ct!HorseBattery#2024", KdfParams::default_pbkdf2())
            .expect("account creation cannot fail with valid inputs");
    tracing::info!(user_id = %persisted_user.id, "account created, session unlocked");

    let user_id = persisted_user.id.clone();
    let user_key = session.user_key().expect("session is unlocked").to_vec();

    let queue = PendingOpsQueue::new(config.sync_max_retries);
    let store = OptimisticStore::new(&queue);
    let remote = MockRemoteApi::default();

    let record = CredentialRecord {
        id: Uuid::new_v4(),
        folder_id: None,
        title: "Example Mail".to_string(),
        username: "demo".to_string(),
        password: "hunter2".to_string(),
        website: "https://mail.example.com".to_string(),
        notes: String::new(),
        custom_fields: vec![],
        tags: vec!["personal".to_string()],
        favorite: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    };

    store.create(&record, &user_id, &user_key).await.expect("encrypt+enqueue");
    tracing::info!(record_id = %record.id, "created one credential offline");

    let report = vault_engine::sync::sweep(&queue, &store, &remote, &user_id, config.sync_batch_size).await;
    tracing::info!(synced = report.synced, failed = report.failed, "sync sweep complete");

    let (records, report) = store.list(&user_id, &user_key).await;
    for r in &records {
        println!("{}: {} / {}", r.title, r.username, r.website);
    }
    if !report.failures.is_empty() {
        tracing::warn!(count = report.failures.len(), "some records failed to decode");
    }

    let cipher = codec::encrypt_record(&record, &user_id, &user_key).expect("encrypt for export");
    let kbx = vault_engine::backup::export_backup(
        vec![cipher],
        vec![],
        &user_key,
        vault_engine::backup::EncryptionType::UserKey,
        persisted_user.kdf_type,
        persisted_user.kdf_iterations,
        persisted_user.kdf_memory,
        persisted_user.kdf_parallelism,
        None,
        vault_engine::backup::BackupType::Manual,
    )
    .expect("export backup");

    let restored = vault_engine::backup::import_backup(&kbx, &user_key).expect("import backup");
    tracing::info!(entries = restored.ciphers.len(), "backup round trip verified");

    session.lock();
    tracing::info!("session locked, demo complete");
}
