//! The opaque REST surface spec.md §6 declares external to this engine.
//! `RemoteApi` is the concrete collaborator the sync queue and progressive
//! loader need in order to actually drive that surface; `HttpRemoteApi` is
//! a thin `reqwest` client over it, and `MockRemoteApi` is an in-memory
//! stand-in for tests, grounded in the same request/response shapes.

use std::sync::Arc;
use tokio::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::EncryptedCipher;
use vault_keys::PersistedUser;

#[derive(Debug, Serialize)]
pub struct CheckEncryptionRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CheckEncryptionResponse {
    pub has_encryption: bool,
}

#[derive(Debug, Serialize)]
pub struct SetupEncryptionRequest<'a> {
    pub email: &'a str,
    pub wrapped_user_key: &'a vault_crypto::CipherEnvelope,
    pub kdf_params: &'a PersistedUser,
    pub passphrase_hint: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct UserEnvelope {
    pub user: PersistedUser,
}

#[derive(Debug, Serialize)]
pub struct LoadRequest<'a> {
    pub user_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoadResponse {
    pub ciphers: Vec<EncryptedCipher>,
}

#[derive(Debug, Serialize)]
pub struct SaveRequest<'a> {
    pub user_id: &'a str,
    pub encrypted_cipher: &'a EncryptedCipher,
    pub is_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct SaveResponse {
    pub cipher: EncryptedCipher,
}

#[derive(Debug, Serialize)]
pub struct DeleteRequest<'a> {
    pub user_id: &'a str,
    pub entry_id: &'a str,
}

/// The six endpoints of spec.md §6. Implementations MUST NOT send a
/// passphrase or an unwrapped key over the wire — only opaque fields.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn check_encryption(&self, email: &str) -> Result<bool, EngineError>;
    async fn setup_encryption(&self, user: &PersistedUser, passphrase_hint: Option<&str>) -> Result<PersistedUser, EngineError>;
    async fn get_user_data(&self, email: &str) -> Result<PersistedUser, EngineError>;
    async fn load(&self, user_id: &str) -> Result<Vec<EncryptedCipher>, EngineError>;
    async fn save(&self, user_id: &str, cipher: &EncryptedCipher, is_update: bool) -> Result<EncryptedCipher, EngineError>;
    async fn delete(&self, user_id: &str, entry_id: &str) -> Result<(), EngineError>;
}

/// A `reqwest`-backed client against the remote object store's REST
/// surface. Structured logging and typed errors follow the teacher's
/// network-glue idiom even though the server side is out of scope here.
pub struct HttpRemoteApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn classify_status(status: reqwest::StatusCode) -> Option<EngineError> {
        if status.is_client_error() {
            Some(EngineError::ClientError(status.as_u16()))
        } else if status.is_server_error() {
            Some(EngineError::ServerError(status.as_u16()))
        } else {
            None
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn check_encryption(&self, email: &str) -> Result<bool, EngineError> {
        let resp = self
            .client
            .post(self.url("/auth/check-encryption"))
            .json(&CheckEncryptionRequest { email })
            .send()
            .await
            .map_err(|_| EngineError::NetworkUnavailable)?;
        if let Some(e) = Self::classify_status(resp.status()) {
            return Err(e);
        }
        let body: CheckEncryptionResponse = resp.json().await.map_err(|_| EngineError::ServerError(502))?;
        Ok(body.has_encryption)
    }

    async fn setup_encryption(&self, user: &PersistedUser, passphrase_hint: Option<&str>) -> Result<PersistedUser, EngineError> {
        let resp = self
            .client
            .post(self.url("/auth/setup-encryption"))
            .json(&SetupEncryptionRequest {
                email: &user.email,
                wrapped_user_key: &user.wrapped_user_key,
                kdf_params: user,
                passphrase_hint,
            })
            .send()
            .await
            .map_err(|_| EngineError::NetworkUnavailable)?;
        if let Some(e) = Self::classify_status(resp.status()) {
            return Err(e);
        }
        let body: UserEnvelope = resp.json().await.map_err(|_| EngineError::ServerError(502))?;
        Ok(body.user)
    }

    async fn get_user_data(&self, email: &str) -> Result<PersistedUser, EngineError> {
        let resp = self
            .client
            .post(self.url("/auth/get-user-data"))
            .json(&CheckEncryptionRequest { email })
            .send()
            .await
            .map_err(|_| EngineError::NetworkUnavailable)?;
        if let Some(e) = Self::classify_status(resp.status()) {
            return Err(e);
        }
        let body: UserEnvelope = resp.json().await.map_err(|_| EngineError::ServerError(502))?;
        Ok(body.user)
    }

    async fn load(&self, user_id: &str) -> Result<Vec<EncryptedCipher>, EngineError> {
        let resp = self
            .client
            .post(self.url("/passwords/load"))
            .json(&LoadRequest { user_id })
            .send()
            .await
            .map_err(|_| EngineError::NetworkUnavailable)?;
        if let Some(e) = Self::classify_status(resp.status()) {
            return Err(e);
        }
        let body: LoadResponse = resp.json().await.map_err(|_| EngineError::ServerError(502))?;
        Ok(body.ciphers)
    }

    async fn save(&self, user_id: &str, cipher: &EncryptedCipher, is_update: bool) -> Result<EncryptedCipher, EngineError> {
        let entry_id = cipher.id.to_string();
        let resp = self
            .client
            .post(self.url("/passwords/save"))
            .json(&SaveRequest {
                user_id,
                encrypted_cipher: cipher,
                is_update,
                entry_id: is_update.then_some(entry_id.as_str()),
            })
            .send()
            .await
            .map_err(|_| EngineError::NetworkUnavailable)?;
        if let Some(e) = Self::classify_status(resp.status()) {
            return Err(e);
        }
        let body: SaveResponse = resp.json().await.map_err(|_| EngineError::ServerError(502))?;
        Ok(body.cipher)
    }

    async fn delete(&self, user_id: &str, entry_id: &str) -> Result<(), EngineError> {
        let resp = self
            .client
            .post(self.url("/passwords/delete"))
            .json(&DeleteRequest { user_id, entry_id })
            .send()
            .await
            .map_err(|_| EngineError::NetworkUnavailable)?;
        // A 404 on delete is treated as success, per spec.md §6.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if let Some(e) = Self::classify_status(resp.status()) {
            return Err(e);
        }
        Ok(())
    }
}

/// In-memory stand-in for tests; optionally simulates offline mode and
/// injected failures without any network stack.
pub struct MockRemoteApi {
    ciphers: Mutex<Vec<EncryptedCipher>>,
    users: Mutex<Vec<PersistedUser>>,
    pub offline: std::sync::atomic::AtomicBool,
    pub received_saves: Arc<Mutex<Vec<uuid::Uuid>>>,
}

impl Default for MockRemoteApi {
    fn default() -> Self {
        Self {
            ciphers: Mutex::new(Vec::new()),
            users: Mutex::new(Vec::new()),
            offline: std::sync::atomic::AtomicBool::new(false),
            received_saves: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockRemoteApi {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), EngineError> {
        if self.offline.load(std::sync::atomic::Ordering::SeqCst) {
            Err(EngineError::NetworkUnavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteApi for MockRemoteApi {
    async fn check_encryption(&self, email: &str) -> Result<bool, EngineError> {
        self.check_online()?;
        Ok(self.users.lock().await.iter().any(|u| u.email == email))
    }

    async fn setup_encryption(&self, user: &PersistedUser, _passphrase_hint: Option<&str>) -> Result<PersistedUser, EngineError> {
        self.check_online()?;
        self.users.lock().await.push(user.clone());
        Ok(user.clone())
    }

    async fn get_user_data(&self, email: &str) -> Result<PersistedUser, EngineError> {
        self.check_online()?;
        self.users
            .lock()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(EngineError::NotFound)
    }

    async fn load(&self, user_id: &str) -> Result<Vec<EncryptedCipher>, EngineError> {
        self.check_online()?;
        Ok(self.ciphers.lock().await.iter().filter(|c| c.user_id == user_id).cloned().collect())
    }

    async fn save(&self, user_id: &str, cipher: &EncryptedCipher, _is_update: bool) -> Result<EncryptedCipher, EngineError> {
        self.check_online()?;
        self.received_saves.lock().await.push(cipher.id);
        let mut ciphers = self.ciphers.lock().await;
        if let Some(existing) = ciphers.iter_mut().find(|c| c.id == cipher.id && c.user_id == user_id) {
            *existing = cipher.clone();
        } else {
            ciphers.push(cipher.clone());
        }
        Ok(cipher.clone())
    }

    async fn delete(&self, user_id: &str, entry_id: &str) -> Result<(), EngineError> {
        self.check_online()?;
        let id: uuid::Uuid = entry_id.parse().map_err(|_| EngineError::ClientError(400))?;
        self.ciphers.lock().await.retain(|c| !(c.id == id && c.user_id == user_id));
        Ok(())
    }
}
