//! Key hierarchy and session lifecycle for kb-vault: master/user/protection
//! keys and the Locked/Unlocking/Unlocked/Expired state machine that owns
//! them for as long as the vault is open.

mod error;
mod persisted;
mod session;
mod types;

pub use error::KeysError;
pub use persisted::{KdfType, PersistedUser};
pub use session::{
    RotatedUserKey, Session, SessionStatus, DEFAULT_SESSION_TIMEOUT_MINUTES,
    MAX_SESSION_TIMEOUT_MINUTES, MIN_SESSION_TIMEOUT_MINUTES,
};
pub use types::{purpose, MasterKey, ProtectionKey, UserKey};
