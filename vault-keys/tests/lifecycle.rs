use vault_keys::{KeysError, Session, SessionStatus};
use vault_crypto::KdfParams;

const PASSPHRASE: &str = "Corr3ct!HorseBattery#2024";

#[test]
fn touch_resets_the_idle_clock() {
    let (_user, mut session) =
        Session::create_account("erin@example.com", PASSPHRASE, KdfParams::default_pbkdf2()).unwrap();
    session.touch();
    assert!(!session.check_idle(60));
    assert_eq!(session.status(), SessionStatus::Unlocked);
}

#[test]
fn locked_session_refuses_user_key_access() {
    let (_user, mut session) =
        Session::create_account("frank@example.com", PASSPHRASE, KdfParams::default_pbkdf2()).unwrap();
    session.lock();
    let err = session.user_key().unwrap_err();
    assert_eq!(err, KeysError::VaultLocked);
}

#[test]
fn rotate_passphrase_allows_unlock_with_new_passphrase_only() {
    let (user, mut session) =
        Session::create_account("grace@example.com", PASSPHRASE, KdfParams::default_pbkdf2()).unwrap();
    let updated = session
        .rotate_passphrase(PASSPHRASE, "N3w!Passphrase#2025", &user, KdfParams::default_pbkdf2())
        .unwrap();

    assert!(Session::unlock(PASSPHRASE, &updated).is_err());
    assert!(Session::unlock("N3w!Passphrase#2025", &updated).is_ok());
}

#[test]
fn rotate_user_key_changes_the_live_key_but_not_its_length() {
    let (_user, mut session) =
        Session::create_account("heidi@example.com", PASSPHRASE, KdfParams::default_pbkdf2()).unwrap();
    let before = session.user_key().unwrap().to_vec();
    let rotated = session.rotate_user_key().unwrap();
    assert_eq!(rotated.old_user_key, before);
    assert_ne!(rotated.new_user_key, before);
    assert_eq!(session.user_key().unwrap(), rotated.new_user_key.as_slice());
}
