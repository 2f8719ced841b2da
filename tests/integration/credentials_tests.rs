//! Integration tests for the credential store
//!
//! Identities are created through the public API, stored on disk, and read
//! back by a second store as a later process would.

use job_harvest::browser::CookieBlob;
use job_harvest::credentials::CredentialStore;
use job_harvest::secrets::{generate_key, AesCipher, SecretError};
use job_harvest::session::LoginError;
use job_harvest::storage::{open_storage, share, SqliteStorage};
use job_harvest::HarvestError;
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

fn store_at(path: &Path, key: &str) -> CredentialStore<SqliteStorage> {
    let storage = share(open_storage(path).unwrap());
    let cipher = AesCipher::from_base64(key).unwrap();
    CredentialStore::new(storage, Arc::new(cipher))
}

#[tokio::test]
async fn test_identity_round_trip_across_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let key = generate_key();

    let profile = serde_json::json!({ "phone": "+55 11 99999-0000" });
    store_at(&db_path, &key)
        .create_identity(
            "Harvest Bot",
            "bot@example.com",
            &SecretString::from("s3cret-pass"),
            Some(profile.clone()),
        )
        .unwrap();

    let store = store_at(&db_path, &key);
    let identity = store.identity_by_email("bot@example.com").unwrap();
    assert_eq!(identity.name, "Harvest Bot");
    assert_eq!(identity.profile, Some(profile));

    let length = store
        .with_password(&identity, |password| async move {
            assert_eq!(password.expose_secret(), "s3cret-pass");
            Ok(password.expose_secret().len())
        })
        .await
        .unwrap();
    assert_eq!(length, 11);
}

#[tokio::test]
async fn test_wrong_key_cannot_open_password() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");

    store_at(&db_path, &generate_key())
        .create_identity("Bot", "bot@example.com", &SecretString::from("pw"), None)
        .unwrap();

    let store = store_at(&db_path, &generate_key());
    let identity = store.identity_by_email("bot@example.com").unwrap();
    let err = store
        .with_password(&identity, |_| async { Ok(()) })
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Secret(SecretError::Decrypt)));
    assert!(!err.is_restartable());
}

#[test]
fn test_unknown_identity() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("harvest.db"), &generate_key());

    let err = store.identity_by_email("ghost@example.com").unwrap_err();
    assert!(matches!(
        err,
        HarvestError::Login(LoginError::UnknownIdentity(_))
    ));
}

#[test]
fn test_cookies_overwrite_and_persist() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let key = generate_key();

    let id = {
        let store = store_at(&db_path, &key);
        let id = store
            .create_identity("Bot", "bot@example.com", &SecretString::from("pw"), None)
            .unwrap();
        assert!(store.load_cookies(id, "LinkedIn").unwrap().is_none());

        store
            .save_cookies(id, "LinkedIn", &CookieBlob(b"first".to_vec()))
            .unwrap();
        store
            .save_cookies(id, "LinkedIn", &CookieBlob(b"second".to_vec()))
            .unwrap();
        id
    };

    let store = store_at(&db_path, &key);
    assert_eq!(
        store.load_cookies(id, "LinkedIn").unwrap(),
        Some(CookieBlob(b"second".to_vec()))
    );
    // Artifacts are per platform
    assert!(store.load_cookies(id, "Indeed").unwrap().is_none());
}

#[test]
fn test_key_loaded_from_env_file() {
    let key = generate_key();
    let mut env_file = NamedTempFile::new().unwrap();
    writeln!(env_file, "JOB_HARVEST_IT_KEY={}", key).unwrap();

    let from_file = AesCipher::from_env("JOB_HARVEST_IT_KEY", Some(env_file.path())).unwrap();
    let direct = AesCipher::from_base64(&key).unwrap();

    use job_harvest::secrets::CredentialCipher;
    let sealed = direct.encrypt("pw").unwrap();
    assert_eq!(from_file.decrypt(&sealed).unwrap().expose_secret(), "pw");
}
