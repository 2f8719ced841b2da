//! Identity lookup, scoped password access and cookie persistence

use crate::browser::CookieBlob;
use crate::config::validate_email;
use crate::secrets::CredentialCipher;
use crate::session::LoginError;
use crate::storage::{lock, IdentityRecord, NewIdentity, SharedStorage, Storage};
use crate::Result;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;

/// Owns identity ciphertext and the durable cookie blobs
pub struct CredentialStore<S> {
    storage: SharedStorage<S>,
    cipher: Arc<dyn CredentialCipher>,
}

impl<S> Clone for CredentialStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            cipher: Arc::clone(&self.cipher),
        }
    }
}

impl<S: Storage> CredentialStore<S> {
    pub fn new(storage: SharedStorage<S>, cipher: Arc<dyn CredentialCipher>) -> Self {
        Self { storage, cipher }
    }

    /// Encrypts `password` and stores a new identity
    pub fn create_identity(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
        profile: Option<serde_json::Value>,
    ) -> Result<i64> {
        validate_email(email)?;

        let encrypted_password = self.cipher.encrypt(password.expose_secret())?;
        let identity = NewIdentity {
            name: name.to_string(),
            email: email.to_string(),
            encrypted_password,
            profile,
        };

        let id = lock(&self.storage)?.create_identity(&identity)?;
        tracing::info!("Created identity {} ({})", id, email);
        Ok(id)
    }

    /// Looks up the identity to authenticate as
    pub fn identity_by_email(&self, email: &str) -> Result<IdentityRecord> {
        lock(&self.storage)?
            .get_identity_by_email(email)?
            .ok_or_else(|| LoginError::UnknownIdentity(email.to_string()).into())
    }

    /// Runs `f` with the decrypted password
    ///
    /// The plaintext is moved into `f` and dropped (and wiped) when the future
    /// it returns completes.
    pub async fn with_password<F, Fut, T>(&self, identity: &IdentityRecord, f: F) -> Result<T>
    where
        F: FnOnce(SecretString) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let password = self.cipher.decrypt(&identity.encrypted_password)?;
        f(password).await
    }

    /// Stored cookie blob for the pair, if a previous session saved one
    pub fn load_cookies(&self, identity_id: i64, platform: &str) -> Result<Option<CookieBlob>> {
        let artifact = lock(&self.storage)?.load_session_artifact(identity_id, platform)?;
        Ok(artifact
            .filter(|a| a.active)
            .map(|a| CookieBlob(a.cookies)))
    }

    /// Saves the cookie blob, replacing any earlier one for the pair
    pub fn save_cookies(&self, identity_id: i64, platform: &str, cookies: &CookieBlob) -> Result<()> {
        lock(&self.storage)?.save_session_artifact(identity_id, platform, cookies.as_bytes())?;
        tracing::info!("Saved session cookies for identity {} on {}", identity_id, platform);
        Ok(())
    }
}
