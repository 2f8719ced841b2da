//! AES-256-GCM credential cipher
//!
//! Ciphertext layout is the 12-byte nonce followed by the sealed bytes.

use crate::secrets::{CredentialCipher, SecretError, SecretResult};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use secrecy::SecretString;
use std::path::Path;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Credential cipher backed by a single 256-bit key
pub struct AesCipher {
    cipher: Aes256Gcm,
}

impl AesCipher {
    /// Creates a cipher from raw key bytes
    pub fn new(key: &[u8]) -> SecretResult<Self> {
        if key.len() != KEY_LEN {
            return Err(SecretError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_LEN,
                key.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Creates a cipher from a base64 encoded key
    pub fn from_base64(encoded: &str) -> SecretResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SecretError::InvalidKey(e.to_string()))?;
        Self::new(&bytes)
    }

    /// Loads the key from the environment
    ///
    /// If `env_file` is given it is loaded first; variables already present
    /// in the process environment take precedence.
    pub fn from_env(key_env: &str, env_file: Option<&Path>) -> SecretResult<Self> {
        match env_file {
            Some(path) => {
                if let Err(e) = dotenvy::from_path(path) {
                    tracing::warn!("Could not load env file {}: {}", path.display(), e);
                }
            }
            None => match dotenvy::dotenv() {
                Ok(path) => tracing::debug!("Loaded env file {}", path.display()),
                Err(e) => tracing::debug!("No .env file loaded: {}", e),
            },
        }

        let encoded =
            std::env::var(key_env).map_err(|_| SecretError::MissingKey(key_env.to_string()))?;
        Self::from_base64(&encoded)
    }
}

impl CredentialCipher for AesCipher {
    fn encrypt(&self, plaintext: &str) -> SecretResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SecretError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> SecretResult<SecretString> {
        if ciphertext.len() <= NONCE_LEN {
            return Err(SecretError::Decrypt);
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);

        let opened = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| SecretError::Decrypt)?;

        let plaintext = String::from_utf8(opened).map_err(|_| SecretError::Encoding)?;
        Ok(SecretString::from(plaintext))
    }
}

/// Generates a fresh base64 encoded 256-bit key
pub fn generate_key() -> String {
    let key = Aes256Gcm::generate_key(OsRng);
    STANDARD.encode(key)
}
