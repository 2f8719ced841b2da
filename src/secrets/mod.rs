//! Secrets module
//!
//! Encrypts identity passwords at rest. Plaintext only ever leaves this module
//! as a `SecretString`, which is redacted in debug output and wiped on drop.

mod cipher;

pub use cipher::{generate_key, AesCipher};

use secrecy::SecretString;
use thiserror::Error;

/// Errors raised while loading keys or opening ciphertext
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Encryption key not set (expected in ${0})")]
    MissingKey(String),

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed (wrong key or corrupted ciphertext)")]
    Decrypt,

    #[error("Decrypted credential is not valid UTF-8")]
    Encoding,
}

/// Result type for secret operations
pub type SecretResult<T> = Result<T, SecretError>;

/// Symmetric cipher for stored credentials
pub trait CredentialCipher: Send + Sync {
    /// Seals a plaintext credential
    fn encrypt(&self, plaintext: &str) -> SecretResult<Vec<u8>>;

    /// Opens a sealed credential
    fn decrypt(&self, ciphertext: &[u8]) -> SecretResult<SecretString>;
}
