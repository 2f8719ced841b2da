//! Credential Store
//!
//! Holds the encrypted password and the session cookie blob for each identity.
//! Plaintext passwords are only available inside [`CredentialStore::with_password`].

mod store;

pub use store::CredentialStore;
