//! Error types for the keyrack library.
//!
//! Every failure of the keyring or the keyserver client is reported as one
//! of the variants below. Backend errors (SQLite, HTTP) are mapped into this
//! taxonomy at the boundary where they occur.

use thiserror::Error;

/// The main error type for keyrack operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No key with the requested fingerprint exists in the local keyring
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The local keyring could not be opened, read or written
    /// (locked, permission denied, corrupt).
    #[error("Keyring unavailable: {0}")]
    StoreUnavailable(String),

    /// Raw key material could not be parsed as OpenPGP keys
    #[error("Malformed key data: {0}")]
    MalformedKeyData(String),

    /// The keyserver could not be reached or did not answer in time
    #[error("Keyserver unreachable: {0}")]
    KeyServerUnreachable(String),

    /// The keyserver answered but has no key for the requested ID
    #[error("Key not found on keyserver: {0}")]
    KeyNotFoundRemote(String),

    /// Invalid input provided (fingerprint, key ID, search term)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    ///
    /// Lock contention on the keyring and network failures are transient.
    /// Malformed input and missing keys are terminal for the given input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_) | Error::KeyServerUnreachable(_)
        )
    }
}

/// A specialized Result type for keyrack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::StoreUnavailable(e.to_string())
    }
}

impl From<pgp::errors::Error> for Error {
    fn from(e: pgp::errors::Error) -> Self {
        Error::MalformedKeyData(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::StoreUnavailable("database is locked".into()).is_retryable());
        assert!(Error::KeyServerUnreachable("timed out".into()).is_retryable());

        assert!(!Error::MalformedKeyData("garbage".into()).is_retryable());
        assert!(!Error::KeyNotFoundRemote("DEADBEEF".into()).is_retryable());
        assert!(!Error::KeyNotFound("DEADBEEF".into()).is_retryable());
    }

    #[test]
    fn test_sqlite_errors_map_to_store_unavailable() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }
}
