//! # keyrack
//!
//! A local OpenPGP keyring and HKP keyserver client using [rpgp](https://docs.rs/pgp).
//!
//! The library provides the key management core a key administration
//! front end needs:
//!
//! - **Keyring**: SQLite-backed storage of public and secret keys, with
//!   listing, lookup, import and pairwise deletion
//! - **Keyserver**: HKP search and key download
//! - **Receive**: the fetch-then-import flow joining the two
//!
//! Authorization is the caller's business; nothing here checks who is
//! asking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use keyrack::*;
//!
//! let config = KeyrackConfig::load("keyrack.toml").unwrap();
//! let store = KeyStore::open_with_config(&config.keystore).unwrap();
//! let keyserver = KeyServerClient::new(&config.keyserver).unwrap();
//!
//! // Look a key up on the keyserver
//! for result in keyserver.search("alice@example.com").unwrap() {
//!     println!("{} {}", search_id_column(&result), identities_column(&result));
//! }
//!
//! // Receive it into the local keyring
//! let records = receive_key(&keyserver, &store, "2ED375461FEC5A1D").unwrap();
//!
//! // And delete it again, together with a secret key if there is one
//! store.delete(&records[0]).unwrap();
//! ```
//!
//! ## Errors
//!
//! Every operation returns [`Result`]. [`Error::is_retryable`] tells
//! transient failures (a locked keyring, an unreachable keyserver) from
//! permanent ones (malformed key material, a key the keyserver does not
//! have).

mod error;
mod types;
mod internal;

mod parse;
mod keyring;
mod config;
mod columns;
mod receive;

pub mod keystore;
pub mod keyserver;

// Re-export error types
pub use error::{Error, Result};

// Re-export all public types
pub use types::{KeyRecord, KeyServerSearchResult, KeyType};

// Re-export identifier helpers
pub use parse::{normalize_fingerprint, normalize_key_id};

// Re-export configuration
pub use config::{KeyServerConfig, KeyStoreConfig, KeyrackConfig, DEFAULT_KEYSERVER};

// Re-export keyring and keyserver entry points
pub use keystore::KeyStore;
pub use keyserver::{KeyServerClient, SearchResults};

// Re-export the receive flow
pub use receive::{receive_key, ReceiveFlow, ReceiveState};

// Re-export display columns
pub use columns::{
    creation_date_column,
    expiration_date_column,
    identities_column,
    key_id_column,
    key_type_column,
    length_column,
    owner_column,
    search_id_column,
};
