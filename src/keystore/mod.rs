//! SQLite-backed keyring.
//!
//! This module provides the local keyring: the single place where keys are
//! stored, listed, imported and deleted.
//!
//! # Features
//!
//! - **Persistent storage**: Keys survive application restarts
//! - **Key pairs**: Secret keys are stored next to their public keys and
//!   deleted together with them
//! - **Atomic mutations**: Imports and deletes are all-or-nothing
//! - **Shared access**: One `KeyStore` can serve many threads
//!
//! # Basic Usage
//!
//! ```no_run
//! use keyrack::KeyStore;
//!
//! // Open or create a keyring
//! let store = KeyStore::open("/var/lib/app/keyring.db").unwrap();
//!
//! // Import a key
//! let material = std::fs::read("alice.asc").unwrap();
//! let imported = store.import_key(&material).unwrap();
//!
//! // List public keys
//! for key in store.list(false).unwrap() {
//!     println!("  {} - {:?}", key.fingerprint, key.uids);
//! }
//!
//! // Delete the first imported key (and the other half of its pair)
//! store.delete(&imported[0]).unwrap();
//! ```
//!
//! # In-Memory Store for Testing
//!
//! ```
//! use keyrack::KeyStore;
//!
//! let store = KeyStore::open_in_memory().unwrap();
//! assert_eq!(store.count(false).unwrap(), 0);
//! ```

mod schema;
mod store;

pub use store::*;
