//! Keyserver access (HKP).
//!
//! [`KeyServerClient`] looks keys up on a remote keyserver and downloads
//! their material. Importing that material is left to the
//! [`KeyStore`](crate::KeyStore).

mod client;
mod hkp;

pub use client::KeyServerClient;
pub use hkp::SearchResults;
