//! HKP keyserver client.

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use crate::config::KeyServerConfig;
use crate::error::{Error, Result};
use crate::parse::normalize_key_id;

use super::hkp::SearchResults;

/// Client for one HKP keyserver.
///
/// The client never touches the local keyring: fetched key material goes
/// through [`KeyStore::import_key`](crate::KeyStore::import_key). Calls are
/// independent of each other, so one client can be shared between threads.
/// Every request is bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct KeyServerClient {
    base_url: String,
    client: Client,
}

impl KeyServerClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns `Error::Config` if the keyserver URL or timeout is invalid.
    pub fn new(config: &KeyServerConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self { base_url, client })
    }

    /// Create a client for a keyserver URL with default settings.
    ///
    /// # Example
    /// ```
    /// use keyrack::KeyServerClient;
    ///
    /// let client = KeyServerClient::with_url("hkp://keyserver.example.org").unwrap();
    /// assert_eq!(client.base_url(), "http://keyserver.example.org:11371");
    /// ```
    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        Self::new(&KeyServerConfig::new(url))
    }

    /// The HTTP(S) base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch key material by key ID or fingerprint.
    ///
    /// # Arguments
    /// * `key_id` - 8 or 16 hex character key ID, or a full fingerprint
    ///
    /// # Returns
    /// The raw (usually ASCII-armored) key material as served.
    ///
    /// # Errors
    /// - `Error::InvalidInput` if `key_id` is not a hex key ID
    /// - `Error::KeyNotFoundRemote` if the keyserver has no such key
    /// - `Error::KeyServerUnreachable` on network failure or timeout
    ///
    /// # Example
    /// ```no_run
    /// use keyrack::KeyServerClient;
    ///
    /// let client = KeyServerClient::with_url("hkps://keys.openpgp.org").unwrap();
    /// let material = client.fetch_by_id("2ED375461FEC5A1D").unwrap();
    /// ```
    #[tracing::instrument(skip(self), fields(keyserver = %self.base_url))]
    pub fn fetch_by_id(&self, key_id: &str) -> Result<Vec<u8>> {
        let key_id = normalize_key_id(key_id)?;
        let response = self.lookup("get", &format!("0x{}", key_id))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(Error::KeyNotFoundRemote(key_id)),
            status if !status.is_success() => {
                return Err(Error::KeyServerUnreachable(format!(
                    "keyserver answered {}",
                    status
                )))
            }
            _ => {}
        }

        let bytes = response.bytes().map_err(unreachable)?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(Error::KeyNotFoundRemote(key_id));
        }

        tracing::debug!(%key_id, len = bytes.len(), "fetched key material");
        Ok(bytes.to_vec())
    }

    /// Search the keyserver by user ID, email or key ID.
    ///
    /// # Returns
    /// The matching keys in keyserver order. No match is an empty result,
    /// not an error.
    ///
    /// # Errors
    /// - `Error::InvalidInput` if `term` is blank
    /// - `Error::KeyServerUnreachable` on network failure or timeout
    ///
    /// # Example
    /// ```no_run
    /// use keyrack::KeyServerClient;
    ///
    /// let client = KeyServerClient::with_url("hkps://keys.openpgp.org").unwrap();
    /// for key in client.search("alice@example.com").unwrap() {
    ///     println!("{} {:?}", key.key_id, key.uids);
    /// }
    /// ```
    #[tracing::instrument(skip(self), fields(keyserver = %self.base_url))]
    pub fn search(&self, term: &str) -> Result<SearchResults> {
        let term = term.trim();
        if term.is_empty() {
            return Err(Error::InvalidInput("search term is empty".to_string()));
        }

        let response = self.lookup("index", term)?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::debug!("no keys matched");
                return Ok(SearchResults::empty());
            }
            status if !status.is_success() => {
                return Err(Error::KeyServerUnreachable(format!(
                    "keyserver answered {}",
                    status
                )))
            }
            _ => {}
        }

        let body = response.text().map_err(unreachable)?;
        Ok(SearchResults::from_index(&body))
    }

    fn lookup(&self, op: &str, search: &str) -> Result<Response> {
        let url = format!("{}/pks/lookup", self.base_url);
        self.client
            .get(&url)
            .query(&[("op", op), ("options", "mr"), ("search", search)])
            .send()
            .map_err(unreachable)
    }
}

fn unreachable(e: reqwest::Error) -> Error {
    tracing::warn!(error = %e, timeout = e.is_timeout(), "keyserver request failed");
    Error::KeyServerUnreachable(e.to_string())
}
