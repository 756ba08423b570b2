//! Receiving a key from a keyserver into the local keyring.
//!
//! A receive goes `Idle -> Fetching -> Importing -> Imported`, or ends in
//! `Failed` carrying the error of the step that failed. Nothing is written
//! to the keyring unless the fetch succeeded.

use crate::error::{Error, Result};
use crate::keyserver::KeyServerClient;
use crate::keystore::KeyStore;
use crate::types::KeyRecord;

/// Where a receive currently stands.
#[derive(Debug)]
pub enum ReceiveState {
    /// Nothing done yet
    Idle,
    /// Next step downloads the key material
    Fetching,
    /// Key material downloaded; next step imports it
    Importing(Vec<u8>),
    /// Keys imported into the keyring (terminal)
    Imported(Vec<KeyRecord>),
    /// Fetch or import failed (terminal)
    Failed(Error),
}

impl ReceiveState {
    /// Whether the flow has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReceiveState::Imported(_) | ReceiveState::Failed(_))
    }

    /// Short name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ReceiveState::Idle => "idle",
            ReceiveState::Fetching => "fetching",
            ReceiveState::Importing(_) => "importing",
            ReceiveState::Imported(_) => "imported",
            ReceiveState::Failed(_) => "failed",
        }
    }
}

/// Step-by-step receive of one key ID.
///
/// # Example
///
/// ```no_run
/// use keyrack::{KeyServerClient, KeyStore, ReceiveFlow, ReceiveState};
///
/// let client = KeyServerClient::with_url("hkps://keys.openpgp.org").unwrap();
/// let store = KeyStore::open("keyring.db").unwrap();
///
/// let mut flow = ReceiveFlow::new("2ED375461FEC5A1D");
/// while !flow.state().is_terminal() {
///     println!("{}", flow.advance(&client, &store).name());
/// }
/// if let ReceiveState::Failed(e) = flow.state() {
///     eprintln!("Unable to import key: {}", e);
/// }
/// ```
#[derive(Debug)]
pub struct ReceiveFlow {
    key_id: String,
    state: ReceiveState,
}

impl ReceiveFlow {
    /// Start a receive for a key ID or fingerprint.
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            state: ReceiveState::Idle,
        }
    }

    /// The key ID being received.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Current state.
    pub fn state(&self) -> &ReceiveState {
        &self.state
    }

    /// Perform one transition. Terminal states stay where they are.
    pub fn advance(&mut self, client: &KeyServerClient, store: &KeyStore) -> &ReceiveState {
        let state = std::mem::replace(&mut self.state, ReceiveState::Idle);

        self.state = match state {
            ReceiveState::Idle => ReceiveState::Fetching,
            ReceiveState::Fetching => match client.fetch_by_id(&self.key_id) {
                Ok(material) => ReceiveState::Importing(material),
                Err(e) => ReceiveState::Failed(e),
            },
            ReceiveState::Importing(material) => match store.import_key(&material) {
                Ok(records) => ReceiveState::Imported(records),
                Err(e) => ReceiveState::Failed(e),
            },
            terminal => terminal,
        };

        match &self.state {
            ReceiveState::Failed(e) => {
                tracing::warn!(key_id = %self.key_id, error = %e, "unable to receive key")
            }
            ReceiveState::Imported(records) => {
                tracing::info!(key_id = %self.key_id, count = records.len(), "received key")
            }
            state => tracing::debug!(key_id = %self.key_id, state = state.name(), "receive advanced"),
        }

        &self.state
    }

    /// Drive the flow to its end.
    ///
    /// # Returns
    /// The imported records, or the error that stopped the flow.
    pub fn run(mut self, client: &KeyServerClient, store: &KeyStore) -> Result<Vec<KeyRecord>> {
        loop {
            self.advance(client, store);
            match std::mem::replace(&mut self.state, ReceiveState::Idle) {
                ReceiveState::Imported(records) => return Ok(records),
                ReceiveState::Failed(e) => return Err(e),
                pending => self.state = pending,
            }
        }
    }
}

/// Fetch a key from the keyserver and import it into the keyring.
///
/// # Errors
/// - `Error::KeyServerUnreachable` / `Error::KeyNotFoundRemote` from the fetch
/// - `Error::MalformedKeyData` / `Error::StoreUnavailable` from the import
pub fn receive_key(
    client: &KeyServerClient,
    store: &KeyStore,
    key_id: &str,
) -> Result<Vec<KeyRecord>> {
    ReceiveFlow::new(key_id).run(client, store)
}
