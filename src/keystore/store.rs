//! KeyStore implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::config::KeyStoreConfig;
use crate::error::{Error, Result};
use crate::keyring::{
    armor_public_key, armor_secret_key, parse_key_material, stored_key_record, ParsedKey,
};
use crate::parse::{normalize_fingerprint, normalize_key_id};
use crate::types::{KeyRecord, KeyType};

use super::schema::init_schema;

/// SQLite-backed keyring.
///
/// The `KeyStore` is the only component that reads or writes the keyring.
/// Public and secret keys live in separate tables keyed by fingerprint; a
/// secret key is always stored together with its public key.
///
/// # Thread Safety
///
/// The connection is guarded by a mutex held for the duration of each
/// operation, so a `KeyStore` can be shared between threads (for example
/// in an `Arc`). Mutations run inside a single SQLite transaction: readers
/// never observe a half-applied import or delete, and a failed mutation
/// leaves the keyring untouched.
pub struct KeyStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore").field("path", &self.path).finish()
    }
}

impl KeyStore {
    /// Open or create a keyring at the given path.
    ///
    /// If the database file doesn't exist, it will be created with the
    /// appropriate schema. Parent directories must already exist.
    ///
    /// # Errors
    /// Returns `Error::StoreUnavailable` if the file cannot be opened or is
    /// not a keyring database.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keyrack::KeyStore;
    ///
    /// let store = KeyStore::open("/var/lib/app/keyring.db").unwrap();
    /// println!("Public keys: {}", store.count(false).unwrap());
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_file(path.as_ref(), KeyStoreConfig::default().busy_timeout)
    }

    /// Open the keyring described by a configuration.
    ///
    /// A configuration without a path yields an in-memory keyring.
    pub fn open_with_config(config: &KeyStoreConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::open_file(path, config.busy_timeout),
            None => Self::open_in_memory(),
        }
    }

    /// Create an in-memory keyring.
    ///
    /// # Example
    ///
    /// ```
    /// use keyrack::KeyStore;
    ///
    /// let store = KeyStore::open_in_memory().unwrap();
    /// assert!(store.path().is_none());
    /// assert!(store.list(false).unwrap().is_empty());
    /// ```
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None, KeyStoreConfig::default().busy_timeout)
    }

    fn open_file(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, Some(path.to_path_buf()), busy_timeout)
    }

    fn from_connection(
        conn: Connection,
        path: Option<PathBuf>,
        busy_timeout: Duration,
    ) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        init_schema(&conn)?;

        tracing::debug!(path = ?path, "opened keyring");

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// List all keys of one kind.
    ///
    /// # Arguments
    /// * `secret` - `true` for secret keys, `false` for public keys
    ///
    /// # Returns
    /// One record per fingerprint, ordered by fingerprint.
    ///
    /// # Errors
    /// Returns `Error::StoreUnavailable` if the keyring cannot be read or a
    /// stored key is corrupt.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keyrack::KeyStore;
    ///
    /// let store = KeyStore::open("keyring.db").unwrap();
    ///
    /// for key in store.list(true).unwrap() {
    ///     println!("{} - {}", key.key_id(), key.uids.join(", "));
    /// }
    /// ```
    #[tracing::instrument(skip(self))]
    pub fn list(&self, secret: bool) -> Result<Vec<KeyRecord>> {
        let key_type = KeyType::from_secret(secret);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT fingerprint, key_data FROM {} ORDER BY fingerprint",
            table_for(key_type)
        ))?;

        let rows = stmt.query_map([], |row| {
            let fingerprint: String = row.get(0)?;
            let data: Vec<u8> = row.get(1)?;
            Ok((fingerprint, data))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (fingerprint, data) = row?;
            records.push(decode_stored(&fingerprint, &data, key_type)?);
        }

        Ok(records)
    }

    /// Get one key by fingerprint.
    ///
    /// # Arguments
    /// * `fingerprint` - Fingerprint (hex, case and spacing do not matter)
    /// * `secret` - Look up the secret key instead of the public key
    ///
    /// # Errors
    /// - `Error::KeyNotFound` if no key of the requested kind exists
    /// - `Error::InvalidInput` if `fingerprint` is not a fingerprint
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keyrack::KeyStore;
    ///
    /// let store = KeyStore::open("keyring.db").unwrap();
    ///
    /// let key = store.get("B3406D931B37F6B525195F142ED375461FEC5A1D", false).unwrap();
    /// println!("User IDs: {:?}", key.uids);
    /// ```
    #[tracing::instrument(skip(self))]
    pub fn get(&self, fingerprint: &str, secret: bool) -> Result<KeyRecord> {
        let fingerprint = normalize_fingerprint(fingerprint)?;
        let key_type = KeyType::from_secret(secret);
        let data = self
            .read_key_data(&fingerprint, key_type)?
            .ok_or_else(|| Error::KeyNotFound(fingerprint.clone()))?;
        decode_stored(&fingerprint, &data, key_type)
    }

    /// Check if a key of the given kind exists.
    pub fn contains(&self, fingerprint: &str, secret: bool) -> Result<bool> {
        let fingerprint = normalize_fingerprint(fingerprint)?;
        Ok(self
            .read_key_data(&fingerprint, KeyType::from_secret(secret))?
            .is_some())
    }

    /// Number of keys of the given kind.
    pub fn count(&self, secret: bool) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {}",
                table_for(KeyType::from_secret(secret))
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Get database path.
    ///
    /// Returns `None` for in-memory keyrings.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Find a key by key ID.
    ///
    /// Short (8 character) and long (16 character) key IDs match the
    /// trailing hex characters of a fingerprint. A full fingerprint only
    /// matches itself. If several keys share a short ID, the one with the
    /// lowest fingerprint is returned.
    ///
    /// # Returns
    /// The matching record, or `None` if no key matches.
    pub fn find_by_key_id(&self, key_id: &str, secret: bool) -> Result<Option<KeyRecord>> {
        let key_id = normalize_key_id(key_id)?;
        let key_type = KeyType::from_secret(secret);

        let condition = if key_id.len() > 16 {
            "fingerprint = ?1"
        } else {
            "substr(fingerprint, -length(?1)) = ?1"
        };

        let found: Option<(String, Vec<u8>)> = {
            let conn = self.conn.lock();
            conn.query_row(
                &format!(
                    "SELECT fingerprint, key_data FROM {} WHERE {}
                     ORDER BY fingerprint LIMIT 1",
                    table_for(key_type),
                    condition
                ),
                [&key_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        found
            .map(|(fingerprint, data)| decode_stored(&fingerprint, &data, key_type))
            .transpose()
    }

    /// Export every key of one kind as a binary OpenPGP keyring.
    ///
    /// The result is the concatenation of the stored transferable keys,
    /// ordered by fingerprint, in the format written by
    /// `gpg --export` (or `gpg --export-secret-keys` when `secret` is set).
    /// It can be fed back to [`import_key`](Self::import_key) or to other
    /// OpenPGP tools. An empty keyring exports as an empty buffer.
    ///
    /// # Errors
    /// Returns `Error::StoreUnavailable` if the keyring cannot be read.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keyrack::KeyStore;
    ///
    /// let store = KeyStore::open("keyring.db").unwrap();
    /// std::fs::write("pubring.gpg", store.export_keyring(false).unwrap()).unwrap();
    /// ```
    #[tracing::instrument(skip(self))]
    pub fn export_keyring(&self, secret: bool) -> Result<Vec<u8>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT key_data FROM {} ORDER BY fingerprint",
            table_for(KeyType::from_secret(secret))
        ))?;

        let mut keyring = Vec::new();
        let mut count = 0usize;
        for data in stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))? {
            keyring.extend_from_slice(&data?);
            count += 1;
        }

        tracing::debug!(count, len = keyring.len(), "exported keyring");
        Ok(keyring)
    }

    /// Import raw key material into the keyring.
    ///
    /// The material may hold several keys, as ASCII-armored blocks or a
    /// binary packet stream, public or secret. Everything is parsed before
    /// the keyring is touched and all keys are written in one transaction.
    ///
    /// - Secret material stores the secret key and, if the keyring does not
    ///   have it yet, the public key derived from it.
    /// - Public material for a known fingerprint replaces the stored public
    ///   key when it differs; the secret key is left alone.
    /// - Importing material that is already stored changes nothing.
    ///
    /// # Returns
    /// One record per key in the material, in input order.
    ///
    /// # Errors
    /// - `Error::MalformedKeyData` if the material cannot be parsed
    /// - `Error::StoreUnavailable` if the keyring cannot be written
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keyrack::KeyStore;
    ///
    /// let store = KeyStore::open("keyring.db").unwrap();
    ///
    /// let material = std::fs::read("alice.asc").unwrap();
    /// for key in store.import_key(&material).unwrap() {
    ///     println!("Imported {} {}", key.key_type, key.fingerprint);
    /// }
    /// ```
    #[tracing::instrument(skip(self, data), fields(len = data.len()))]
    pub fn import_key(&self, data: &[u8]) -> Result<Vec<KeyRecord>> {
        let parsed = parse_key_material(data)?;

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            for key in &parsed {
                store_key(&tx, key)?;
            }
            tx.commit()?;
        }

        let mut records: Vec<KeyRecord> = Vec::with_capacity(parsed.len());
        for key in parsed {
            let record = key.record;
            records.retain(|r| {
                !(r.fingerprint == record.fingerprint && r.key_type == record.key_type)
            });
            records.push(record);
        }

        tracing::info!(count = records.len(), "imported keys");
        Ok(records)
    }

    /// Import key material from a file.
    pub fn import_key_file(&self, path: impl AsRef<Path>) -> Result<Vec<KeyRecord>> {
        let data = std::fs::read(path.as_ref())?;
        self.import_key(&data)
    }

    /// Delete a key and the other half of its pair.
    ///
    /// Deleting a secret key also deletes its public key. Deleting a public
    /// key also deletes its secret key, since a secret key is never kept
    /// without its public key. Both rows go in one transaction.
    ///
    /// # Errors
    /// - `Error::KeyNotFound` if no key of the record's kind exists
    /// - `Error::StoreUnavailable` if the keyring cannot be written
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keyrack::KeyStore;
    ///
    /// let store = KeyStore::open("keyring.db").unwrap();
    ///
    /// let key = store.get("B3406D931B37F6B525195F142ED375461FEC5A1D", true).unwrap();
    /// store.delete(&key).unwrap();
    /// assert!(!store.contains(&key.fingerprint, false).unwrap());
    /// ```
    #[tracing::instrument(skip(self, record), fields(fingerprint = %record.fingerprint, key_type = %record.key_type))]
    pub fn delete(&self, record: &KeyRecord) -> Result<()> {
        let fingerprint = normalize_fingerprint(&record.fingerprint)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let present: Option<i64> = tx
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE fingerprint = ?1",
                    table_for(record.key_type)
                ),
                [&fingerprint],
                |row| row.get(0),
            )
            .optional()?;

        if present.is_none() {
            return Err(Error::KeyNotFound(fingerprint));
        }

        let secret_rows = tx.execute(
            "DELETE FROM secret_keys WHERE fingerprint = ?1",
            [&fingerprint],
        )?;
        let public_rows = tx.execute(
            "DELETE FROM public_keys WHERE fingerprint = ?1",
            [&fingerprint],
        )?;
        tx.commit()?;

        tracing::info!(secret_rows, public_rows, "deleted key pair");
        Ok(())
    }

    /// Export a key as ASCII armor.
    ///
    /// # Arguments
    /// * `fingerprint` - The key fingerprint
    /// * `secret` - Export the secret key block instead of the public one
    ///
    /// # Errors
    /// Returns `Error::KeyNotFound` if no key of the requested kind exists.
    pub fn export(&self, fingerprint: &str, secret: bool) -> Result<String> {
        let fingerprint = normalize_fingerprint(fingerprint)?;
        let key_type = KeyType::from_secret(secret);
        let data = self
            .read_key_data(&fingerprint, key_type)?
            .ok_or_else(|| Error::KeyNotFound(fingerprint.clone()))?;

        let armored = if secret {
            armor_secret_key(&data)
        } else {
            armor_public_key(&data)
        };
        armored.map_err(|e| corrupt(&fingerprint, e))
    }

    fn read_key_data(&self, fingerprint: &str, key_type: KeyType) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let data = conn
            .query_row(
                &format!(
                    "SELECT key_data FROM {} WHERE fingerprint = ?1",
                    table_for(key_type)
                ),
                [fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }
}

/// Write one parsed key inside an import transaction.
fn store_key(tx: &Transaction<'_>, key: &ParsedKey) -> Result<()> {
    let fingerprint = &key.record.fingerprint;

    let public_rows = match &key.secret_data {
        // Keep a stored public key; it may carry more signatures than the
        // one derived from the secret key.
        Some(_) => tx.execute(
            "INSERT INTO public_keys (fingerprint, key_data)
             VALUES (?1, ?2)
             ON CONFLICT(fingerprint) DO NOTHING",
            params![fingerprint, &key.public_data],
        )?,
        None => tx.execute(
            "INSERT INTO public_keys (fingerprint, key_data)
             VALUES (?1, ?2)
             ON CONFLICT(fingerprint) DO UPDATE SET
                key_data = excluded.key_data,
                updated_at = CURRENT_TIMESTAMP
             WHERE public_keys.key_data != excluded.key_data",
            params![fingerprint, &key.public_data],
        )?,
    };

    let secret_rows = match &key.secret_data {
        Some(secret_data) => tx.execute(
            "INSERT INTO secret_keys (fingerprint, key_data)
             VALUES (?1, ?2)
             ON CONFLICT(fingerprint) DO UPDATE SET
                key_data = excluded.key_data,
                updated_at = CURRENT_TIMESTAMP
             WHERE secret_keys.key_data != excluded.key_data",
            params![fingerprint, secret_data],
        )?,
        None => 0,
    };

    if public_rows + secret_rows == 0 {
        tracing::debug!(%fingerprint, "key already present");
    } else {
        tracing::debug!(%fingerprint, public_rows, secret_rows, "stored key");
    }

    Ok(())
}

fn table_for(key_type: KeyType) -> &'static str {
    match key_type {
        KeyType::Public => "public_keys",
        KeyType::Secret => "secret_keys",
    }
}

fn decode_stored(fingerprint: &str, data: &[u8], key_type: KeyType) -> Result<KeyRecord> {
    stored_key_record(data, key_type).map_err(|e| corrupt(fingerprint, e))
}

fn corrupt(fingerprint: &str, e: Error) -> Error {
    tracing::warn!(%fingerprint, error = %e, "stored key is corrupt");
    Error::StoreUnavailable(format!("stored key {} is corrupt: {}", fingerprint, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystore_open_in_memory() {
        let store = KeyStore::open_in_memory().unwrap();
        assert!(store.path().is_none());
        assert_eq!(store.count(false).unwrap(), 0);
        assert_eq!(store.count(true).unwrap(), 0);
    }

    #[test]
    fn test_get_not_found() {
        let store = KeyStore::open_in_memory().unwrap();
        let result = store.get("DEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF", false);
        assert!(matches!(result, Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn test_get_rejects_non_fingerprint() {
        let store = KeyStore::open_in_memory().unwrap();
        let result = store.get("alice@example.com", false);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_corrupt_row_is_store_unavailable() {
        let store = KeyStore::open_in_memory().unwrap();
        let fp = "DEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF";
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO public_keys (fingerprint, key_data) VALUES (?1, x'DEADBEEF')",
                [fp],
            )
            .unwrap();

        assert!(matches!(store.get(fp, false), Err(Error::StoreUnavailable(_))));
        assert!(matches!(store.list(false), Err(Error::StoreUnavailable(_))));
        // Existence checks do not decode the key
        assert!(store.contains(fp, false).unwrap());
    }

    #[test]
    fn test_full_fingerprint_is_not_matched_as_suffix() {
        let store = KeyStore::open_in_memory().unwrap();
        let v6_fp = format!("{}{}", "AB".repeat(12), "CD".repeat(20));
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO public_keys (fingerprint, key_data) VALUES (?1, x'DEADBEEF')",
                [&v6_fp],
            )
            .unwrap();

        // A 40 character ID is a v4 fingerprint, not the tail of a v6 one
        let tail = &v6_fp[24..];
        assert_eq!(tail.len(), 40);
        assert!(store.find_by_key_id(tail, false).unwrap().is_none());

        // Key IDs and the full fingerprint reach the row (and find it corrupt)
        assert!(matches!(
            store.find_by_key_id(&v6_fp[48..], false),
            Err(Error::StoreUnavailable(_))
        ));
        assert!(matches!(
            store.find_by_key_id(&v6_fp, false),
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_malformed_import_leaves_store_untouched() {
        let store = KeyStore::open_in_memory().unwrap();
        let result = store.import_key(b"-----BEGIN PGP PUBLIC KEY BLOCK-----\n\n!!!\n-----END PGP PUBLIC KEY BLOCK-----\n");
        assert!(matches!(result, Err(Error::MalformedKeyData(_))));
        assert_eq!(store.count(false).unwrap(), 0);
    }

    #[test]
    fn test_keystore_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<KeyStore>();
    }
}
