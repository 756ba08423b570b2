//! Public type definitions for the keyrack library.
//!
//! This module contains the value objects handed out by the keyring and
//! the keyserver client. They are snapshots: changing one has no effect on
//! the keyring it came from.

use chrono::{DateTime, Utc};

/// Which half of a key pair a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Public key (certificate)
    Public,
    /// Secret key; always paired with a public key of the same fingerprint
    Secret,
}

impl KeyType {
    /// Map the `secret` flag used by the keyring API to a key type.
    pub fn from_secret(secret: bool) -> Self {
        if secret {
            KeyType::Secret
        } else {
            KeyType::Public
        }
    }

    /// Whether this is the secret half.
    pub fn is_secret(&self) -> bool {
        matches!(self, KeyType::Secret)
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::Public => write!(f, "pub"),
            KeyType::Secret => write!(f, "sec"),
        }
    }
}

impl std::str::FromStr for KeyType {
    type Err = String;

    /// Parse the short GnuPG-style names ("pub"/"sec") or the long ones.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pub" | "public" => Ok(KeyType::Public),
            "sec" | "secret" => Ok(KeyType::Secret),
            _ => Err(format!("unknown key type: {}", s)),
        }
    }
}

/// Metadata of one key stored in the local keyring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Primary key fingerprint as uppercase hex string
    pub fingerprint: String,
    /// Public or secret half
    pub key_type: KeyType,
    /// User IDs in certificate order
    pub uids: Vec<String>,
    /// When the primary key was created
    pub creation_time: DateTime<Utc>,
    /// When the key expires (None if never)
    pub expiration_time: Option<DateTime<Utc>>,
    /// Primary key size in bits
    pub length: usize,
    /// Primary key algorithm name (e.g., "RSA", "EdDSA")
    pub algorithm: String,
}

impl KeyRecord {
    /// Short key ID (last 16 hex characters of the fingerprint).
    pub fn key_id(&self) -> &str {
        key_id_of(&self.fingerprint)
    }

    /// Whether the key had expired at the given instant.
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.expiration_time.is_some_and(|exp| exp <= at)
    }
}

impl std::fmt::Display for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.key_type, self.key_id())?;
        if let Some(uid) = self.uids.first() {
            write!(f, " {}", uid)?;
        }
        Ok(())
    }
}

/// One key as listed by a keyserver index lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyServerSearchResult {
    /// Key ID or fingerprint as reported by the keyserver (uppercase hex)
    pub key_id: String,
    /// Always `KeyType::Public`; keyservers only publish public keys
    pub key_type: KeyType,
    /// When the key was created
    pub creation_time: DateTime<Utc>,
    /// When the key expires (None if it does not expire)
    pub expiration_time: Option<DateTime<Utc>>,
    /// Key size in bits (0 if the keyserver did not report it)
    pub length: usize,
    /// Algorithm name derived from the OpenPGP algorithm ID
    pub algorithm: String,
    /// User IDs in the order the keyserver listed them
    pub uids: Vec<String>,
    /// Keyserver flagged the key as revoked
    pub revoked: bool,
    /// Keyserver flagged the key as expired
    pub expired: bool,
}

/// Last 16 hex characters of a fingerprint (the whole string if shorter).
pub(crate) fn key_id_of(fingerprint: &str) -> &str {
    let start = fingerprint.len().saturating_sub(16);
    &fingerprint[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(expiration: Option<DateTime<Utc>>) -> KeyRecord {
        KeyRecord {
            fingerprint: "B3406D931B37F6B525195F142ED375461FEC5A1D".to_string(),
            key_type: KeyType::Public,
            uids: vec!["Alice Example <alice@example.com>".to_string()],
            creation_time: Utc.timestamp_opt(1792154572, 0).unwrap(),
            expiration_time: expiration,
            length: 256,
            algorithm: "EdDSA".to_string(),
        }
    }

    #[test]
    fn test_key_id_is_fingerprint_suffix() {
        let rec = record(None);
        assert_eq!(rec.key_id(), "2ED375461FEC5A1D");
        assert_eq!(key_id_of("ABCD"), "ABCD");
    }

    #[test]
    fn test_key_type_parse_and_display() {
        assert_eq!("sec".parse::<KeyType>().unwrap(), KeyType::Secret);
        assert_eq!("Public".parse::<KeyType>().unwrap(), KeyType::Public);
        assert!("ssb".parse::<KeyType>().is_err());
        assert_eq!(KeyType::Secret.to_string(), "sec");
        assert_eq!(KeyType::from_secret(false), KeyType::Public);
    }

    #[test]
    fn test_expiry() {
        let exp = Utc.timestamp_opt(2051265600, 0).unwrap();
        let rec = record(Some(exp));
        assert!(!rec.is_expired_at(Utc.timestamp_opt(1792154572, 0).unwrap()));
        assert!(rec.is_expired_at(exp));
        assert!(!record(None).is_expired_at(exp));
    }

    #[test]
    fn test_display() {
        let rec = record(None);
        assert_eq!(
            rec.to_string(),
            "pub 2ED375461FEC5A1D Alice Example <alice@example.com>"
        );
    }
}
