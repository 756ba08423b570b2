//! Key metadata extraction and identifier normalization.
//!
//! Turns parsed rpgp certificates into [`KeyRecord`] snapshots and cleans up
//! fingerprints and key IDs coming from callers.

use pgp::composed::SignedPublicKey;
use pgp::types::PublicKeyTrait;

use crate::error::{Error, Result};
use crate::internal::{
    fingerprint_to_hex, get_algorithm_name, get_key_bit_size, get_key_expiration,
    system_time_to_datetime,
};
use crate::types::{KeyRecord, KeyType};

/// Build the record of one key from its (public) certificate.
///
/// For secret keys pass the public half derived from the secret key
/// together with `KeyType::Secret`.
pub(crate) fn key_record(public_key: &SignedPublicKey, key_type: KeyType) -> KeyRecord {
    let uids: Vec<String> = public_key
        .details
        .users
        .iter()
        .map(|u| String::from_utf8_lossy(u.id.id()).to_string())
        .collect();

    KeyRecord {
        fingerprint: fingerprint_to_hex(&public_key.primary_key),
        key_type,
        uids,
        creation_time: system_time_to_datetime((*public_key.primary_key.created_at()).into()),
        expiration_time: get_key_expiration(public_key).map(system_time_to_datetime),
        length: get_key_bit_size(&public_key.primary_key),
        algorithm: get_algorithm_name(&public_key.primary_key),
    }
}

/// Normalize a fingerprint to uppercase hex without separators.
///
/// Accepts an optional `0x` prefix and embedded spaces. Only v4 (40 hex
/// characters) and v6 (64 hex characters) fingerprints are valid.
///
/// # Example
/// ```
/// use keyrack::normalize_fingerprint;
///
/// let fp = normalize_fingerprint("b340 6d93 1b37 f6b5 2519  5f14 2ed3 7546 1fec 5a1d").unwrap();
/// assert_eq!(fp, "B3406D931B37F6B525195F142ED375461FEC5A1D");
/// ```
pub fn normalize_fingerprint(fingerprint: &str) -> Result<String> {
    let hex = normalize_hex(fingerprint);
    if !matches!(hex.len(), 40 | 64) || !is_hex(&hex) {
        return Err(Error::InvalidInput(format!(
            "not a valid fingerprint: {}",
            fingerprint
        )));
    }
    Ok(hex)
}

/// Normalize a key identifier for a keyserver lookup.
///
/// Accepts short (8), long (16) key IDs and full v4/v6 fingerprints, with
/// an optional `0x` prefix.
pub fn normalize_key_id(key_id: &str) -> Result<String> {
    let hex = normalize_hex(key_id);
    if !matches!(hex.len(), 8 | 16 | 40 | 64) || !is_hex(&hex) {
        return Err(Error::InvalidInput(format!("not a valid key ID: {}", key_id)));
    }
    Ok(hex)
}

fn normalize_hex(input: &str) -> String {
    let trimmed = input.trim();
    let without_prefix = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    without_prefix
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fingerprint() {
        assert_eq!(
            normalize_fingerprint("0xb3406d931b37f6b525195f142ed375461fec5a1d").unwrap(),
            "B3406D931B37F6B525195F142ED375461FEC5A1D"
        );
        assert_eq!(
            normalize_fingerprint("  B340 6D93 1B37 F6B5 2519 5F14 2ED3 7546 1FEC 5A1D ").unwrap(),
            "B3406D931B37F6B525195F142ED375461FEC5A1D"
        );
    }

    #[test]
    fn test_normalize_fingerprint_rejects_bad_input() {
        assert!(matches!(
            normalize_fingerprint("2ED375461FEC5A1D"),
            Err(Error::InvalidInput(_))
        ));
        assert!(normalize_fingerprint("Z3406D931B37F6B525195F142ED375461FEC5A1D").is_err());
        assert!(normalize_fingerprint("").is_err());
    }

    #[test]
    fn test_normalize_key_id() {
        assert_eq!(normalize_key_id("0x2ed375461fec5a1d").unwrap(), "2ED375461FEC5A1D");
        assert_eq!(normalize_key_id("1FEC5A1D").unwrap(), "1FEC5A1D");
        assert!(normalize_key_id("1FEC5A1").is_err());
        assert!(normalize_key_id("alice@example.com").is_err());
    }
}
