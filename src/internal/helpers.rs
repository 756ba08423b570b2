//! Internal helper functions.

use std::io::Cursor;
use std::time::SystemTime;

use pgp::composed::{Deserializable, SignedPublicKey, SignedSecretKey};
use pgp::ser::Serialize;
use pgp::types::{KeyDetails, PublicKeyTrait, PublicParams};

use crate::error::{Error, Result};

/// Parse every secret key in `data` (armored or binary).
///
/// Fails if the data holds no secret key or any packet sequence in it is
/// not a secret key.
pub(crate) fn parse_secret_keys(data: &[u8]) -> Result<Vec<SignedSecretKey>> {
    let cursor = Cursor::new(data);
    let (keys_iter, _headers) = SignedSecretKey::from_reader_many(cursor)?;
    let keys = keys_iter.collect::<std::result::Result<Vec<_>, _>>()?;
    if keys.is_empty() {
        return Err(Error::MalformedKeyData("no secret key found".to_string()));
    }
    Ok(keys)
}

/// Parse every public key in `data` (armored or binary).
pub(crate) fn parse_public_keys(data: &[u8]) -> Result<Vec<SignedPublicKey>> {
    let cursor = Cursor::new(data);
    let (keys_iter, _headers) = SignedPublicKey::from_reader_many(cursor)?;
    let keys = keys_iter.collect::<std::result::Result<Vec<_>, _>>()?;
    if keys.is_empty() {
        return Err(Error::MalformedKeyData("no public key found".to_string()));
    }
    Ok(keys)
}

/// Serialize a public key to binary format.
pub(crate) fn public_key_to_bytes(key: &SignedPublicKey) -> Result<Vec<u8>> {
    key.to_bytes()
        .map_err(|e| Error::MalformedKeyData(e.to_string()))
}

/// Serialize a secret key to binary format.
pub(crate) fn secret_key_to_bytes(key: &SignedSecretKey) -> Result<Vec<u8>> {
    key.to_bytes()
        .map_err(|e| Error::MalformedKeyData(e.to_string()))
}

/// Serialize a public key to ASCII-armored format.
pub(crate) fn public_key_to_armored(key: &SignedPublicKey) -> Result<String> {
    key.to_armored_string(None.into())
        .map_err(|e| Error::MalformedKeyData(e.to_string()))
}

/// Serialize a secret key to ASCII-armored format.
pub(crate) fn secret_key_to_armored(key: &SignedSecretKey) -> Result<String> {
    key.to_armored_string(None.into())
        .map_err(|e| Error::MalformedKeyData(e.to_string()))
}

/// Get the fingerprint as a hex string (uppercase, no spaces).
pub(crate) fn fingerprint_to_hex(key: &impl KeyDetails) -> String {
    hex::encode_upper(key.fingerprint().as_bytes())
}

/// Convert a SystemTime to chrono DateTime.
pub(crate) fn system_time_to_datetime(st: SystemTime) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from(st)
}

/// Get a normalized algorithm name for display.
pub(crate) fn get_algorithm_name(key: &impl KeyDetails) -> String {
    use pgp::crypto::public_key::PublicKeyAlgorithm;

    match key.algorithm() {
        PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
            "RSA".to_string()
        }
        PublicKeyAlgorithm::EdDSALegacy | PublicKeyAlgorithm::Ed25519 => "EdDSA".to_string(),
        PublicKeyAlgorithm::ECDH => "ECDH".to_string(),
        PublicKeyAlgorithm::ECDSA => "ECDSA".to_string(),
        PublicKeyAlgorithm::X25519 => "X25519".to_string(),
        PublicKeyAlgorithm::X448 => "X448".to_string(),
        PublicKeyAlgorithm::Ed448 => "Ed448".to_string(),
        PublicKeyAlgorithm::DSA => "DSA".to_string(),
        PublicKeyAlgorithm::Elgamal => "Elgamal".to_string(),
        algo => format!("{:?}", algo),
    }
}

/// Get the bit size of a key from its public parameters.
///
/// RSA reports the modulus size, DSA and Elgamal the size of the prime `p`,
/// elliptic curve keys the nominal curve size (255 for Curve25519/Ed25519,
/// as keyservers and GnuPG report it). Returns 0 if the size cannot be
/// determined.
pub(crate) fn get_key_bit_size(key: &impl PublicKeyTrait) -> usize {
    let params = key.public_params();
    match params {
        PublicParams::RSA(rsa_params) => {
            use rsa::traits::PublicKeyParts;

            rsa_params.key.n().bits()
        }
        PublicParams::DSA(_) | PublicParams::Elgamal(_) => leading_mpi_bits(params),
        PublicParams::ECDSA(ecdsa_params) => usize::from(ecdsa_params.curve().nbits()),
        PublicParams::ECDH(ecdh_params) => usize::from(ecdh_params.curve().nbits()),
        PublicParams::EdDSALegacy(ed_params) => usize::from(ed_params.curve().nbits()),
        PublicParams::Ed25519(_) | PublicParams::X25519(_) => 255,
        PublicParams::Ed448(_) | PublicParams::X448(_) => 448,
        _ => 0,
    }
}

/// Bit count of the first MPI in serialized key parameters.
fn leading_mpi_bits(params: &PublicParams) -> usize {
    match params.to_bytes() {
        Ok(bytes) if bytes.len() >= 2 => usize::from(u16::from_be_bytes([bytes[0], bytes[1]])),
        _ => 0,
    }
}

/// Get the expiration time of a primary key.
///
/// The newest self-signature on any user ID decides: a later signature
/// without an expiration removes an earlier one.
pub(crate) fn get_key_expiration(key: &SignedPublicKey) -> Option<SystemTime> {
    let fingerprint = key.primary_key.fingerprint();
    let key_id = key.primary_key.key_id();

    let newest = key
        .details
        .users
        .iter()
        .flat_map(|user| user.signatures.iter())
        .filter(|sig| {
            sig.issuer_fingerprint().iter().any(|fp| **fp == fingerprint)
                || sig.issuer().iter().any(|id| **id == key_id)
        })
        .max_by_key(|sig| sig.created().copied())?;

    let validity = newest.key_expiration_time()?;
    let creation_time: SystemTime = (*key.primary_key.created_at()).into();
    Some(creation_time + validity.to_std().unwrap_or_default())
}

