//! Machine-readable HKP index parsing.
//!
//! A keyserver answers `op=index&options=mr` with lines like
//!
//! ```text
//! info:1:2
//! pub:B3406D931B37F6B525195F142ED375461FEC5A1D:22:255:1792154572:2051265600:
//! uid:Alice%20Example%20%3Calice@example.com%3E:1792154572::
//! ```
//!
//! Each `pub` line starts a key; the `uid` lines after it belong to that key.

use std::iter::FusedIterator;

use chrono::{DateTime, TimeZone, Utc};
use percent_encoding::percent_decode_str;

use crate::types::{KeyServerSearchResult, KeyType};

/// Keys returned by a keyserver search, in keyserver order.
///
/// Records are parsed as the iterator advances. The iterator can be
/// consumed once; run the search again to start over.
#[derive(Debug)]
pub struct SearchResults {
    lines: std::vec::IntoIter<String>,
    current: Option<KeyServerSearchResult>,
}

impl SearchResults {
    /// Results of a search that matched nothing.
    pub fn empty() -> Self {
        Self {
            lines: Vec::new().into_iter(),
            current: None,
        }
    }

    /// Wrap the body of a machine-readable index response.
    pub fn from_index(body: &str) -> Self {
        Self {
            lines: body
                .lines()
                .map(str::to_string)
                .collect::<Vec<_>>()
                .into_iter(),
            current: None,
        }
    }
}

impl Iterator for SearchResults {
    type Item = KeyServerSearchResult;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            let line = line.trim();
            let record_type = line.split(':').next().unwrap_or_default();

            match record_type {
                "pub" => {
                    let finished = self.current.take();
                    self.current = parse_pub(line);
                    if self.current.is_none() {
                        // The uids that follow are dropped with it.
                        tracing::warn!(line, "skipping malformed keyserver record");
                    }
                    if finished.is_some() {
                        return finished;
                    }
                }
                "uid" => {
                    if let (Some(current), Some(uid)) = (self.current.as_mut(), parse_uid(line)) {
                        current.uids.push(uid);
                    }
                }
                _ => {}
            }
        }

        self.current.take()
    }
}

impl FusedIterator for SearchResults {}

/// `pub:<keyid>:<algo>:<keylen>:<creationdate>:<expirationdate>:<flags>`
fn parse_pub(line: &str) -> Option<KeyServerSearchResult> {
    let fields: Vec<&str> = line.split(':').collect();

    let key_id = fields.get(1)?.trim().to_uppercase();
    if key_id.is_empty() || !key_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let algorithm = fields
        .get(2)
        .and_then(|a| a.trim().parse::<u8>().ok())
        .map(algorithm_name)
        .unwrap_or_default();
    let length = fields
        .get(3)
        .and_then(|l| l.trim().parse().ok())
        .unwrap_or(0);
    let creation_time = fields.get(4).and_then(|t| parse_timestamp(t))?;
    let expiration_time = fields.get(5).and_then(|t| parse_timestamp(t));
    let flags = fields.get(6).copied().unwrap_or_default();

    Some(KeyServerSearchResult {
        key_id,
        key_type: KeyType::Public,
        creation_time,
        expiration_time,
        length,
        algorithm,
        uids: Vec::new(),
        revoked: flags.contains('r'),
        expired: flags.contains('e'),
    })
}

/// `uid:<escaped uid string>:<creationdate>:<expirationdate>:<flags>`
fn parse_uid(line: &str) -> Option<String> {
    let escaped = line.split(':').nth(1)?;
    if escaped.is_empty() {
        return None;
    }
    Some(percent_decode_str(escaped).decode_utf8_lossy().into_owned())
}

/// Seconds since the epoch; empty or zero means "not set".
fn parse_timestamp(field: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = field.trim().parse().ok()?;
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

/// Display name of an OpenPGP public key algorithm ID.
fn algorithm_name(id: u8) -> String {
    match id {
        1..=3 => "RSA".to_string(),
        16 | 20 => "Elgamal".to_string(),
        17 => "DSA".to_string(),
        18 => "ECDH".to_string(),
        19 => "ECDSA".to_string(),
        22 | 27 => "EdDSA".to_string(),
        25 => "X25519".to_string(),
        26 => "X448".to_string(),
        28 => "Ed448".to_string(),
        other => format!("Unknown({})", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "info:1:2\n\
        pub:B3406D931B37F6B525195F142ED375461FEC5A1D:22:255:1792154572:2051265600:\n\
        uid:Alice%20Example%20%3Calice@example.com%3E:1792154572::\n\
        pub:12474d94b88c9119:1:2048:1792154572::r\n\
        uid:Bob%20Example%20%3Cbob@example.com%3E:1792154572::\n\
        uid:Bob%20at%20Work%20%3Cbob@work.example%3E:::\n";

    #[test]
    fn test_parse_index() {
        let results: Vec<_> = SearchResults::from_index(INDEX).collect();
        assert_eq!(results.len(), 2);

        let alice = &results[0];
        assert_eq!(alice.key_id, "B3406D931B37F6B525195F142ED375461FEC5A1D");
        assert_eq!(alice.key_type, KeyType::Public);
        assert_eq!(alice.algorithm, "EdDSA");
        assert_eq!(alice.length, 255);
        assert_eq!(alice.creation_time.timestamp(), 1792154572);
        assert_eq!(alice.expiration_time.unwrap().timestamp(), 2051265600);
        assert_eq!(alice.uids, vec!["Alice Example <alice@example.com>"]);
        assert!(!alice.revoked);

        let bob = &results[1];
        assert_eq!(bob.key_id, "12474D94B88C9119");
        assert_eq!(bob.algorithm, "RSA");
        assert!(bob.expiration_time.is_none());
        assert!(bob.revoked);
        assert_eq!(bob.uids.len(), 2);
        assert_eq!(bob.uids[1], "Bob at Work <bob@work.example>");
    }

    #[test]
    fn test_malformed_pub_is_skipped_with_its_uids() {
        let body = "pub:NOTHEX:1:2048:1792154572::\n\
            uid:Mallory:::\n\
            pub:12474D94B88C9119:1:2048:1792154572::\n\
            uid:Bob:::\n\
            pub:29B93C1F2767AC5B541903E012474D94B88C9119:1:2048:::\n";
        let results: Vec<_> = SearchResults::from_index(body).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].uids, vec!["Bob"]);
    }

    #[test]
    fn test_empty_and_exhausted() {
        assert_eq!(SearchResults::empty().count(), 0);
        assert_eq!(SearchResults::from_index("info:1:0\n").count(), 0);

        let mut results = SearchResults::from_index(INDEX);
        assert!(results.next().is_some());
        assert!(results.next().is_some());
        assert!(results.next().is_none());
        assert!(results.next().is_none());
    }

    #[test]
    fn test_timestamps() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("0").is_none());
        assert!(parse_timestamp("soon").is_none());
        assert_eq!(parse_timestamp("1792154572").unwrap().timestamp(), 1792154572);
    }
}
