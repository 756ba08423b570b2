//! Display columns for key listings and keyserver results.
//!
//! One function per column so a listing can name exactly what it shows.

use crate::types::{key_id_of, KeyRecord, KeyServerSearchResult};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// "Key ID" column of a keyring listing.
pub fn key_id_column(record: &KeyRecord) -> String {
    record.key_id().to_string()
}

/// "Owner" column of a keyring listing: all user IDs.
pub fn owner_column(record: &KeyRecord) -> String {
    record.uids.join(", ")
}

/// "ID" column of keyserver results: the last 16 hex digits, elided.
pub fn search_id_column(result: &KeyServerSearchResult) -> String {
    format!("...{}", key_id_of(&result.key_id))
}

/// "Type" column of keyserver results.
pub fn key_type_column(result: &KeyServerSearchResult) -> String {
    result.key_type.to_string()
}

/// "Creation date" column of keyserver results.
pub fn creation_date_column(result: &KeyServerSearchResult) -> String {
    result.creation_time.format(DATE_FORMAT).to_string()
}

/// "Expiration date" column of keyserver results.
pub fn expiration_date_column(result: &KeyServerSearchResult) -> String {
    match result.expiration_time {
        Some(exp) => exp.format(DATE_FORMAT).to_string(),
        None => "No expiration".to_string(),
    }
}

/// "Length" column of keyserver results.
pub fn length_column(result: &KeyServerSearchResult) -> String {
    result.length.to_string()
}

/// "Identities" column of keyserver results.
pub fn identities_column(result: &KeyServerSearchResult) -> String {
    result.uids.join(", ")
}
