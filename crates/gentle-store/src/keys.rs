//! The key-path convention for references inside JSON documents.
//!
//! Object keys are `:`-separated paths. The last segment says what the
//! value refers to: `pointer` or `content`. Content referenced under a key
//! ending in `json:content` or `metadata:content` is itself a JSON document.
//!
//! ```text
//! "content:content"                raw blob
//! "content:json:content"           JSON document
//! "prev_version:metadata:content"  JSON document
//! "head:pointer"                   pointer to raw blob
//! "head:json:pointer"              pointer to JSON document
//! "title"                          not a reference
//! ```

use gentle_types::IdentifierSpace;

pub const KEY_DELIMITER: char = ':';

const POINTER_TAG: &str = "pointer";
const CONTENT_TAG: &str = "content";
const JSON_TAGS: [&str; 2] = ["json", "metadata"];

/// The key used for a root whose kind is known but which has no parent key.
pub const ROOT_CONTENT_KEY: &str = "json:content";

/// The key a root pointer is visited under.
pub const ROOT_POINTER_KEY: &str = "json:pointer";

/// Which identifier space a value under `key` refers to, if any.
pub fn reference_space(key: &str) -> Option<IdentifierSpace> {
    match key.rsplit(KEY_DELIMITER).next() {
        Some(POINTER_TAG) => Some(IdentifierSpace::Pointer),
        Some(CONTENT_TAG) => Some(IdentifierSpace::Content),
        _ => None,
    }
}

/// Returns `true` if content referenced under `key` is a JSON document.
pub fn is_json_bearing(key: &str) -> bool {
    let mut segments = key.rsplit(KEY_DELIMITER);
    segments.next() == Some(CONTENT_TAG)
        && segments.next().is_some_and(|s| JSON_TAGS.contains(&s))
}

/// The key a pointer's target is visited under: the trailing `pointer`
/// segment becomes `content`. Other keys are returned unchanged.
pub fn dereferenced(key: &str) -> String {
    match key.rsplit_once(KEY_DELIMITER) {
        Some((head, POINTER_TAG)) => format!("{head}{KEY_DELIMITER}{CONTENT_TAG}"),
        None if key == POINTER_TAG => CONTENT_TAG.to_string(),
        _ => key.to_string(),
    }
}
