//! Content and pointer storage for Gentle.
//!
//! Two primitives sit at the bottom of every Gentle repository:
//!
//! - a [`ContentStore`] -- immutable blobs keyed by their SHA-256 hash,
//!   deduplicated and write-once;
//! - a [`PointerStore`] -- mutable slots keyed by random identifiers, each
//!   holding the id of an existing blob.
//!
//! A [`DataStore`] pairs the two and adds the cross-space operations:
//! checked pointer updates, prefix lookup over both spaces and
//! [`resolve`](DataStore::resolve).
//!
//! # Backends
//!
//! - [`InMemoryDataStore`] -- `BTreeMap`-based, for tests and embedding
//! - [`FsDataStore`] -- one file per entry under `content_db/` and `pointer_db/`
//! - [`TracedStore`] -- wraps any store and logs each operation
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written; identical bytes always get the same id.
//! 2. Pointer indirection is exactly one level: a pointer names content, never
//!    another pointer.
//! 3. Lookup results are sorted so callers see a deterministic order.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod json;
pub mod keys;
pub mod memory;
pub mod traced;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::{FsContentStore, FsDataStore, FsPointerStore};
pub use json::{canonical_json, get_json, parse_json, put_json, with_content_arg, with_json_arg};
pub use keys::{dereferenced, is_json_bearing, reference_space, KEY_DELIMITER};
pub use memory::{InMemoryContentStore, InMemoryDataStore, InMemoryPointerStore};
pub use traced::{TracedStore, TRACE_TARGET};
pub use traits::{ContentStore, DataStore, PointerStore};
