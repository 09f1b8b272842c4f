//! Version chains for Gentle.
//!
//! A version is a small JSON document naming a payload, its predecessor
//! version and the time it was made. A pointer names the latest version;
//! following `prev_version:metadata:content` links walks back through the
//! chain to the shared empty version.
//!
//! # Key Types
//!
//! - [`VersionRecord`] -- one link, with its JSON encoding
//! - [`VersionPayload`] -- existing content or a JSON document to store
//! - [`History`] -- the chain behind a tip, plus any [`AncestryMismatch`]
//!
//! # Concurrency
//!
//! [`put_version`] reads the pointer, stores the new version, then moves
//! the pointer. Concurrent writers can lose updates; [`put_version_checked`]
//! turns that into a [`StoreError::Conflict`](gentle_store::StoreError::Conflict).

pub mod chain;
pub mod error;
pub mod history;
pub mod record;

pub use chain::{
    empty_version, make_version, put_version, put_version_checked, store_version, VersionPayload,
};
pub use error::{VersionError, VersionResult};
pub use history::{check_ancestry, history, load_version, AncestryMismatch, History};
pub use record::{VersionRecord, JSON_PAYLOAD_KEY, PAYLOAD_KEY, PREDECESSOR_KEY, TIMESTAMP_KEY};
